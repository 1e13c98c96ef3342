use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, instrument, warn};

use crate::fetch_error::FetchError;
use crate::resource::{decode_text, RawResource};

pub const DEFAULT_USER_AGENT: &str = "bps-indicators/0.5 (+https://www.bps.gub.uy)";

/// Politeness and retry knobs for every outbound request
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub user_agent: String,
    pub timeout: Duration,
    /// Pause between consecutive requests to the same site
    pub crawl_delay: Duration,
    /// Retries after the first attempt
    pub max_retries: usize,
    /// First backoff delay; doubles on each retry
    pub retry_min_delay: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(20),
            crawl_delay: Duration::from_secs(2),
            max_retries: 3,
            retry_min_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl HttpFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.timeout)
            .build()?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Download a resource, retrying transport errors, 429 and 5xx with
    /// exponential backoff
    #[instrument(skip(self), fields(retries = self.settings.max_retries))]
    pub async fn fetch(&self, url: &str) -> Result<RawResource, FetchError> {
        let parsed = url::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }

        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.settings.retry_min_delay)
            .with_max_delay(self.settings.retry_min_delay * 8)
            .with_max_times(self.settings.max_retries);

        let resource = (|| async { self.fetch_once(url).await })
            .retry(backoff)
            .when(FetchError::is_retryable)
            .notify(|err: &FetchError, delay: Duration| {
                warn!("Fetch of {} failed ({}), retrying in {:?}", url, err, delay);
            })
            .await?;

        info!(
            "Downloaded {} bytes from {} (content-type: {:?})",
            resource.bytes.len(),
            url,
            resource.content_type
        );
        Ok(resource)
    }

    /// Fetch a page and decode it as text
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let resource = self.fetch(url).await?;
        Ok(decode_text(&resource.bytes).into_owned())
    }

    /// Sleep for the configured crawl delay
    pub async fn polite_delay(&self) {
        if !self.settings.crawl_delay.is_zero() {
            debug!("Waiting {:?} before the next request", self.settings.crawl_delay);
            tokio::time::sleep(self.settings.crawl_delay).await;
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<RawResource, FetchError> {
        debug!("Sending HTTP request");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        debug!("Received HTTP response with status: {}", status);

        if status.is_success() {
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let final_url = response.url().to_string();
            let bytes = response.bytes().await?;
            Ok(RawResource::new(final_url, content_type, bytes.to_vec()))
        } else if status.as_u16() == 404 {
            Err(FetchError::NotFound(url.to_string()))
        } else if status.as_u16() == 429 {
            Err(FetchError::RateLimited(url.to_string()))
        } else if status.is_server_error() {
            Err(FetchError::ServerError {
                status: status.as_u16(),
                url: url.to_string(),
            })
        } else {
            Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            })
        }
    }
}
