#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Not found (404): {0}")]
    NotFound(String),
    #[error("Rate limited (429): {0}")]
    RateLimited(String),
    #[error("Server error {status}: {url}")]
    ServerError { status: u16, url: String },
    #[error("Unexpected status {status}: {url}")]
    Status { status: u16, url: String },
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Disallowed by robots.txt: {0}")]
    RobotsDisallowed(String),
}

impl FetchError {
    /// Transport failures, 429 and 5xx are worth another attempt; anything
    /// else will fail the same way again
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            FetchError::RateLimited(_) | FetchError::ServerError { .. } => true,
            _ => false,
        }
    }
}
