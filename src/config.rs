use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::fetcher::{FetchSettings, DEFAULT_USER_AGENT};

/// Hosts whose robots.txt is checked before crawling
pub const ROBOTS_SEEDS: [&str; 3] = [
    "https://observatorio.bps.gub.uy/",
    "https://www.bps.gub.uy/",
    "https://bps.gub.uy/",
];

pub const DEFAULT_INDEX_PAGES: [&str; 3] = [
    "https://www.bps.gub.uy/1944/indicadores-de-la-seguridad-social.html",
    "https://www.bps.gub.uy/bps/estadisticas/cuadro.jsp?cuadro=2",
    "https://www.bps.gub.uy/bps/observatorio/cuadro.jsp?contentid=12780",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub crawl_delay_secs: f64,
    pub max_retries: usize,
    pub output_dir: PathBuf,
    pub index_pages: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            user_agent: env::var("BPS_USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
            request_timeout_secs: env::var("BPS_REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .unwrap_or(20),
            crawl_delay_secs: env::var("BPS_CRAWL_DELAY_SECS")
                .unwrap_or_else(|_| "2.0".to_string())
                .parse()
                .ok()
                .filter(|d: &f64| valid_delay(*d))
                .unwrap_or(2.0),
            max_retries: env::var("BPS_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            output_dir: env::var("BPS_OUTPUT_DIR")
                .unwrap_or_else(|_| "dataset".to_string())
                .into(),
            index_pages: env::var("BPS_INDEX_PAGES")
                .ok()
                .map(|raw| split_list(&raw))
                .filter(|pages| !pages.is_empty())
                .unwrap_or_else(|| DEFAULT_INDEX_PAGES.iter().map(|p| p.to_string()).collect()),
        }
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        let defaults = FetchSettings::default();
        FetchSettings {
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
            crawl_delay: Duration::try_from_secs_f64(self.crawl_delay_secs)
                .unwrap_or(defaults.crawl_delay),
            max_retries: self.max_retries,
            ..defaults
        }
    }
}

/// A delay `Duration` can hold; negative, NaN and overflowing values are not
pub fn valid_delay(secs: f64) -> bool {
    Duration::try_from_secs_f64(secs).is_ok()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
