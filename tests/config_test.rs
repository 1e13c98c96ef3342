// Environment-driven configuration

use std::env;
use std::time::Duration;

use bps_indicators::config::{Config, DEFAULT_INDEX_PAGES};
use bps_indicators::fetcher::DEFAULT_USER_AGENT;
use serial_test::serial;

const VARS: [&str; 6] = [
    "BPS_USER_AGENT",
    "BPS_REQUEST_TIMEOUT_SECS",
    "BPS_CRAWL_DELAY_SECS",
    "BPS_MAX_RETRIES",
    "BPS_OUTPUT_DIR",
    "BPS_INDEX_PAGES",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults() {
    clear_env();
    let config = Config::from_env();

    assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    assert_eq!(config.request_timeout_secs, 20);
    assert_eq!(config.crawl_delay_secs, 2.0);
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.output_dir, std::path::PathBuf::from("dataset"));
    assert_eq!(config.index_pages, DEFAULT_INDEX_PAGES.to_vec());
}

#[test]
#[serial]
fn test_overrides_and_fetch_settings() {
    clear_env();
    env::set_var("BPS_USER_AGENT", "prueba/1.0");
    env::set_var("BPS_REQUEST_TIMEOUT_SECS", "5");
    env::set_var("BPS_CRAWL_DELAY_SECS", "0.5");
    env::set_var("BPS_MAX_RETRIES", "1");
    env::set_var("BPS_OUTPUT_DIR", "/tmp/bps");
    env::set_var("BPS_INDEX_PAGES", "https://a.example/1, https://a.example/2");

    let config = Config::from_env();
    assert_eq!(config.index_pages, vec!["https://a.example/1", "https://a.example/2"]);

    let settings = config.fetch_settings();
    assert_eq!(settings.user_agent, "prueba/1.0");
    assert_eq!(settings.timeout, Duration::from_secs(5));
    assert_eq!(settings.crawl_delay, Duration::from_millis(500));
    assert_eq!(settings.max_retries, 1);
    clear_env();
}

#[test]
#[serial]
fn test_unparseable_values_fall_back() {
    clear_env();
    env::set_var("BPS_REQUEST_TIMEOUT_SECS", "veinte");
    env::set_var("BPS_CRAWL_DELAY_SECS", "-1");
    env::set_var("BPS_MAX_RETRIES", "");
    env::set_var("BPS_INDEX_PAGES", " , ");

    let config = Config::from_env();
    assert_eq!(config.request_timeout_secs, 20);
    assert_eq!(config.crawl_delay_secs, 2.0);
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.index_pages.len(), DEFAULT_INDEX_PAGES.len());
    clear_env();
}

#[test]
#[serial]
fn test_huge_crawl_delay_falls_back() {
    clear_env();
    env::set_var("BPS_CRAWL_DELAY_SECS", "1e30");

    let config = Config::from_env();
    assert_eq!(config.crawl_delay_secs, 2.0);
    assert_eq!(config.fetch_settings().crawl_delay, Duration::from_secs(2));
    clear_env();
}
