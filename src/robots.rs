//! robots.txt retrieval and evaluation.

use std::collections::BTreeSet;

use tracing::{info, instrument, warn};

use crate::fetch_error::FetchError;
use crate::fetcher::HttpFetcher;

/// Lines of robots.txt echoed to the log
const PREVIEW_LINES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Rule {
    allow: bool,
    pattern: String,
}

/// Rules that apply to one user agent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsRules {
    rules: Vec<Rule>,
    pub crawl_delay: Option<f64>,
}

impl RobotsRules {
    /// Rules for `user_agent`: the groups naming its product token, or the
    /// `*` groups when none does
    pub fn parse(text: &str, user_agent: &str) -> Self {
        let token = product_token(user_agent);

        #[derive(Default)]
        struct Group {
            agents: Vec<String>,
            rules: Vec<Rule>,
            crawl_delay: Option<f64>,
        }

        let mut groups: Vec<Group> = Vec::new();
        let mut in_agent_block = false;

        for line in text.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if !in_agent_block || groups.is_empty() {
                        groups.push(Group::default());
                    }
                    in_agent_block = true;
                    if let Some(group) = groups.last_mut() {
                        group.agents.push(value.to_ascii_lowercase());
                    }
                }
                "allow" | "disallow" => {
                    in_agent_block = false;
                    // An empty Disallow allows everything and adds no rule
                    if value.is_empty() {
                        continue;
                    }
                    if let Some(group) = groups.last_mut() {
                        group.rules.push(Rule {
                            allow: key == "allow",
                            pattern: value.to_string(),
                        });
                    }
                }
                "crawl-delay" => {
                    in_agent_block = false;
                    if let Some(group) = groups.last_mut() {
                        group.crawl_delay = value.parse().ok();
                    }
                }
                _ => {}
            }
        }

        let specific: Vec<&Group> = groups
            .iter()
            .filter(|g| g.agents.iter().any(|a| a != "*" && token.starts_with(a.as_str())))
            .collect();
        let chosen = if specific.is_empty() {
            groups.iter().filter(|g| g.agents.iter().any(|a| a == "*")).collect()
        } else {
            specific
        };

        Self {
            rules: chosen.iter().flat_map(|g| g.rules.iter().cloned()).collect(),
            crawl_delay: chosen.iter().find_map(|g| g.crawl_delay),
        }
    }

    /// Everything is allowed
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Longest matching pattern wins; on equal length Allow wins
    pub fn is_allowed(&self, path: &str) -> bool {
        self.rules
            .iter()
            .filter(|rule| pattern_matches(&rule.pattern, path))
            .max_by_key(|rule| (rule.pattern.len(), rule.allow))
            .map_or(true, |rule| rule.allow)
    }

    pub fn is_url_allowed(&self, url: &url::Url) -> bool {
        let mut target = url.path().to_string();
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }
        self.is_allowed(&target)
    }
}

/// What was found at one host's robots.txt
#[derive(Debug, Clone)]
pub struct RobotsReport {
    pub robots_url: String,
    pub found: bool,
    pub rules: RobotsRules,
    pub preview: Vec<String>,
}

/// Fetch robots.txt for every distinct host among `urls`.
///
/// A missing file means everything is allowed; any other failure is logged
/// and also treated as allow-all, crawling politely regardless.
#[instrument(skip_all, fields(urls = urls.len()))]
pub async fn check_robots(fetcher: &HttpFetcher, urls: &[String]) -> Vec<RobotsReport> {
    let mut origins = BTreeSet::new();
    for raw in urls {
        match url::Url::parse(raw) {
            Ok(u) => {
                origins.insert(u.origin().ascii_serialization());
            }
            Err(e) => warn!("Skipping invalid URL {}: {}", raw, e),
        }
    }

    let user_agent = fetcher.settings().user_agent.clone();
    let mut reports = Vec::new();
    for (i, origin) in origins.into_iter().enumerate() {
        if i > 0 {
            fetcher.polite_delay().await;
        }
        let robots_url = format!("{origin}/robots.txt");
        let report = match fetcher.fetch_text(&robots_url).await {
            Ok(text) => {
                let preview: Vec<String> =
                    text.lines().take(PREVIEW_LINES).map(str::to_string).collect();
                info!(
                    "robots.txt at {} ({} bytes):\n{}",
                    robots_url,
                    text.len(),
                    preview.join("\n")
                );
                RobotsReport {
                    robots_url,
                    found: true,
                    rules: RobotsRules::parse(&text, &user_agent),
                    preview,
                }
            }
            Err(FetchError::NotFound(_)) => {
                info!("No robots.txt at {}; crawling politely by default", robots_url);
                RobotsReport {
                    robots_url,
                    found: false,
                    rules: RobotsRules::allow_all(),
                    preview: Vec::new(),
                }
            }
            Err(e) => {
                warn!("Could not read {}: {}", robots_url, e);
                RobotsReport {
                    robots_url,
                    found: false,
                    rules: RobotsRules::allow_all(),
                    preview: Vec::new(),
                }
            }
        };
        reports.push(report);
    }
    reports
}

/// Refuse `url` when the report for its host disallows it; hosts that were
/// never checked are allowed
pub fn ensure_allowed(reports: &[RobotsReport], url: &str) -> Result<(), FetchError> {
    let parsed = url::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
    let robots_url = format!("{}/robots.txt", parsed.origin().ascii_serialization());
    match reports.iter().find(|r| r.robots_url == robots_url) {
        Some(report) if !report.rules.is_url_allowed(&parsed) => {
            Err(FetchError::RobotsDisallowed(url.to_string()))
        }
        _ => Ok(()),
    }
}

/// `Mozilla/5.0 (...)` -> `mozilla`
fn product_token(user_agent: &str) -> String {
    user_agent
        .split(['/', ' '])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Prefix match with `*` wildcards and an optional `$` end anchor
fn pattern_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };

    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = path.strip_prefix(first) else {
        return false;
    };

    let mut remaining: Vec<&str> = parts.collect();
    let last = if pattern.contains('*') { remaining.pop() } else { None };
    for part in remaining {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }

    match last {
        // Pattern ended in (or contained) a wildcard segment
        Some(tail) if anchored => rest.ends_with(tail),
        Some(tail) => rest.contains(tail),
        None if anchored => rest.is_empty(),
        None => true,
    }
}
