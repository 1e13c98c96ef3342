//! Index-page crawler.
//!
//! The institution lists its statistical files as links on a handful of
//! pages; each link to a PDF or workbook becomes one `IndexEntry`, with its
//! chapter and title recovered from the surrounding text.

use std::collections::HashSet;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::fetcher::HttpFetcher;
use crate::table::collapse_whitespace;

static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));

static CHAPTER_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b([IVX]+(?:\.\d+)?)\s+([^(|·\-\n]{3,120})").expect("valid chapter regex")
});
static SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d+(?:[.,]\d+)?\s*(?:KB|MB|B))\b").expect("valid size regex"));
static PUBLISHED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(última\s+modificación|fecha\s+de\s+publicación)\s*[:\-]\s*(\d{2}/\d{2}/\d{4})")
        .expect("valid date regex")
});
static FILE_EXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(pdf|xlsx?)\b").expect("valid extension regex"));
static SIZE_PARTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\d.]+)\s*(KB|MB|B)").expect("valid size regex"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));
static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));
static FILE_SUBCHAPTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([ivx]+)_(\d+)_").expect("valid regex"));
static FILE_CHAPTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([ivx]+)_").expect("valid regex"));
static FILE_ARABIC_CHAPTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([1-5])_").expect("valid regex"));

/// Ancestors searched, in this order, for the text around a link
const NEAR_BLOCK_TAGS: [&str; 7] = ["li", "div", "td", "tr", "p", "article", "section"];

/// Raw characters before a link searched when the block text names no chapter
const LOOKBEHIND_CHARS: usize = 600;

const ROMAN_BY_DIGIT: [&str; 6] = ["", "I", "II", "III", "IV", "V"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chapter: String,
    pub short_title: String,
    /// `pdf` or `xls` (workbooks of either generation)
    pub file_type: String,
    pub size_text: String,
    pub size_bytes: Option<u64>,
    pub publish_date: Option<NaiveDate>,
    pub final_filename: String,
    pub download_url: String,
    pub page_url: String,
}

impl IndexEntry {
    /// Chapter equal to `prefix`, or a sub-chapter of it (`III.3` under `III`)
    pub fn in_chapter(&self, prefix: &str) -> bool {
        self.chapter == prefix
            || self
                .chapter
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('.'))
    }
}

/// Every PDF/workbook link on an index page
#[instrument(skip(html), fields(page = %page_url, html_size = html.len()))]
pub fn parse_index_page(page_url: &Url, html: &str) -> Vec<IndexEntry> {
    let document = Html::parse_document(html);
    let mut entries = Vec::new();
    let mut total_links = 0;

    for link in document.select(&LINK) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some(ext) = FILE_EXT.captures(href).and_then(|c| c.get(1)) else {
            continue;
        };
        total_links += 1;

        let download_url = match page_url.join(href) {
            Ok(u) => u,
            Err(e) => {
                warn!("Skipping unresolvable link {}: {}", href, e);
                continue;
            }
        };
        let file_type = if ext.as_str().to_ascii_lowercase().starts_with("xls") {
            "xls"
        } else {
            "pdf"
        };

        let link_text = collapse_whitespace(&link.text().collect::<Vec<_>>().join(" "));
        let context = format!("{} | {}", link_text, near_block_text(&link));

        let size_text = ["title", "data-size"]
            .iter()
            .filter_map(|attr| link.value().attr(attr))
            .find_map(|v| SIZE.captures(v).map(|c| c[1].to_string()))
            .or_else(|| SIZE.captures(&context).map(|c| c[1].to_string()))
            .unwrap_or_default();

        let publish_date = PUBLISHED
            .captures(&context)
            .and_then(|c| NaiveDate::parse_from_str(&c[2], "%d/%m/%Y").ok());

        let (mut chapter, mut short_title) = chapter_and_title(&context);
        if chapter.is_empty() || short_title.is_empty() {
            let (c, t) = chapter_and_title(&lookbehind(html, href));
            if chapter.is_empty() {
                chapter = c;
            }
            if short_title.is_empty() {
                short_title = t;
            }
        }
        let chapter = prefer_file_chapter(&chapter, href);

        debug!("Link {} -> chapter '{}' title '{}'", href, chapter, short_title);
        entries.push(IndexEntry {
            chapter,
            short_title,
            file_type: file_type.to_string(),
            size_bytes: size_to_bytes(&size_text),
            size_text,
            publish_date,
            final_filename: final_filename(&download_url),
            download_url: download_url.to_string(),
            page_url: page_url.to_string(),
        });
    }

    info!(
        "Page {}: {} PDF/XLS link(s), {} kept",
        page_url,
        total_links,
        entries.len()
    );
    entries
}

/// Crawl index pages one at a time, politely, de-duplicating by download URL.
///
/// A failing page is logged and skipped.
#[instrument(skip(fetcher, pages), fields(page_count = pages.len()))]
pub async fn crawl_index(fetcher: &HttpFetcher, pages: &[String], max_pages: usize) -> Vec<IndexEntry> {
    let mut entries = Vec::new();

    for (i, page) in pages.iter().take(max_pages).enumerate() {
        if i > 0 {
            fetcher.polite_delay().await;
        }
        let page_url = match Url::parse(page) {
            Ok(u) => u,
            Err(e) => {
                warn!("Skipping invalid index page {}: {}", page, e);
                continue;
            }
        };
        match fetcher.fetch_text(page).await {
            Ok(html) => entries.extend(parse_index_page(&page_url, &html)),
            Err(e) => warn!("Failed to crawl {}: {}", page, e),
        }
    }

    let before = entries.len();
    let entries = dedupe_by_download_url(entries);
    info!(
        "Crawled {} index entries ({} duplicate(s) removed)",
        entries.len(),
        before - entries.len()
    );
    entries
}

pub fn dedupe_by_download_url(entries: Vec<IndexEntry>) -> Vec<IndexEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| !e.download_url.is_empty() && seen.insert(e.download_url.clone()))
        .collect()
}

/// The most recently published entry of a chapter and file type.
///
/// Entries without a publication date rank last; ties keep index order.
pub fn pick_latest<'a>(
    entries: &'a [IndexEntry],
    chapter_prefix: &str,
    file_type: &str,
) -> Option<&'a IndexEntry> {
    entries
        .iter()
        .filter(|e| e.in_chapter(chapter_prefix) && e.file_type.eq_ignore_ascii_case(file_type))
        .rev()
        .max_by_key(|e| e.publish_date)
}

/// Chapter encoded in a file name: `iii_3_...` -> `III.3`, `ii_...` -> `II`,
/// `2_...` -> `II`
pub fn chapter_from_href(href: &str) -> String {
    let name = href.rsplit('/').next().unwrap_or_default().to_lowercase();
    let name = NON_ALNUM.replace_all(&name, "_");

    if let Some(c) = FILE_SUBCHAPTER.captures(&name) {
        return format!("{}.{}", c[1].to_uppercase(), &c[2]);
    }
    if let Some(c) = FILE_CHAPTER.captures(&name) {
        return c[1].to_uppercase();
    }
    if let Some(c) = FILE_ARABIC_CHAPTER.captures(&name) {
        let digit: usize = c[1].parse().unwrap_or(0);
        return ROMAN_BY_DIGIT.get(digit).copied().unwrap_or_default().to_string();
    }
    String::new()
}

/// The file name wins whenever it encodes a chapter
fn prefer_file_chapter(from_context: &str, href: &str) -> String {
    let from_file = chapter_from_href(href);
    if from_file.is_empty() {
        from_context.to_string()
    } else {
        from_file
    }
}

fn chapter_and_title(text: &str) -> (String, String) {
    match CHAPTER_TITLE.captures(text) {
        Some(c) => (c[1].trim().to_uppercase(), c[2].trim().to_string()),
        None => (String::new(), String::new()),
    }
}

fn near_block_text(link: &ElementRef) -> String {
    let ancestors: Vec<ElementRef> = link.ancestors().filter_map(ElementRef::wrap).collect();
    let block = NEAR_BLOCK_TAGS
        .iter()
        .find_map(|tag| ancestors.iter().find(|a| a.value().name() == *tag))
        .or_else(|| ancestors.first());
    block
        .map(|el| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
        .unwrap_or_default()
}

/// Markup-free text of the raw HTML just before `href`
fn lookbehind(html: &str, href: &str) -> String {
    let Some(end) = html.find(href) else {
        return String::new();
    };
    let mut start = end.saturating_sub(LOOKBEHIND_CHARS);
    while !html.is_char_boundary(start) {
        start -= 1;
    }
    collapse_whitespace(&TAG.replace_all(&html[start..end], " "))
}

/// `1,5 MB` -> 1572864; binary multiples
pub fn size_to_bytes(size_text: &str) -> Option<u64> {
    let normalized = size_text.replace(',', ".").to_uppercase();
    let caps = SIZE_PARTS.captures(&normalized)?;
    let n: f64 = caps[1].parse().ok()?;
    let factor = match &caps[2] {
        "MB" => 1024.0 * 1024.0,
        "KB" => 1024.0,
        _ => 1.0,
    };
    Some((n * factor) as u64)
}

fn final_filename(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}
