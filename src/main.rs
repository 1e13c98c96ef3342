use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bps_indicators::config::{valid_delay, Config, ROBOTS_SEEDS};
use bps_indicators::fetcher::HttpFetcher;
use bps_indicators::index::{crawl_index, pick_latest};
use bps_indicators::pipeline::{ingest, IngestOptions};
use bps_indicators::resource::RawResource;
use bps_indicators::robots::{check_robots, ensure_allowed, RobotsReport};
use bps_indicators::schema::{self, SeriesSchema};
use bps_indicators::selector::SheetHint;
use bps_indicators::validate::{validate_index_csv, validate_series_csv};
use bps_indicators::writer::{index_path, read_index_csv, series_path, write_index_csv, write_series_csv};

#[derive(Parser)]
#[command(name = "bps-indicators")]
#[command(about = "Crawl, download and normalize BPS social-security indicators into CSV", long_about = None)]
struct Cli {
    /// Directory for CSV artifacts (default: dataset)
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check robots.txt on the institution's hosts
    Robots,
    /// Crawl the index pages and write indicators_index.csv
    Index {
        /// Index page URL (repeatable; defaults to BPS_INDEX_PAGES)
        #[arg(long = "page")]
        pages: Vec<String>,
        /// Seconds to wait between requests
        #[arg(long)]
        delay: Option<f64>,
        /// Maximum number of index pages to crawl
        #[arg(long, default_value = "10")]
        max_pages: usize,
    },
    /// Ingest one resource into a series CSV
    Series(SeriesArgs),
    /// Ingest the latest workbook of every known series listed in the index
    Auto {
        /// Index CSV (default: <output-dir>/indicators_index.csv)
        #[arg(long)]
        index: Option<PathBuf>,
    },
    /// Validate the CSV artifacts in the output directory
    Validate,
    /// List the known series
    Schemas,
}

#[derive(Args)]
struct SeriesArgs {
    /// Series identifier (see `schemas`)
    #[arg(long)]
    series: String,
    /// Resource URL
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    url: Option<String>,
    /// Local resource file
    #[arg(long)]
    file: Option<PathBuf>,
    /// Sheet/table name, or 0-based position
    #[arg(long)]
    sheet: Option<String>,
    /// Fail instead of falling back when --sheet matches nothing
    #[arg(long)]
    strict_sheet: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,bps_indicators=debug")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    info!("Starting bps-indicators with config: {:?}", config);

    match cli.command {
        Command::Robots => run_robots(&config).await,
        Command::Index {
            pages,
            delay,
            max_pages,
        } => run_index(config, pages, delay, max_pages).await,
        Command::Series(args) => run_series(&config, args).await,
        Command::Auto { index } => run_auto(&config, index).await,
        Command::Validate => run_validate(&config),
        Command::Schemas => {
            for s in schema::all() {
                println!(
                    "{:<20} {:<6} {} -> {} [{}]",
                    s.id,
                    s.chapter_prefix,
                    s.description,
                    s.file_name(),
                    s.measure_names().join(", ")
                );
            }
            Ok(())
        }
    }
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn robots_reports(fetcher: &HttpFetcher, urls: &[String]) -> Vec<RobotsReport> {
    let pb = spinner("Checking robots.txt...".to_string());
    let reports = check_robots(fetcher, urls).await;
    pb.finish_and_clear();
    reports
}

async fn run_robots(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let fetcher = HttpFetcher::new(config.fetch_settings())?;
    let seeds: Vec<String> = ROBOTS_SEEDS.iter().map(|s| s.to_string()).collect();

    for report in robots_reports(&fetcher, &seeds).await {
        println!("\n== {} ==", report.robots_url);
        if !report.found {
            println!("(not found: crawling politely by default)");
            continue;
        }
        for line in &report.preview {
            println!("{line}");
        }
        if let Some(delay) = report.rules.crawl_delay {
            println!("Crawl-delay: {delay}s");
        }
    }
    Ok(())
}

async fn run_index(
    mut config: Config,
    pages: Vec<String>,
    delay: Option<f64>,
    max_pages: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(delay) = delay.filter(|d| valid_delay(*d)) {
        config.crawl_delay_secs = delay;
    }
    let pages = if pages.is_empty() {
        config.index_pages.clone()
    } else {
        pages
    };
    let fetcher = HttpFetcher::new(config.fetch_settings())?;

    let reports = robots_reports(&fetcher, &pages).await;
    let allowed: Vec<String> = pages
        .into_iter()
        .filter(|page| match ensure_allowed(&reports, page) {
            Ok(()) => true,
            Err(e) => {
                warn!("Skipping index page: {}", e);
                false
            }
        })
        .collect();

    let pb = spinner(format!("Crawling {} index page(s)...", allowed.len().min(max_pages)));
    let entries = crawl_index(&fetcher, &allowed, max_pages).await;
    pb.finish_with_message(format!("✓ Found {} PDF/XLS link(s)", entries.len()));

    let path = write_index_csv(&config.output_dir, &entries)?;
    println!("Index written to {}", path.display());
    Ok(())
}

#[instrument(skip_all, fields(series = %args.series))]
async fn run_series(config: &Config, args: SeriesArgs) -> Result<(), Box<dyn std::error::Error>> {
    let schema = schema::lookup(&args.series)
        .ok_or_else(|| format!("Unknown series '{}' (see `schemas`)", args.series))?;

    let resource = match (&args.url, &args.file) {
        (Some(url), _) => {
            let fetcher = HttpFetcher::new(config.fetch_settings())?;
            let reports = robots_reports(&fetcher, std::slice::from_ref(url)).await;
            ensure_allowed(&reports, url)?;
            download(&fetcher, url).await?
        }
        (None, Some(path)) => RawResource::from_path(path)?,
        (None, None) => return Err("one of --url or --file is required".into()),
    };

    let options = IngestOptions {
        sheet_hint: args.sheet.as_deref().map(SheetHint::parse),
        require_hint_match: args.strict_sheet,
    };
    ingest_and_write(config, &resource, schema, &options)?;
    Ok(())
}

async fn download(fetcher: &HttpFetcher, url: &str) -> Result<RawResource, Box<dyn std::error::Error>> {
    let pb = spinner(format!("Downloading {url}..."));
    let resource = fetcher.fetch(url).await;
    pb.finish_and_clear();
    Ok(resource?)
}

fn ingest_and_write(
    config: &Config,
    resource: &RawResource,
    schema: &SeriesSchema,
    options: &IngestOptions,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let ingested = ingest(resource, schema, options).map_err(|e| {
        error!("Ingestion of {} as '{}' failed: {}", resource.url, schema.id, e);
        e
    })?;

    for dropped in &ingested.assembly.dropped {
        info!("Row {} left out: {}", dropped.row, dropped.reason);
    }
    let path = write_series_csv(&config.output_dir, schema, &ingested.assembly)?;
    println!(
        "{}: {} record(s) from '{}' ({}, selected by {}, header row {}) -> {}",
        schema.id,
        ingested.records().len(),
        ingested.table,
        ingested.format,
        ingested.selected_by,
        ingested.header_row,
        path.display()
    );
    Ok(path)
}

async fn run_auto(config: &Config, index: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let index = index.unwrap_or_else(|| index_path(&config.output_dir));
    let entries = read_index_csv(&index)?;
    info!("Loaded {} index entries from {}", entries.len(), index.display());

    let fetcher = HttpFetcher::new(config.fetch_settings())?;
    let schemas = schema::all();

    let pb = ProgressBar::new(schemas.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("##-"),
    );

    let mut downloads: HashMap<String, RawResource> = HashMap::new();
    let mut reports: Vec<RobotsReport> = Vec::new();
    let mut checked_origins = HashSet::new();
    let mut failures = Vec::new();

    for schema in schemas {
        pb.set_message(schema.id.to_string());
        let Some(entry) = pick_latest(&entries, schema.chapter_prefix, "xls") else {
            warn!("No XLS listed for chapter {} ({})", schema.chapter_prefix, schema.id);
            failures.push(schema.id);
            pb.inc(1);
            continue;
        };
        let url = entry.download_url.clone();

        if !downloads.contains_key(&url) {
            if !downloads.is_empty() {
                fetcher.polite_delay().await;
            }
            let origin = url::Url::parse(&url)
                .map(|u| u.origin().ascii_serialization())
                .unwrap_or_default();
            if checked_origins.insert(origin) {
                reports.extend(check_robots(&fetcher, std::slice::from_ref(&url)).await);
            }
            let fetched = match ensure_allowed(&reports, &url) {
                Ok(()) => fetcher.fetch(&url).await.map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            match fetched {
                Ok(resource) => {
                    downloads.insert(url.clone(), resource);
                }
                Err(e) => {
                    error!("Download of {} failed: {}", url, e);
                    failures.push(schema.id);
                    pb.inc(1);
                    continue;
                }
            }
        }

        if let Some(resource) = downloads.get(&url) {
            if let Err(e) = ingest_and_write(config, resource, schema, &IngestOptions::default()) {
                error!("Series {} failed: {}", schema.id, e);
                failures.push(schema.id);
            }
        }
        pb.inc(1);
    }

    pb.finish_with_message(format!(
        "✓ {} of {} series written",
        schemas.len() - failures.len(),
        schemas.len()
    ));

    if failures.is_empty() {
        Ok(())
    } else {
        Err(format!("series not produced: {}", failures.join(", ")).into())
    }
}

fn run_validate(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let dir = &config.output_dir;
    let mut checked = 0;
    let mut failed = 0;

    let mut report = |name: String, outcome: Result<usize, String>| {
        checked += 1;
        match outcome {
            Ok(rows) => println!("✓ {name}: {rows} row(s)"),
            Err(e) => {
                failed += 1;
                println!("✗ {name}: {e}");
            }
        }
    };

    let index = index_path(dir);
    if index.exists() {
        report(display_name(&index), validate_index_csv(&index).map_err(|e| e.to_string()));
    }
    for schema in schema::all() {
        let path = series_path(dir, schema);
        if path.exists() {
            report(
                display_name(&path),
                validate_series_csv(&path, schema).map_err(|e| e.to_string()),
            );
        }
    }

    if checked == 0 {
        return Err(format!("No CSV artifacts found in {}", dir.display()).into());
    }
    if failed > 0 {
        return Err(format!("{failed} of {checked} file(s) failed validation").into());
    }
    println!("All {checked} file(s) valid");
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
