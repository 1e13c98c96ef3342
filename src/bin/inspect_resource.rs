use std::path::PathBuf;

use bps_indicators::extract::extract;
use bps_indicators::header::{find_header_row, HEADER_SCAN_WINDOW};
use bps_indicators::resource::RawResource;
use bps_indicators::schema;
use bps_indicators::sniffer::sniff;
use clap::Parser;

/// Print the sniffed format and the first rows of every candidate table
#[derive(Parser)]
#[command(name = "inspect-resource")]
#[command(about = "Show how a downloaded resource is seen by the extractor", long_about = None)]
struct Cli {
    /// Local file to inspect
    path: PathBuf,

    /// Rows to show per candidate
    #[arg(long, default_value = "15")]
    rows: usize,

    /// Columns to show per row
    #[arg(long, default_value = "10")]
    cols: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let resource = RawResource::from_path(&cli.path)?;

    println!("Resource: {} ({} bytes)", resource.url, resource.bytes.len());
    let declared = resource.declared_extension();
    let format = sniff(&resource.bytes, declared.as_deref())?;
    println!(
        "Declared extension: {}   Sniffed format: {format}",
        declared.as_deref().unwrap_or("(none)")
    );

    let candidates = extract(&resource.bytes, format)?;
    let anchors = schema::all()
        .first()
        .map(|s| s.anchor_labels)
        .unwrap_or_default();

    for table in &candidates {
        println!("\n{}", "=".repeat(100));
        println!(
            "Candidate {}: '{}' ({} rows x {} cols)",
            table.origin.index,
            table.origin.label(),
            table.rows.len(),
            table.width()
        );
        match find_header_row(table, anchors) {
            Some(i) => println!("Header anchor at row {}", table.rows[i].number),
            None => println!("No header anchor in the first {HEADER_SCAN_WINDOW} rows"),
        }
        println!("{}", "=".repeat(100));

        for row in table.rows.iter().take(cli.rows) {
            print!("Row {:3}: ", row.number);
            for cell in row.cells.iter().take(cli.cols) {
                if cell.is_blank() {
                    print!("[empty] ");
                } else {
                    print!("[{cell}] ");
                }
            }
            println!();
        }
    }

    Ok(())
}
