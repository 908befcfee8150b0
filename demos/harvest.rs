//! Harvest Ji-Paraná gazettes
//!
//! Usage:
//!
//! ```text
//! cargo run --example harvest -- [config.json] [start YYYY-MM-DD] [end YYYY-MM-DD]
//! ```
//!
//! Without a configuration file, documents go to `./data` and records are
//! persisted to `./data/gazettes.db`. Set `RUST_LOG=gazette_dl=debug` for
//! per-page details. Ctrl+C stops the harvest after the running requests.

use chrono::NaiveDate;
use gazette_dl::{Config, GazetteHarvester, GazetteSource, JiParanaSource, harvest_with_shutdown};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("gazette_dl=info".parse()?))
        .init();

    let mut args = std::env::args().skip(1);

    let config = match args.next() {
        Some(path) => Config::from_json_file(Path::new(&path))?,
        None => {
            let mut config = Config::default();
            config.persistence.database_path = Some(PathBuf::from("./data/gazettes.db"));
            config
        }
    };
    let start = args
        .next()
        .map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d"))
        .transpose()?;
    let end = args
        .next()
        .map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d"))
        .transpose()?;

    let source = JiParanaSource::new()?;
    let bounds = source.crawl_bounds(start, end);
    info!(
        source = source.name(),
        start = %bounds.start_date,
        end = %bounds.end_date,
        download_dir = %config.download_dir().display(),
        "Harvest configured"
    );

    let harvester = GazetteHarvester::from_config(config).await?;
    let summary = harvest_with_shutdown(&harvester, &source, &bounds).await?;

    println!("Pages:     {} ok, {} failed", summary.pages_processed, summary.pages_failed);
    println!(
        "Records:   {} emitted, {} dropped for conflicting parts",
        summary.records_emitted, summary.records_dropped
    );
    println!(
        "Documents: {} new, {} already stored, {} failed",
        summary.documents_stored, summary.documents_already_stored, summary.documents_failed
    );
    println!(
        "Database:  {} inserted, {} failed",
        summary.sink.inserted, summary.sink.failed
    );
    if summary.cancelled {
        println!("Harvest was interrupted");
    }

    Ok(())
}
