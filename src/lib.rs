//! # gazette-dl
//!
//! Harvester for official gazette listings.
//!
//! ## Design Philosophy
//!
//! gazette-dl is designed to be:
//! - **Page-scoped** - Each listing page is aggregated on its own; duplicates and
//!   conflicts are resolved inside the page, never across pages
//! - **Deterministic** - Records list their documents in part order and every
//!   document lands at a reproducible `<territory>/<date>/<name>` path
//! - **Polite** - All requests of a harvest share one bounded, delayed throttle
//! - **Library-first** - No CLI, purely a Rust crate for embedding
//!
//! ## Quick Start
//!
//! ```no_run
//! use gazette_dl::{Config, GazetteHarvester, GazetteSource, JiParanaSource};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.persistence.database_path = Some(PathBuf::from("./data/gazettes.db"));
//!
//!     let harvester = GazetteHarvester::from_config(config).await?;
//!     let source = JiParanaSource::new()?;
//!     let bounds = source.crawl_bounds(None, None);
//!
//!     let summary = harvester.run(&source, &bounds).await?;
//!     println!("{:?}", summary);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Page-scoped record aggregation
pub mod aggregator;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Record enrichment
pub mod enrich;
/// Error types
pub mod error;
/// HTTP fetch engine and document orchestration
pub mod fetch;
/// Harvest driver
pub mod harvester;
/// Listing page extraction
pub mod listing;
/// Retry logic with exponential backoff
pub mod retry;
/// Gazette sources
pub mod source;
/// Storage path resolution
pub mod storage;
/// Shared request throttling
pub mod throttle;
/// Core types
pub mod types;

// Re-export commonly used types
pub use aggregator::{PageRecords, PartConflict, RecordAggregator};
pub use config::{Config, FetchConfig, PersistenceConfig, RetryConfig, ThrottleConfig};
pub use db::{Database, RecordSink, SinkReport};
pub use error::{DatabaseError, Error, Result};
pub use fetch::{FetchOrchestrator, FetchResponse, HttpFetcher, ReqwestFetcher};
pub use harvester::{GazetteHarvester, HarvestSummary};
pub use listing::{ListingEntry, ListingPage, ListingParser};
pub use source::{GazetteSource, JiParanaSource};
pub use storage::{NameRule, PathResolver, StoragePath};
pub use throttle::RequestThrottle;
pub use types::{
    CrawlBounds, DocumentRef, FetchRequest, FileArtifact, FileOutcome, FileStatus,
    FinishedRecord, GazetteRecord, GroupKey, PartKey, Power, RequestMethod,
};

/// Run a harvest, cancelling it gracefully on a termination signal.
///
/// On a signal no new request starts; requests already running complete and the
/// partial summary is returned with `cancelled` set.
///
/// - **Unix:** listens for SIGTERM and SIGINT (Ctrl+C).
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use gazette_dl::{Config, GazetteHarvester, GazetteSource, JiParanaSource, harvest_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let harvester = GazetteHarvester::from_config(Config::default()).await?;
///     let source = JiParanaSource::new()?;
///     let bounds = source.crawl_bounds(None, None);
///
///     let summary = harvest_with_shutdown(&harvester, &source, &bounds).await?;
///     println!("{} documents stored", summary.documents_stored);
///
///     Ok(())
/// }
/// ```
pub async fn harvest_with_shutdown(
    harvester: &GazetteHarvester,
    source: &dyn GazetteSource,
    bounds: &CrawlBounds,
) -> Result<HarvestSummary> {
    harvest_until(harvester, source, bounds, wait_for_signal()).await
}

/// Run a harvest, cancelling it once `shutdown` resolves.
///
/// A harvest that finishes first returns its summary untouched.
pub async fn harvest_until(
    harvester: &GazetteHarvester,
    source: &dyn GazetteSource,
    bounds: &CrawlBounds,
    shutdown: impl Future<Output = ()>,
) -> Result<HarvestSummary> {
    let run = harvester.run(source, bounds);
    tokio::pin!(run);

    tokio::select! {
        summary = &mut run => summary,
        _ = shutdown => {
            tracing::info!("Shutdown requested, cancelling harvest");
            harvester.cancel();
            run.await
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
            _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
        },
        Err(e) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for Ctrl+C only");
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
    }
}
