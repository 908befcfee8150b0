//! Harvest driver
//!
//! A harvest walks every listing page of a source for the requested bounds.
//! Pages are fetched concurrently; each page is then parsed and aggregated by
//! its own [`RecordAggregator`] in one synchronous pass, so aggregation state is
//! never shared between pages. Emitted records are enriched, their documents
//! fetched under the shared throttle, and the finished records handed to the
//! sink.

use crate::aggregator::RecordAggregator;
use crate::config::Config;
use crate::db::{Database, RecordSink, SinkReport};
use crate::enrich::Enricher;
use crate::error::Result;
use crate::fetch::{FetchOrchestrator, HttpFetcher, ReqwestFetcher};
use crate::listing::ListingPage;
use crate::source::GazetteSource;
use crate::throttle::RequestThrottle;
use crate::types::{CrawlBounds, FetchRequest, FileOutcome, FileStatus, FinishedRecord};
use futures::StreamExt;
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counters of one harvest
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HarvestSummary {
    /// Listing pages fetched and parsed
    pub pages_processed: usize,
    /// Listing pages that could not be fetched or parsed
    pub pages_failed: usize,
    /// Listing entries skipped for lying outside the crawl bounds
    pub entries_out_of_bounds: usize,
    /// Records emitted by aggregation and kept by enrichment
    pub records_emitted: usize,
    /// Editions dropped because a part pointed at more than one URL
    pub records_dropped: usize,
    /// Documents written to storage
    pub documents_stored: usize,
    /// Documents found identical at their storage path
    pub documents_already_stored: usize,
    /// Documents that could not be retrieved
    pub documents_failed: usize,
    /// What the sink did with the documents
    pub sink: SinkReport,
    /// Whether the harvest stopped early because it was cancelled
    pub cancelled: bool,
}

impl HarvestSummary {
    fn absorb(&mut self, other: HarvestSummary) {
        self.pages_processed += other.pages_processed;
        self.pages_failed += other.pages_failed;
        self.entries_out_of_bounds += other.entries_out_of_bounds;
        self.records_emitted += other.records_emitted;
        self.records_dropped += other.records_dropped;
        self.documents_stored += other.documents_stored;
        self.documents_already_stored += other.documents_already_stored;
        self.documents_failed += other.documents_failed;
        self.sink += other.sink;
    }

    fn count_files(&mut self, record: &FinishedRecord) {
        for outcome in &record.files {
            match outcome {
                FileOutcome::Stored(artifact) if artifact.status == FileStatus::New => {
                    self.documents_stored += 1
                }
                FileOutcome::Stored(_) => self.documents_already_stored += 1,
                FileOutcome::Failed { .. } => self.documents_failed += 1,
            }
        }
    }
}

/// Runs harvests of gazette sources
///
/// # Examples
///
/// ```no_run
/// use gazette_dl::{Config, GazetteHarvester, GazetteSource, JiParanaSource};
///
/// # async fn example() -> gazette_dl::Result<()> {
/// let harvester = GazetteHarvester::from_config(Config::default()).await?;
/// let source = JiParanaSource::new()?;
/// let bounds = source.crawl_bounds(None, None);
///
/// let summary = harvester.run(&source, &bounds).await?;
/// println!("{} records", summary.records_emitted);
/// # Ok(())
/// # }
/// ```
pub struct GazetteHarvester {
    config: Config,
    fetcher: Arc<dyn HttpFetcher>,
    sink: Option<Arc<dyn RecordSink>>,
    cancel: CancellationToken,
}

impl GazetteHarvester {
    /// Create a harvester using `fetcher` and no sink
    ///
    /// # Errors
    /// Returns error if the configuration is invalid
    pub fn new(config: Config, fetcher: Arc<dyn HttpFetcher>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            fetcher,
            sink: None,
            cancel: CancellationToken::new(),
        })
    }

    /// Create a harvester with a reqwest fetcher and, when a database path is
    /// configured, a SQLite sink
    pub async fn from_config(config: Config) -> Result<Self> {
        let fetcher = Arc::new(ReqwestFetcher::new(&config.fetch)?);
        let database = match &config.persistence.database_path {
            Some(path) => Some(Database::new(path).await?),
            None => None,
        };

        let harvester = Self::new(config, fetcher)?;
        Ok(match database {
            Some(database) => harvester.with_sink(Arc::new(database)),
            None => harvester,
        })
    }

    /// Deliver finished records to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Harvester settings
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Token that cancels running harvests when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop starting new requests; running harvests return early
    pub fn cancel(&self) {
        info!("Harvest cancellation requested");
        self.cancel.cancel();
    }

    /// Harvest every listing page of `source` covering `bounds`
    ///
    /// Page, record and document failures are logged and counted; only setup
    /// failures (invalid throttle settings, storage patterns) are returned as errors.
    pub async fn run(
        &self,
        source: &dyn GazetteSource,
        bounds: &CrawlBounds,
    ) -> Result<HarvestSummary> {
        let throttle_config = source
            .custom_throttle()
            .unwrap_or_else(|| self.config.throttle.clone());
        let concurrency = throttle_config.max_concurrent_requests;
        let throttle = RequestThrottle::new(throttle_config)?;
        let orchestrator = FetchOrchestrator::new(
            self.fetcher.clone(),
            throttle,
            self.config.retry.clone(),
            self.config.download_dir().clone(),
        )?
        .with_cancellation(self.cancel.clone());

        let harvest = PageHarvest {
            source,
            bounds,
            orchestrator: &orchestrator,
            enricher: Enricher::for_bounds(bounds),
            headers: source.document_headers(),
            sink: self.sink.as_deref(),
        };

        let pages = source.listing_pages(bounds);
        info!(
            source = source.name(),
            territory_id = %bounds.territory_id,
            start_date = %bounds.start_date,
            end_date = %bounds.end_date,
            pages = pages.len(),
            "Starting harvest"
        );

        let mut summary = futures::stream::iter(pages)
            .map(|page| harvest.run_page(page))
            .buffer_unordered(concurrency)
            .fold(HarvestSummary::default(), |mut total, page| async move {
                total.absorb(page);
                total
            })
            .await;
        summary.cancelled = self.cancel.is_cancelled();

        info!(
            source = source.name(),
            pages = summary.pages_processed,
            pages_failed = summary.pages_failed,
            records = summary.records_emitted,
            dropped = summary.records_dropped,
            stored = summary.documents_stored,
            already_stored = summary.documents_already_stored,
            failed = summary.documents_failed,
            cancelled = summary.cancelled,
            "Harvest finished"
        );
        Ok(summary)
    }
}

/// Everything one listing page needs, borrowed for the duration of a harvest
struct PageHarvest<'a> {
    source: &'a dyn GazetteSource,
    bounds: &'a CrawlBounds,
    orchestrator: &'a FetchOrchestrator,
    enricher: Enricher,
    headers: Vec<(String, String)>,
    sink: Option<&'a dyn RecordSink>,
}

impl PageHarvest<'_> {
    async fn run_page(&self, page: ListingPage) -> HarvestSummary {
        let mut summary = HarvestSummary::default();

        let html = match self.orchestrator.fetch(&FetchRequest::get(page.url.clone())).await {
            Ok(response) => response.text(),
            Err(e) => {
                warn!(page = %page.url, error = %e, "Listing page could not be fetched");
                summary.pages_failed = 1;
                return summary;
            }
        };

        let entries = match self.source.parse_listing(&html, &page) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(page = %page.url, error = %e, "Listing page could not be parsed");
                summary.pages_failed = 1;
                return summary;
            }
        };
        summary.pages_processed = 1;

        // One aggregator per page, filled and finalized without suspension
        let mut aggregator = RecordAggregator::new(self.source.power());
        for entry in entries {
            if !self.bounds.contains(entry.key.date) {
                debug!(date = %entry.key.date, url = %entry.url, "Entry outside crawl bounds");
                summary.entries_out_of_bounds += 1;
                continue;
            }
            aggregator.insert(entry);
        }
        let page_records = aggregator.finalize();
        summary.records_dropped = page_records.dropped_groups();

        let records: Vec<_> = page_records
            .records
            .into_iter()
            .filter_map(|record| self.enricher.enrich(record))
            .collect();
        summary.records_emitted = records.len();

        let finished = join_all(
            records
                .into_iter()
                .map(|record| self.orchestrator.fetch_record(record, &self.headers)),
        )
        .await;

        for result in finished {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!(page = %page.url, error = %e, "Record could not be fetched");
                    continue;
                }
            };
            summary.count_files(&record);
            if let Some(sink) = self.sink {
                summary.sink += sink.persist(&record).await;
            }
        }

        debug!(
            page = %page.url,
            records = summary.records_emitted,
            dropped = summary.records_dropped,
            "Listing page done"
        );
        summary
    }
}
