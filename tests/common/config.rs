//! Harvester and source construction for tests

use chrono::NaiveDate;
use gazette_dl::{
    Config, CrawlBounds, FinishedRecord, GazetteHarvester, JiParanaSource, RecordSink,
    RetryConfig, SinkReport, ThrottleConfig,
};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Unthrottled settings so tests do not wait on politeness delays
pub fn fast_throttle() -> ThrottleConfig {
    ThrottleConfig {
        max_concurrent_requests: 4,
        download_delay: Duration::ZERO,
        randomize_download_delay: false,
        ..Default::default()
    }
}

/// Configuration storing under `download_dir`, without retries
pub fn test_config(download_dir: &Path) -> Config {
    let mut config = Config::default();
    config.fetch.download_dir = download_dir.to_path_buf();
    config.fetch.request_timeout = Duration::from_secs(10);
    config.throttle = fast_throttle();
    config.retry = RetryConfig {
        max_attempts: 0,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(10),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config
}

/// Ji-Paraná source reading from the mock server
pub fn mock_source(base_url: &str) -> JiParanaSource {
    JiParanaSource::with_base_url(base_url)
        .unwrap()
        .with_throttle(fast_throttle())
}

/// Bounds covering a date range of Ji-Paraná
pub fn bounds(start: (i32, u32, u32), end: (i32, u32, u32)) -> CrawlBounds {
    CrawlBounds {
        start_date: NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
        end_date: NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
        territory_id: JiParanaSource::TERRITORY_ID.to_string(),
    }
}

/// Harvester with a reqwest fetcher and no sink
pub async fn harvester(download_dir: &Path) -> GazetteHarvester {
    GazetteHarvester::from_config(test_config(download_dir))
        .await
        .unwrap()
}

/// Sink keeping every finished record in memory
#[derive(Default)]
pub struct CollectingSink {
    records: Mutex<Vec<FinishedRecord>>,
}

impl CollectingSink {
    /// Records received so far, sorted by date, edition and extra flag
    pub fn records(&self) -> Vec<FinishedRecord> {
        let mut records = self.records.lock().unwrap().clone();
        records.sort_by(|a, b| {
            (a.date, &a.edition_number, a.is_extra_edition).cmp(&(
                b.date,
                &b.edition_number,
                b.is_extra_edition,
            ))
        });
        records
    }
}

#[async_trait::async_trait]
impl RecordSink for CollectingSink {
    async fn persist(&self, record: &FinishedRecord) -> SinkReport {
        self.records.lock().unwrap().push(record.clone());
        SinkReport::default()
    }
}

/// Harvester delivering to a [`CollectingSink`]
pub async fn collecting_harvester(download_dir: &Path) -> (GazetteHarvester, Arc<CollectingSink>) {
    let sink = Arc::new(CollectingSink::default());
    let harvester = harvester(download_dir).await.with_sink(sink.clone());
    (harvester, sink)
}
