//! Record enrichment between aggregation and fetching
//!
//! - [`DateFilter`] drops records dated before the crawl start
//! - [`DefaultValues`] fills `territory_id` and `scraped_at` when absent

use crate::types::{CrawlBounds, GazetteRecord};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

/// Drops records dated before a start date
#[derive(Clone, Debug)]
pub struct DateFilter {
    start_date: NaiveDate,
}

impl DateFilter {
    /// Filter keeping records dated on or after `start_date`
    pub fn new(start_date: NaiveDate) -> Self {
        Self { start_date }
    }

    /// The record, unless it predates the start date
    pub fn apply(&self, record: GazetteRecord) -> Option<GazetteRecord> {
        if record.date < self.start_date {
            debug!(
                date = %record.date,
                edition_number = %record.edition_number,
                "Dropping all items before {}",
                self.start_date
            );
            return None;
        }
        Some(record)
    }
}

/// Fills fields the source left unset
#[derive(Clone, Debug)]
pub struct DefaultValues {
    territory_id: String,
}

impl DefaultValues {
    /// Defaults for records of `territory_id`
    pub fn new(territory_id: impl Into<String>) -> Self {
        Self {
            territory_id: territory_id.into(),
        }
    }

    /// Fill `territory_id` and set `scraped_at` to `now` where absent
    pub fn apply(&self, mut record: GazetteRecord, now: DateTime<Utc>) -> GazetteRecord {
        if record.territory_id.is_none() {
            record.territory_id = Some(self.territory_id.clone());
        }
        if record.scraped_at.is_none() {
            record.scraped_at = Some(now);
        }
        record
    }
}

/// Date filtering followed by default values, in that order
#[derive(Clone, Debug)]
pub struct Enricher {
    filter: DateFilter,
    defaults: DefaultValues,
}

impl Enricher {
    /// Enrichment for a crawl over `bounds`
    pub fn for_bounds(bounds: &CrawlBounds) -> Self {
        Self {
            filter: DateFilter::new(bounds.start_date),
            defaults: DefaultValues::new(bounds.territory_id.clone()),
        }
    }

    /// Enrich one record, stamping it with the current time
    pub fn enrich(&self, record: GazetteRecord) -> Option<GazetteRecord> {
        self.enrich_at(record, Utc::now())
    }

    /// Enrich one record with an explicit harvest timestamp
    pub fn enrich_at(&self, record: GazetteRecord, now: DateTime<Utc>) -> Option<GazetteRecord> {
        self.filter
            .apply(record)
            .map(|record| self.defaults.apply(record, now))
    }
}
