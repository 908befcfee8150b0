//! Database layer for gazette-dl
//!
//! Persists finished records into SQLite, one row per stored document.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`gazettes`] - Gazette row inserts and queries, [`RecordSink`] implementation

use crate::types::FinishedRecord;
use async_trait::async_trait;
use sqlx::{FromRow, sqlite::SqlitePool};

mod gazettes;
mod migrations;

/// Receives finished records at the end of the pipeline
///
/// Implementations must not persist documents whose status is already-stored
/// and must handle per-document failures locally.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persist every newly stored document of `record`
    async fn persist(&self, record: &FinishedRecord) -> SinkReport;
}

/// What a sink did with the documents of one record
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SinkReport {
    /// Rows written
    pub inserted: usize,
    /// Documents not written because they were already stored or never fetched
    pub skipped: usize,
    /// Inserts that failed and were rolled back
    pub failed: usize,
}

impl std::ops::AddAssign for SinkReport {
    fn add_assign(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Gazette row from database
#[derive(Debug, Clone, FromRow)]
pub struct GazetteRow {
    /// Unique database ID
    pub id: i64,
    /// Extracted text of the document, filled by later processing
    pub source_text: Option<String>,
    /// Gazette date (YYYY-MM-DD)
    pub date: String,
    /// Edition number
    pub edition_number: String,
    /// Whether this is an extra edition
    pub is_extra_edition: bool,
    /// Publishing branch
    pub power: String,
    /// Unix timestamp of the harvest
    pub scraped_at: i64,
    /// IBGE territory code
    pub territory_id: String,
    /// Relative storage path of the document
    pub file_path: String,
    /// URL the document was fetched from
    pub file_url: String,
    /// MD5 hex digest of the document
    pub file_checksum: String,
}

/// Database handle for gazette-dl
pub struct Database {
    pool: SqlitePool,
}
