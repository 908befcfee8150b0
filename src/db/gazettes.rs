//! Gazette row persistence.

use crate::error::DatabaseError;
use crate::types::{FileArtifact, FileOutcome, FileStatus, FinishedRecord};
use crate::{Error, Result};
use async_trait::async_trait;
use sqlx::SqliteConnection;
use tracing::{debug, warn};

use super::{Database, GazetteRow, RecordSink, SinkReport};

impl Database {
    /// Insert one stored document of a record in its own transaction
    ///
    /// The transaction is rolled back on failure. A second document with the same
    /// checksum is rejected as [`DatabaseError::ConstraintViolation`].
    pub async fn insert_gazette(
        &self,
        record: &FinishedRecord,
        artifact: &FileArtifact,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await.map_err(Error::Sqlx)?;

        match Self::insert_gazette_row(&mut tx, record, artifact).await {
            Ok(id) => {
                tx.commit().await.map_err(Error::Sqlx)?;
                Ok(id)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    async fn insert_gazette_row(
        conn: &mut SqliteConnection,
        record: &FinishedRecord,
        artifact: &FileArtifact,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO gazettes (
                date, edition_number, is_extra_edition, power, scraped_at,
                territory_id, file_path, file_url, file_checksum
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.date.format("%Y-%m-%d").to_string())
        .bind(&record.edition_number)
        .bind(record.is_extra_edition)
        .bind(record.power.as_str())
        .bind(record.scraped_at.timestamp())
        .bind(&record.territory_id)
        .bind(&artifact.path)
        .bind(&artifact.url)
        .bind(&artifact.checksum)
        .execute(&mut *conn)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::Database(DatabaseError::ConstraintViolation(format!(
                    "checksum {} already recorded",
                    artifact.checksum
                )))
            }
            other => Error::Sqlx(other),
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Gazette rows of a territory, oldest first
    pub async fn list_gazettes(&self, territory_id: &str) -> Result<Vec<GazetteRow>> {
        sqlx::query_as::<_, GazetteRow>(
            r#"
            SELECT id, source_text, date, edition_number, is_extra_edition, power,
                   scraped_at, territory_id, file_path, file_url, file_checksum
            FROM gazettes
            WHERE territory_id = ?
            ORDER BY date ASC, id ASC
            "#,
        )
        .bind(territory_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Sqlx)
    }

    /// Total number of gazette rows
    pub async fn count_gazettes(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM gazettes")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Sqlx)
    }

    /// Whether a document with this checksum was already recorded
    pub async fn has_checksum(&self, checksum: &str) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM gazettes WHERE file_checksum = ? LIMIT 1")
                .bind(checksum)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Sqlx)?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl RecordSink for Database {
    async fn persist(&self, record: &FinishedRecord) -> SinkReport {
        let mut report = SinkReport::default();

        for outcome in &record.files {
            let artifact = match outcome {
                FileOutcome::Stored(artifact) if artifact.status == FileStatus::New => artifact,
                FileOutcome::Stored(artifact) => {
                    debug!(path = %artifact.path, "Document already stored, not persisting");
                    report.skipped += 1;
                    continue;
                }
                FileOutcome::Failed { .. } => {
                    report.skipped += 1;
                    continue;
                }
            };

            match self.insert_gazette(record, artifact).await {
                Ok(_) => report.inserted += 1,
                Err(e) => {
                    warn!(
                        date = %record.date,
                        checksum = %artifact.checksum,
                        error = %e,
                        "Something wrong has happened when adding the gazette in the database"
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }
}
