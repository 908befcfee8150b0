//! Per-record document fetching
//!
//! Every document of a record becomes one fetch task. Tasks of all records
//! share one [`RequestThrottle`], so the bounded concurrency and the minimum
//! inter-request delay hold across the whole harvest. A failing document is
//! reported as [`FileOutcome::Failed`] and never affects its siblings.

use super::engine::{FetchResponse, HttpFetcher};
use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::retry::fetch_with_retry;
use crate::storage::PathResolver;
use crate::throttle::RequestThrottle;
use crate::types::{
    DocumentRef, FetchRequest, FileArtifact, FileOutcome, FileStatus, FinishedRecord,
    GazetteRecord,
};
use chrono::NaiveDate;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Drives throttled, retried fetches and resolves documents to storage
#[derive(Clone)]
pub struct FetchOrchestrator {
    fetcher: Arc<dyn HttpFetcher>,
    throttle: RequestThrottle,
    resolver: Arc<PathResolver>,
    retry: RetryConfig,
    download_dir: PathBuf,
    cancel: CancellationToken,
}

impl FetchOrchestrator {
    /// Create an orchestrator storing documents under `download_dir`
    pub fn new(
        fetcher: Arc<dyn HttpFetcher>,
        throttle: RequestThrottle,
        retry: RetryConfig,
        download_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        Ok(Self {
            fetcher,
            throttle,
            resolver: Arc::new(PathResolver::new()?),
            retry,
            download_dir: download_dir.into(),
            cancel: CancellationToken::new(),
        })
    }

    /// Use a specific path resolver
    pub fn with_resolver(mut self, resolver: PathResolver) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Stop starting new requests once `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Throttle shared by every request of this orchestrator
    pub fn throttle(&self) -> &RequestThrottle {
        &self.throttle
    }

    /// Root directory documents are stored under
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Perform one request under the shared throttle, retrying transient failures
    ///
    /// A throttle slot is taken per attempt, so backoff sleeps do not hold a slot.
    pub async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        fetch_with_retry(&self.retry, || async move {
            if self.cancel.is_cancelled() {
                return Err(Error::ShuttingDown);
            }
            let _permit = tokio::select! {
                permit = self.throttle.acquire() => permit?,
                _ = self.cancel.cancelled() => return Err(Error::ShuttingDown),
            };
            self.fetcher.fetch(request).await
        })
        .await
    }

    /// One request per document, in document order
    ///
    /// Plain URLs become GET requests carrying `header_overrides`; pre-built
    /// requests are passed through untouched.
    pub fn build_requests(
        record: &GazetteRecord,
        header_overrides: &[(String, String)],
    ) -> Vec<FetchRequest> {
        record
            .documents
            .iter()
            .map(|document| match document {
                DocumentRef::Url(url) => header_overrides
                    .iter()
                    .fold(FetchRequest::get(url.clone()), |request, (name, value)| {
                        request.with_header(name.clone(), value.clone())
                    }),
                DocumentRef::Request(request) => request.clone(),
            })
            .collect()
    }

    /// Fetch every document of an enriched record and merge the outcomes
    ///
    /// # Errors
    /// Returns [`Error::MissingField`] if the record has not been enriched with
    /// a territory id and a harvest timestamp. Document failures are reported
    /// in the returned record, not as an error.
    pub async fn fetch_record(
        &self,
        record: GazetteRecord,
        header_overrides: &[(String, String)],
    ) -> Result<FinishedRecord> {
        let territory_id = record
            .territory_id
            .clone()
            .ok_or(Error::MissingField("territory_id"))?;
        let scraped_at = record.scraped_at.ok_or(Error::MissingField("scraped_at"))?;

        let requests = Self::build_requests(&record, header_overrides);
        let files = join_all(
            requests
                .iter()
                .map(|request| self.fetch_document(&territory_id, record.date, request)),
        )
        .await;

        // Request descriptors are not kept past this point, only their summaries
        let document_refs = record.documents.iter().map(DocumentRef::describe).collect();

        Ok(FinishedRecord {
            date: record.date,
            edition_number: record.edition_number,
            is_extra_edition: record.is_extra_edition,
            power: record.power,
            territory_id,
            scraped_at,
            document_refs,
            files,
        })
    }

    /// Fetch and store one document, converting any failure into an outcome
    pub async fn fetch_document(
        &self,
        territory_id: &str,
        date: NaiveDate,
        request: &FetchRequest,
    ) -> FileOutcome {
        let result = match self.fetch(request).await {
            Ok(response) => self.store(territory_id, date, request, &response).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(artifact) => FileOutcome::Stored(artifact),
            Err(e) => {
                warn!(
                    url = %request.url,
                    %date,
                    error = %e,
                    "Document could not be retrieved"
                );
                FileOutcome::Failed {
                    url: request.url.clone(),
                    error: e.to_string(),
                }
            }
        }
    }

    async fn store(
        &self,
        territory_id: &str,
        date: NaiveDate,
        request: &FetchRequest,
        response: &FetchResponse,
    ) -> Result<FileArtifact> {
        let location = self
            .resolver
            .resolve(territory_id, date, &request.url, Some(&response.headers));
        let checksum = format!("{:x}", md5::compute(&response.body));
        let absolute = self.download_dir.join(&location.relative);

        let status = if has_checksum(&absolute, &checksum).await {
            debug!(path = %location.relative, "Document already stored");
            FileStatus::AlreadyStored
        } else {
            write_file(&absolute, &response.body).await?;
            FileStatus::New
        };

        Ok(FileArtifact {
            territory_id: territory_id.to_string(),
            date,
            filename: location.filename,
            path: location.relative,
            url: request.url.clone(),
            checksum,
            status,
        })
    }
}

/// Whether `path` holds a file whose MD5 is `checksum`
async fn has_checksum(path: &Path, checksum: &str) -> bool {
    match tokio::fs::read(path).await {
        Ok(existing) => format!("{:x}", md5::compute(&existing)) == checksum,
        Err(_) => false,
    }
}

async fn write_file(path: &Path, body: &[u8]) -> Result<()> {
    let storage_error = |e: std::io::Error| Error::Storage {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(storage_error)?;
    }
    tokio::fs::write(path, body).await.map_err(storage_error)
}
