//! Core types for gazette-dl

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one logical gazette edition (or its extra counterpart) for a given day
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    /// Publication date
    pub date: NaiveDate,
    /// Edition number as printed by the publisher (digit string)
    pub edition_number: String,
    /// Whether this is a supplementary / extraordinary edition
    pub is_extra_edition: bool,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} edition {} (extra: {})",
            self.date, self.edition_number, self.is_extra_edition
        )
    }
}

/// Free-text label distinguishing the physical documents of one [`GroupKey`]
///
/// Compared case-sensitively and ordered lexicographically by its text.
/// Empty when the edition has a single document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartKey(pub String);

impl PartKey {
    /// Create a part key from the label text
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// The label text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Branch of government that published the gazette
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Power {
    /// Executive branch
    Executive,
    /// Legislative branch
    Legislative,
    /// Both branches share the publication
    ExecutiveLegislative,
}

impl Power {
    /// Value stored in the `power` column
    pub fn as_str(&self) -> &'static str {
        match self {
            Power::Executive => "executive",
            Power::Legislative => "legislative",
            Power::ExecutiveLegislative => "executive_legislative",
        }
    }
}

/// HTTP method of a pre-built request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
    /// GET
    Get,
    /// POST
    Post,
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestMethod::Get => f.write_str("GET"),
            RequestMethod::Post => f.write_str("POST"),
        }
    }
}

/// A request descriptor handed to the fetch engine
///
/// Sources build these directly when a plain URL fetch is not enough,
/// e.g. when the document is only served in answer to a form submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    /// HTTP method
    pub method: RequestMethod,
    /// Target URL
    pub url: String,
    /// Extra request headers
    pub headers: Vec<(String, String)>,
    /// Form fields sent url-encoded in the body
    pub form: Option<Vec<(String, String)>>,
}

impl FetchRequest {
    /// Plain GET request without extra headers
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: RequestMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            form: None,
        }
    }

    /// Form submission (POST with url-encoded body)
    pub fn form_post(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            method: RequestMethod::Post,
            url: url.into(),
            headers: Vec::new(),
            form: Some(form),
        }
    }

    /// Add a header to the request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Compact `METHOD URL` form kept after the request has been served
    pub fn summary(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}

/// Reference to one document of a gazette
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocumentRef {
    /// Fetched with a plain GET, source header overrides applied
    Url(String),
    /// Pre-built request passed through to the fetch engine as is
    Request(FetchRequest),
}

impl DocumentRef {
    /// URL the document is requested from
    pub fn url(&self) -> &str {
        match self {
            DocumentRef::Url(url) => url,
            DocumentRef::Request(request) => &request.url,
        }
    }

    /// Textual form used in finished records: the URL, or `METHOD URL` for requests
    pub fn describe(&self) -> String {
        match self {
            DocumentRef::Url(url) => url.clone(),
            DocumentRef::Request(request) => request.summary(),
        }
    }
}

/// Canonical gazette record emitted by the aggregator
#[derive(Clone, Debug, PartialEq)]
pub struct GazetteRecord {
    /// Publication date
    pub date: NaiveDate,
    /// Edition number (digit string)
    pub edition_number: String,
    /// Whether this is an extra edition
    pub is_extra_edition: bool,
    /// Publishing branch, constant per source
    pub power: Power,
    /// IBGE territory code, filled by enrichment when absent
    pub territory_id: Option<String>,
    /// Harvest timestamp, filled by enrichment when absent
    pub scraped_at: Option<DateTime<Utc>>,
    /// Documents ordered by part key
    pub documents: Vec<DocumentRef>,
}

impl GazetteRecord {
    /// Group key this record was emitted for
    pub fn group_key(&self) -> GroupKey {
        GroupKey {
            date: self.date,
            edition_number: self.edition_number.clone(),
            is_extra_edition: self.is_extra_edition,
        }
    }
}

/// Whether a resolved document was written by this harvest
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Written to storage by this harvest
    New,
    /// An identical file was already at the storage path
    AlreadyStored,
}

/// A document resolved to its storage location
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileArtifact {
    /// IBGE territory code
    pub territory_id: String,
    /// Gazette date
    pub date: NaiveDate,
    /// Stored filename (last path segment)
    pub filename: String,
    /// Relative storage path `<territory_id>/<YYYY-MM-DD>/<filename>`
    pub path: String,
    /// URL the document was requested from
    pub url: String,
    /// MD5 hex digest of the document body
    pub checksum: String,
    /// New or already stored
    pub status: FileStatus,
}

/// Outcome of fetching one document
#[derive(Clone, Debug, PartialEq)]
pub enum FileOutcome {
    /// Document fetched and resolved
    Stored(FileArtifact),
    /// Fetching or storing failed; siblings are unaffected
    Failed {
        /// URL the document was requested from
        url: String,
        /// Why the document could not be retrieved
        error: String,
    },
}

impl FileOutcome {
    /// The artifact, if this document was resolved
    pub fn artifact(&self) -> Option<&FileArtifact> {
        match self {
            FileOutcome::Stored(artifact) => Some(artifact),
            FileOutcome::Failed { .. } => None,
        }
    }
}

/// A record after all of its documents have been attempted
#[derive(Clone, Debug, PartialEq)]
pub struct FinishedRecord {
    /// Publication date
    pub date: NaiveDate,
    /// Edition number (digit string)
    pub edition_number: String,
    /// Whether this is an extra edition
    pub is_extra_edition: bool,
    /// Publishing branch
    pub power: Power,
    /// IBGE territory code
    pub territory_id: String,
    /// Harvest timestamp
    pub scraped_at: DateTime<Utc>,
    /// Document references in part-key order: URLs, or `METHOD URL` summaries
    pub document_refs: Vec<String>,
    /// Per-document outcomes, same order as `document_refs`
    pub files: Vec<FileOutcome>,
}

/// Inclusive date range and territory of one harvest
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrawlBounds {
    /// First date of interest (inclusive)
    pub start_date: NaiveDate,
    /// Last date of interest (inclusive)
    pub end_date: NaiveDate,
    /// IBGE territory code of the publishing entity
    pub territory_id: String,
}

impl CrawlBounds {
    /// Whether `date` lies inside the bounds
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}
