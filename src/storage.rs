//! Storage path resolution
//!
//! Documents are stored under `<territory_id>/<YYYY-MM-DD>/<filename>`. The
//! filename normally derives from the request URL (a SHA-1 of the URL plus the
//! URL's document extension). Some servers make that unreliable; those are
//! listed in small per-territory tables below and handled separately:
//!
//! - content sniffing: the real filename is read from the response's
//!   `Content-Disposition` header and the stored name is the SHA-1 of
//!   those exact bytes, so the same document fetched from another URL keeps
//!   its name;
//! - wrong extension: when sniffing is not possible the URL-derived name is
//!   used without its extension, because the extension these servers put in
//!   their URLs does not describe the content.

use crate::error::{Error, Result};
use chrono::NaiveDate;
use regex::bytes::Regex;
use reqwest::header::{CONTENT_DISPOSITION, HeaderMap};
use sha1::{Digest, Sha1};
use tracing::info;
use url::Url;

/// Territories whose document URLs end in a generic technical extension
/// (`.xhtml`) regardless of the served content; the real filename is only
/// available from the response headers.
pub const CONTENT_SNIFFING_TERRITORIES: &[&str] = &[
    "3543402", // Ribeirão Preto - SP
];

/// Extensions kept on URL-derived names
const KNOWN_DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "odt", "rtf", "txt", "htm", "html", "xhtml", "xml", "zip", "rar",
    "jpg", "jpeg", "png",
];

/// Prefix of the default retrieval path, dropped from stored names
const MEDIA_PATH_PREFIX: &str = "full/";

/// Real filename inside a `Content-Disposition` value
const REAL_FILENAME_PATTERN: &str = r#"filename="((?-u:[^"])+)""#;

/// Which rule produced a stored filename
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameRule {
    /// URL-derived default name
    Default,
    /// URL-derived name with its misleading extension removed
    ExtensionStripped,
    /// Hex digest of the filename sniffed from the response headers
    ContentDigest,
}

/// Resolved storage location of one document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoragePath {
    /// Last path segment
    pub filename: String,
    /// `<territory_id>/<YYYY-MM-DD>/<filename>`
    pub relative: String,
    /// Rule the filename came from
    pub rule: NameRule,
}

/// Computes storage paths for documents
pub struct PathResolver {
    sniffing_territories: Vec<String>,
    real_filename: Regex,
}

impl PathResolver {
    /// Resolver with the built-in content-sniffing territories
    pub fn new() -> Result<Self> {
        Self::with_sniffing_territories(CONTENT_SNIFFING_TERRITORIES.iter().copied())
    }

    /// Resolver with an explicit content-sniffing territory table
    pub fn with_sniffing_territories<I, S>(territories: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let real_filename = Regex::new(REAL_FILENAME_PATTERN)
            .map_err(|e| Error::Other(format!("invalid filename pattern: {}", e)))?;
        Ok(Self {
            sniffing_territories: territories.into_iter().map(Into::into).collect(),
            real_filename,
        })
    }

    /// Whether documents of `territory_id` get the content-sniffing treatment
    pub fn sniffs_content(&self, territory_id: &str) -> bool {
        self.sniffing_territories.iter().any(|t| t == territory_id)
    }

    /// Real filename embedded in the response's `Content-Disposition` header
    pub fn sniff_real_filename<'h>(&self, headers: &'h HeaderMap) -> Option<&'h [u8]> {
        let value = headers.get(CONTENT_DISPOSITION)?;
        let caps = self.real_filename.captures(value.as_bytes())?;
        caps.get(1).map(|m| m.as_bytes())
    }

    /// Compute the storage path of a document
    ///
    /// `headers` are the response headers when a response is available; they are
    /// only consulted for content-sniffing territories.
    pub fn resolve(
        &self,
        territory_id: &str,
        date: NaiveDate,
        request_url: &str,
        headers: Option<&HeaderMap>,
    ) -> StoragePath {
        if !self.sniffs_content(territory_id) {
            return storage_path(
                territory_id,
                date,
                default_base_name(request_url),
                NameRule::Default,
            );
        }

        match headers {
            Some(headers) if headers.contains_key(CONTENT_DISPOSITION) => {
                if let Some(real_name) = self.sniff_real_filename(headers) {
                    return storage_path(
                        territory_id,
                        date,
                        hex_digest(real_name),
                        NameRule::ContentDigest,
                    );
                }
                info!(
                    "Unable to extract the actual file name for {} entry of territory_id {}. Falling back to request URL-based filename calculation",
                    date, territory_id
                );
            }
            Some(_) => {
                info!(
                    "Unable to extract Content-Disposition header for {} entry of territory_id {}. Falling back to request URL-based filename calculation",
                    date, territory_id
                );
            }
            None => {}
        }

        let name = default_base_name(request_url);
        storage_path(
            territory_id,
            date,
            strip_extension(&name).to_string(),
            NameRule::ExtensionStripped,
        )
    }
}

fn storage_path(
    territory_id: &str,
    date: NaiveDate,
    filename: String,
    rule: NameRule,
) -> StoragePath {
    StoragePath {
        relative: format!("{}/{}/{}", territory_id, date.format("%Y-%m-%d"), filename),
        filename,
        rule,
    }
}

/// Lowercase hex SHA-1 of `bytes`
pub fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Default retrieval path of a document: `full/<sha1(url)><ext>`
pub fn default_media_path(url: &str) -> String {
    format!("{}{}{}", MEDIA_PATH_PREFIX, hex_digest(url.as_bytes()), url_extension(url))
}

/// Default retrieval name without its technical `full/` prefix
pub fn default_base_name(url: &str) -> String {
    let media_path = default_media_path(url);
    media_path
        .strip_prefix(MEDIA_PATH_PREFIX)
        .map(str::to_string)
        .unwrap_or(media_path)
}

/// `.ext` of the URL path's last segment when it is a known document extension
fn url_extension(url: &str) -> String {
    let last_segment = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
            .unwrap_or_default(),
        Err(_) => {
            let path = url.split(['?', '#']).next().unwrap_or(url);
            path.rsplit('/').next().unwrap_or(path).to_string()
        }
    };

    match last_segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            if KNOWN_DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
                format!(".{}", ext)
            } else {
                String::new()
            }
        }
        _ => String::new(),
    }
}

/// Filename without its last extension
fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}
