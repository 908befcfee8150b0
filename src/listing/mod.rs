//! Listing page extraction
//!
//! A listing page enumerates the gazettes published in one calendar year. Every
//! candidate anchor carries a text like `Edição 3930 - SUPLEMENTO - 2023-01-10`
//! from which the edition number, the free-text part label and the gazette date
//! are recovered. Entries that cannot be read are logged and skipped; a bad
//! entry never aborts the page.

use crate::error::{Error, Result};
use crate::types::{GroupKey, PartKey};
use chrono::{Datelike, NaiveDate};
use percent_encoding::percent_decode_str;
use regex::{Regex, RegexBuilder};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

/// Edition number, part label and date of one listing entry
const ENTRY_TEXT_PATTERN: &str = concat!(
    r"Edição[^0-9]+",
    r"([0-9]+)",   // edition number
    r"\s*[-–]?\s*",
    r"([^0-9]*)", // part label, may carry an extra-edition marker
    r"\s+-\s+",
    r"([0-9]{4})", // year
    r".",
    r"([0-9]{2})", // month
    r".",
    r"([0-9]{2})", // day
);

/// Extra-edition marker.
///
/// `sumplemento` (2018-05-17) and `suplmento` (2018-06-20) are typos found in
/// the published listings; `extraordinária` appears from 2020-09-05.
const EXTRA_EDITION_PATTERN: &str = r"(sum?ple?mento|extraordinária)";

/// Anchors that can describe a gazette. The column class must match exactly.
const ENTRY_SELECTOR: &str = r#"div[class="col-sm-8"] a[href]"#;

/// One listing page request: the page URL and the year it was queried for
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingPage {
    /// Absolute URL of the listing page
    pub url: String,
    /// Year the page was requested for
    pub year: i32,
}

/// One usable entry of a listing page
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingEntry {
    /// Edition the entry belongs to
    pub key: GroupKey,
    /// Part label inside that edition
    pub part: PartKey,
    /// Normalized absolute document URL
    pub url: String,
}

/// Fields recovered from an entry's text by a single pattern match
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryText {
    /// Edition number (digit string)
    pub edition_number: String,
    /// Trimmed free-text segment between the edition number and the date
    pub part_label: String,
    /// Embedded date, `None` when the digits do not form a calendar date
    pub date: Option<NaiveDate>,
}

/// A literal listing entry known to be an invalid duplicate in the source data
pub struct KnownInvalidEntry {
    /// Gazette date the exception applies to
    pub date: (i32, u32, u32),
    /// What is wrong with the entry
    pub description: &'static str,
    /// Whether a URL listed on that date is the bad copy
    pub is_bad_url: fn(&str) -> bool,
}

impl KnownInvalidEntry {
    fn matches(&self, date: NaiveDate, url: &str) -> bool {
        let (year, month, day) = self.date;
        date.year() == year && date.month() == month && date.day() == day && (self.is_bad_url)(url)
    }
}

fn lacks_pdf_suffix(url: &str) -> bool {
    !url.ends_with(".pdf")
}

/// Entries skipped on sight. Keep this table literal.
pub const KNOWN_INVALID_ENTRIES: &[KnownInvalidEntry] = &[KnownInvalidEntry {
    date: (2014, 8, 28),
    description: "edition 1892 is listed twice with the same text; one copy links to a non-PDF URL",
    is_bad_url: lacks_pdf_suffix,
}];

/// Extracts [`ListingEntry`] values from listing page markup
pub struct ListingParser {
    entry_text: Regex,
    extra_edition: Regex,
    entry_selector: Selector,
    upgrade_scheme: bool,
}

impl ListingParser {
    /// Compile the entry patterns
    pub fn new() -> Result<Self> {
        let entry_text = RegexBuilder::new(ENTRY_TEXT_PATTERN)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::Other(format!("invalid entry text pattern: {}", e)))?;
        let extra_edition = RegexBuilder::new(EXTRA_EDITION_PATTERN)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::Other(format!("invalid extra edition pattern: {}", e)))?;
        let entry_selector = Selector::parse(ENTRY_SELECTOR)
            .map_err(|e| Error::Other(format!("invalid entry selector: {}", e)))?;

        Ok(Self {
            entry_text,
            extra_edition,
            entry_selector,
            upgrade_scheme: true,
        })
    }

    /// Keep entry URLs on the scheme the page links them with
    ///
    /// For mirrors that serve plain HTTP only.
    pub fn keep_scheme(mut self) -> Self {
        self.upgrade_scheme = false;
        self
    }

    /// Recover edition number, part label and date from an entry's text
    ///
    /// Returns `None` when the text does not follow the entry pattern.
    pub fn match_entry_text(&self, text: &str) -> Option<EntryText> {
        let caps = self.entry_text.captures(text)?;

        let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
        let year = caps.get(3).and_then(|m| m.as_str().parse::<i32>().ok());
        let date = match (year, number(4), number(5)) {
            (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y, m, d),
            _ => None,
        };

        Some(EntryText {
            edition_number: caps.get(1)?.as_str().to_string(),
            part_label: caps.get(2).map_or("", |m| m.as_str()).trim().to_string(),
            date,
        })
    }

    /// Whether a text carries the extra-edition marker
    pub fn is_extra_edition_marker(&self, text: &str) -> bool {
        self.extra_edition.is_match(text)
    }

    /// Extract every usable entry of one listing page
    ///
    /// Only fails when the page URL itself cannot serve as a base for relative links.
    pub fn parse_page(&self, html: &str, page: &ListingPage) -> Result<Vec<ListingEntry>> {
        let base = Url::parse(&page.url)?;
        let document = Html::parse_document(html);
        let year_marker = format!(" {}-", page.year);

        let mut entries = Vec::new();
        for anchor in document.select(&self.entry_selector) {
            let text = own_text(&anchor);
            if !text.contains("Edição") || !text.contains(&year_marker) {
                continue;
            }
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if let Some(entry) = self.read_entry(&text, href.trim(), &base, page.year) {
                entries.push(entry);
            }
        }

        debug!(
            page = %page.url,
            year = page.year,
            entries = entries.len(),
            "Parsed listing page"
        );
        Ok(entries)
    }

    fn read_entry(&self, text: &str, href: &str, base: &Url, year: i32) -> Option<ListingEntry> {
        let Some(fields) = self.match_entry_text(text) else {
            info!("Unable to extract gazette data from '{}'", text);
            return None;
        };

        let Some(date) = fields.date else {
            info!("Entry '{}' does not carry a valid calendar date. Skipping...", text);
            return None;
        };

        if date.year() != year {
            warn!(
                "Extracted date {} is not from queried year {}. Skipping...",
                date, year
            );
            return None;
        }

        let url = match base.join(href) {
            Ok(url) if self.upgrade_scheme => normalize_scheme(url.as_str()),
            Ok(url) => url.to_string(),
            Err(e) => {
                info!("Unable to resolve URL '{}' of entry '{}': {}", href, text, e);
                return None;
            }
        };

        // Markers in the URL are matched on its decoded form; `Url::join`
        // percent-encodes the accented `extraordinária`.
        let is_extra_edition = self.is_extra_edition_marker(&fields.part_label)
            || self.is_extra_edition_marker(&percent_decode_str(&url).decode_utf8_lossy());

        if let Some(known) = KNOWN_INVALID_ENTRIES.iter().find(|k| k.matches(date, &url)) {
            info!(
                "The extracted URL for {} edition_number {} is_extra_edition {} is a known invalid entry ({}): '{}'. Skipping...",
                date, fields.edition_number, is_extra_edition, known.description, url
            );
            return None;
        }

        Some(ListingEntry {
            key: GroupKey {
                date,
                edition_number: fields.edition_number,
                is_extra_edition,
            },
            part: PartKey::new(fields.part_label),
            url,
        })
    }
}

/// First direct text child of an element, trimmed
fn own_text(element: &ElementRef) -> String {
    element
        .children()
        .find_map(|child| child.value().as_text().map(|t| t.trim().to_string()))
        .unwrap_or_default()
}

/// Upgrade `http://` to `https://` to skip the source's redirect round trip
pub fn normalize_scheme(url: &str) -> String {
    url.replace("http://", "https://")
}
