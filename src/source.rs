//! Gazette sources
//!
//! A [`GazetteSource`] describes one publishing entity: where its listing pages
//! live, how to read them, and how politely it must be crawled. The harvester
//! drives any source through this trait.

use crate::config::ThrottleConfig;
use crate::error::Result;
use crate::listing::{ListingEntry, ListingPage, ListingParser};
use crate::types::{CrawlBounds, Power};
use chrono::{Datelike, NaiveDate, Utc};
use std::time::Duration;

/// A publishing entity whose gazettes can be harvested
pub trait GazetteSource: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// IBGE territory code of the entity
    fn territory_id(&self) -> &str;

    /// Publishing branch of every gazette of this source
    fn power(&self) -> Power;

    /// Date of the earliest gazette available
    fn start_date(&self) -> NaiveDate;

    /// Listing pages covering `bounds`
    fn listing_pages(&self, bounds: &CrawlBounds) -> Vec<ListingPage>;

    /// Extract the entries of one listing page
    fn parse_listing(&self, html: &str, page: &ListingPage) -> Result<Vec<ListingEntry>>;

    /// Headers added to plain URL document requests
    fn document_headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Throttle settings replacing the global ones for this source
    fn custom_throttle(&self) -> Option<ThrottleConfig> {
        None
    }

    /// Bounds for a crawl of this source
    ///
    /// `start` is clamped to [`start_date`](Self::start_date); `end` defaults to today (UTC).
    fn crawl_bounds(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> CrawlBounds {
        let earliest = self.start_date();
        CrawlBounds {
            start_date: start.map_or(earliest, |s| s.max(earliest)),
            end_date: end.unwrap_or_else(|| Utc::now().date_naive()),
            territory_id: self.territory_id().to_string(),
        }
    }
}

/// Ji-Paraná - RO
pub struct JiParanaSource {
    base_url: String,
    parser: ListingParser,
    throttle: ThrottleConfig,
}

impl JiParanaSource {
    /// IBGE code of Ji-Paraná
    pub const TERRITORY_ID: &'static str = "1100122";

    /// Official listing host
    pub const BASE_URL: &'static str = "https://diariooficialjp.com.br";

    /// Source reading the official listing host
    pub fn new() -> Result<Self> {
        Ok(Self {
            base_url: Self::BASE_URL.to_string(),
            parser: ListingParser::new()?,
            throttle: Self::polite_throttle(),
        })
    }

    /// Source reading listings from another host, keeping its URL scheme
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            parser: ListingParser::new()?.keep_scheme(),
            throttle: Self::polite_throttle(),
        })
    }

    /// Replace the source's throttle settings
    pub fn with_throttle(mut self, throttle: ThrottleConfig) -> Self {
        self.throttle = throttle;
        self
    }

    /// Six requests in flight, about 1.5 s apart
    fn polite_throttle() -> ThrottleConfig {
        ThrottleConfig {
            max_concurrent_requests: 6,
            download_delay: Duration::from_millis(1500),
            randomize_download_delay: true,
            ..Default::default()
        }
    }

    /// Listing page of one calendar year
    pub fn listing_page(&self, year: i32) -> ListingPage {
        ListingPage {
            url: format!("{}/anop.php?ano={}", self.base_url, year),
            year,
        }
    }
}

impl GazetteSource for JiParanaSource {
    fn name(&self) -> &str {
        "ro_ji_parana"
    }

    fn territory_id(&self) -> &str {
        Self::TERRITORY_ID
    }

    fn power(&self) -> Power {
        Power::Executive
    }

    fn start_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(2013, 6, 3).unwrap_or(NaiveDate::MIN)
    }

    fn listing_pages(&self, bounds: &CrawlBounds) -> Vec<ListingPage> {
        (bounds.start_date.year()..=bounds.end_date.year())
            .map(|year| self.listing_page(year))
            .collect()
    }

    fn parse_listing(&self, html: &str, page: &ListingPage) -> Result<Vec<ListingEntry>> {
        self.parser.parse_page(html, page)
    }

    fn custom_throttle(&self) -> Option<ThrottleConfig> {
        Some(self.throttle.clone())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn one_listing_page_per_year_of_the_bounds() {
        let source = JiParanaSource::new().unwrap();
        let bounds = source.crawl_bounds(Some(date(2021, 11, 3)), Some(date(2023, 2, 1)));

        let pages = source.listing_pages(&bounds);
        let urls: Vec<&str> = pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://diariooficialjp.com.br/anop.php?ano=2021",
                "https://diariooficialjp.com.br/anop.php?ano=2022",
                "https://diariooficialjp.com.br/anop.php?ano=2023",
            ]
        );
        assert_eq!(pages[0].year, 2021);
    }

    #[test]
    fn inverted_bounds_yield_no_pages() {
        let source = JiParanaSource::new().unwrap();
        let bounds = CrawlBounds {
            start_date: date(2023, 1, 1),
            end_date: date(2022, 1, 1),
            territory_id: JiParanaSource::TERRITORY_ID.into(),
        };
        assert!(source.listing_pages(&bounds).is_empty());
    }

    #[test]
    fn bounds_never_start_before_the_first_gazette() {
        let source = JiParanaSource::new().unwrap();
        let bounds = source.crawl_bounds(Some(date(2001, 1, 1)), Some(date(2013, 12, 31)));

        assert_eq!(bounds.start_date, date(2013, 6, 3));
        assert_eq!(bounds.end_date, date(2013, 12, 31));
        assert_eq!(bounds.territory_id, "1100122");
    }

    #[test]
    fn open_ended_bounds_run_until_today() {
        let source = JiParanaSource::new().unwrap();
        let bounds = source.crawl_bounds(None, None);

        assert_eq!(bounds.start_date, source.start_date());
        assert_eq!(bounds.end_date, Utc::now().date_naive());
    }

    #[test]
    fn custom_throttle_is_polite() {
        let throttle = JiParanaSource::new().unwrap().custom_throttle().unwrap();
        assert_eq!(throttle.max_concurrent_requests, 6);
        assert_eq!(throttle.download_delay, Duration::from_millis(1500));
        assert!(throttle.randomize_download_delay);
        throttle.validate().unwrap();
    }

    #[test]
    fn mirror_base_url_is_used_verbatim() {
        let source = JiParanaSource::with_base_url("http://127.0.0.1:9000/").unwrap();
        assert_eq!(
            source.listing_page(2023).url,
            "http://127.0.0.1:9000/anop.php?ano=2023"
        );
        assert!(source.document_headers().is_empty());
    }
}
