//! Page-scoped aggregation of listing entries into canonical records
//!
//! A listing page may mention the same document twice, split one edition into
//! several parts, or (rarely) point one part at two different files. The
//! [`RecordAggregator`] collects every entry of a page under
//! `GroupKey -> PartKey -> {url}` and, once the page has been fully scanned,
//! emits one [`GazetteRecord`] per edition. An edition with a part pointing at
//! more than one URL is ambiguous and is dropped as a whole.
//!
//! The aggregator lives exactly as long as the processing of one page.
//! [`RecordAggregator::finalize`] consumes it, so a group can never go back to
//! collecting after its record was emitted or dropped.

use crate::listing::ListingEntry;
use crate::types::{DocumentRef, GazetteRecord, GroupKey, PartKey, Power};
use std::collections::{BTreeSet, HashMap};
use tracing::{error, info};

/// A part key that resolved to more than one distinct URL
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartConflict {
    /// Edition whose record was dropped
    pub key: GroupKey,
    /// Part carrying the conflicting URLs
    pub part: PartKey,
    /// The distinct URLs registered for that part
    pub urls: Vec<String>,
}

/// Result of finalizing one page
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageRecords {
    /// Records of every non-conflicting edition, in first-seen order
    pub records: Vec<GazetteRecord>,
    /// Every conflict found; each dropped edition appears at least once
    pub conflicts: Vec<PartConflict>,
}

impl PageRecords {
    /// Number of editions dropped because of conflicts
    pub fn dropped_groups(&self) -> usize {
        let mut keys: Vec<&GroupKey> = self.conflicts.iter().map(|c| &c.key).collect();
        keys.sort();
        keys.dedup();
        keys.len()
    }
}

/// Collects the entries of one listing page
pub struct RecordAggregator {
    power: Power,
    groups: HashMap<GroupKey, HashMap<PartKey, BTreeSet<String>>>,
    // first-seen order of the groups, for stable output
    order: Vec<GroupKey>,
}

impl RecordAggregator {
    /// Create an empty aggregator for a page of a source publishing as `power`
    pub fn new(power: Power) -> Self {
        Self {
            power,
            groups: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Number of editions seen so far
    pub fn group_count(&self) -> usize {
        self.order.len()
    }

    /// Register one listing entry
    ///
    /// Registering a URL already present under the same group and part has no effect.
    pub fn insert(&mut self, entry: ListingEntry) {
        let ListingEntry { key, part, url } = entry;

        if !self.groups.contains_key(&key) {
            self.order.push(key.clone());
        }
        let urls = self
            .groups
            .entry(key.clone())
            .or_default()
            .entry(part)
            .or_default();

        if urls.contains(&url) {
            info!(
                "A previous entry for edition_number {} for {}, same is_extra_edition value and same URL was registered. Skipping...",
                key.edition_number, key.date
            );
            return;
        }
        urls.insert(url);
    }

    /// Register every entry of an iterator
    pub fn extend(&mut self, entries: impl IntoIterator<Item = ListingEntry>) {
        for entry in entries {
            self.insert(entry);
        }
    }

    /// Resolve every collected edition into a record, dropping ambiguous ones
    pub fn finalize(mut self) -> PageRecords {
        let mut page = PageRecords::default();

        for key in self.order {
            let Some(parts) = self.groups.remove(&key) else {
                continue;
            };

            let mut labels: Vec<PartKey> = parts.keys().cloned().collect();
            labels.sort();

            let mut documents = Vec::with_capacity(labels.len());
            let mut conflicted = false;
            for label in labels {
                let urls = &parts[&label];
                if urls.len() > 1 {
                    error!(
                        part = %label,
                        "More than one URL was found for edition_number {} for {}, and same is_extra_edition value.",
                        key.edition_number, key.date
                    );
                    page.conflicts.push(PartConflict {
                        key: key.clone(),
                        part: label,
                        urls: urls.iter().cloned().collect(),
                    });
                    conflicted = true;
                } else if let Some(url) = urls.iter().next() {
                    documents.push(DocumentRef::Url(url.clone()));
                }
            }

            if conflicted {
                continue;
            }

            page.records.push(GazetteRecord {
                date: key.date,
                edition_number: key.edition_number,
                is_extra_edition: key.is_extra_edition,
                power: self.power,
                territory_id: None,
                scraped_at: None,
                documents,
            });
        }

        page
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn key(y: i32, m: u32, d: u32, edition: &str, extra: bool) -> GroupKey {
        GroupKey {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            edition_number: edition.to_string(),
            is_extra_edition: extra,
        }
    }

    fn entry(key: &GroupKey, part: &str, url: &str) -> ListingEntry {
        ListingEntry {
            key: key.clone(),
            part: PartKey::new(part),
            url: url.to_string(),
        }
    }

    fn urls(record: &GazetteRecord) -> Vec<&str> {
        record.documents.iter().map(DocumentRef::url).collect()
    }

    #[test]
    fn repeated_triple_is_idempotent() {
        let k = key(2023, 1, 10, "3930", false);
        let url = "https://diariooficialjp.com.br/pdf/2023-01-10.pdf";

        let mut once = RecordAggregator::new(Power::Executive);
        once.insert(entry(&k, "", url));

        let mut twice = RecordAggregator::new(Power::Executive);
        twice.insert(entry(&k, "", url));
        twice.insert(entry(&k, "", url));

        let once = once.finalize();
        let twice = twice.finalize();
        assert_eq!(once, twice);
        assert_eq!(twice.records.len(), 1);
        assert_eq!(urls(&twice.records[0]), vec![url]);
        assert!(twice.conflicts.is_empty());
    }

    #[test]
    fn parts_are_emitted_in_lexicographic_order_not_insertion_order() {
        let k = key(2010, 4, 15, "813", false);
        let mut aggregator = RecordAggregator::new(Power::Executive);
        aggregator.insert(entry(&k, "Parte 2", "https://www.domjp.com.br/pdf/2010-04-15-part.2.pdf"));
        aggregator.insert(entry(&k, "Parte 1", "https://www.domjp.com.br/pdf/2010-04-15-part.1.pdf"));

        let page = aggregator.finalize();
        assert_eq!(page.records.len(), 1);
        let record = &page.records[0];
        assert!(!record.is_extra_edition);
        assert_eq!(record.edition_number, "813");
        assert_eq!(
            urls(record),
            vec![
                "https://www.domjp.com.br/pdf/2010-04-15-part.1.pdf",
                "https://www.domjp.com.br/pdf/2010-04-15-part.2.pdf",
            ]
        );
    }

    #[test]
    fn regular_and_extra_edition_of_same_day_are_distinct_records() {
        let regular = key(2010, 7, 14, "874", false);
        let extra = key(2010, 7, 14, "874", true);
        let mut aggregator = RecordAggregator::new(Power::Executive);
        aggregator.insert(entry(&regular, "", "https://www.domjp.com.br/pdf/2010-07-14.pdf"));
        aggregator.insert(entry(
            &extra,
            "Parte 2",
            "https://www.domjp.com.br/pdf/2010-07-14-suplemento.pdf",
        ));

        let page = aggregator.finalize();
        assert_eq!(page.records.len(), 2);

        let first = &page.records[0];
        let second = &page.records[1];
        assert_eq!(first.date, second.date);
        assert_eq!(first.edition_number, second.edition_number);
        assert!(!first.is_extra_edition);
        assert!(second.is_extra_edition);
        assert_eq!(urls(first), vec!["https://www.domjp.com.br/pdf/2010-07-14.pdf"]);
        assert_eq!(
            urls(second),
            vec!["https://www.domjp.com.br/pdf/2010-07-14-suplemento.pdf"]
        );
    }

    #[test]
    fn conflicting_part_drops_the_whole_group() {
        let k = key(2014, 8, 28, "1892", false);
        let mut aggregator = RecordAggregator::new(Power::Executive);
        aggregator.insert(entry(&k, "", "https://diariooficialjp.com.br/pdf/a.pdf"));
        aggregator.insert(entry(&k, "", "https://diariooficialjp.com.br/pdf/b.pdf"));

        let page = aggregator.finalize();
        assert!(page.records.is_empty());
        assert_eq!(page.conflicts.len(), 1);
        assert_eq!(page.conflicts[0].key, k);
        assert_eq!(page.conflicts[0].part, PartKey::new(""));
        assert_eq!(
            page.conflicts[0].urls,
            vec![
                "https://diariooficialjp.com.br/pdf/a.pdf".to_string(),
                "https://diariooficialjp.com.br/pdf/b.pdf".to_string(),
            ]
        );
        assert_eq!(page.dropped_groups(), 1);
    }

    #[test]
    fn conflict_suppresses_non_conflicting_parts_of_the_same_group() {
        let k = key(2015, 3, 2, "2001", false);
        let mut aggregator = RecordAggregator::new(Power::Executive);
        aggregator.insert(entry(&k, "A", "https://diariooficialjp.com.br/pdf/a.pdf"));
        aggregator.insert(entry(&k, "B", "https://diariooficialjp.com.br/pdf/b1.pdf"));
        aggregator.insert(entry(&k, "B", "https://diariooficialjp.com.br/pdf/b2.pdf"));

        let page = aggregator.finalize();
        assert!(page.records.is_empty(), "no partial emission of a dropped group");
        assert_eq!(page.conflicts.len(), 1);
        assert_eq!(page.conflicts[0].part, PartKey::new("B"));
    }

    #[test]
    fn conflict_in_one_group_leaves_other_groups_alone() {
        let bad = key(2015, 3, 2, "2001", false);
        let good = key(2015, 3, 3, "2002", false);
        let mut aggregator = RecordAggregator::new(Power::Executive);
        aggregator.insert(entry(&bad, "", "https://diariooficialjp.com.br/pdf/x.pdf"));
        aggregator.insert(entry(&good, "", "https://diariooficialjp.com.br/pdf/2015-03-03.pdf"));
        aggregator.insert(entry(&bad, "", "https://diariooficialjp.com.br/pdf/y.pdf"));

        let page = aggregator.finalize();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].group_key(), good);
        assert_eq!(page.dropped_groups(), 1);
    }

    #[test]
    fn records_follow_first_seen_group_order_and_carry_source_power() {
        let mut aggregator = RecordAggregator::new(Power::Executive);
        let late = key(2023, 5, 2, "4000", false);
        let early = key(2023, 5, 1, "3999", false);
        aggregator.insert(entry(&late, "", "https://diariooficialjp.com.br/pdf/2023-05-02.pdf"));
        aggregator.insert(entry(&early, "", "https://diariooficialjp.com.br/pdf/2023-05-01.pdf"));
        assert_eq!(aggregator.group_count(), 2);

        let page = aggregator.finalize();
        let keys: Vec<GroupKey> = page.records.iter().map(GazetteRecord::group_key).collect();
        assert_eq!(keys, vec![late, early]);
        assert!(page.records.iter().all(|r| r.power == Power::Executive));
        assert!(page.records.iter().all(|r| r.territory_id.is_none()));
    }

    #[test]
    fn empty_page_finalizes_to_nothing() {
        let page = RecordAggregator::new(Power::Executive).finalize();
        assert!(page.records.is_empty());
        assert!(page.conflicts.is_empty());
    }
}
