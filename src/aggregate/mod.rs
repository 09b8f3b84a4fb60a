//! Merging records from many cascade runs.
//!
//! The [`Aggregator`] keys records by a normalized form (alphanumerics only,
//! upper-cased), merges fields first-non-empty-wins and keeps distinct source
//! tags. Output is ordered by key.

mod record;

pub use record::{AggregatedRecord, PartialRecord};

use crate::core::Identifier;

use std::collections::BTreeMap;

/// Normalizes a record key: strips non-alphanumerics and upper-cases.
///
/// ```rust
/// use patentbridge::aggregate::normalize_key;
///
/// assert_eq!(normalize_key("wo 2016/162604"), "WO2016162604");
/// assert_eq!(normalize_key("BR 11 2017 024082-2"), "BR1120170240822");
/// ```
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Merges partial records into one canonical record per key.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    records: BTreeMap<String, AggregatedRecord>,
}

impl Aggregator {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one partial record.
    ///
    /// Returns `true` if the key was new. Records whose key normalizes to
    /// nothing are dropped.
    pub fn merge(&mut self, partial: PartialRecord) -> bool {
        let key = normalize_key(&partial.key);
        if key.is_empty() {
            tracing::debug!(raw_key = %partial.key, "Dropping record without a usable key");
            return false;
        }

        let mut inserted = false;
        let record = self.records.entry(key).or_insert_with_key(|key| {
            inserted = true;
            AggregatedRecord::new(key.clone())
        });
        record.absorb(partial);
        inserted
    }

    /// Merges a whole batch of partial records and returns the canonical
    /// records, ordered by key.
    ///
    /// ```rust
    /// use patentbridge::aggregate::{Aggregator, PartialRecord};
    ///
    /// let records = Aggregator::merge_all([
    ///     PartialRecord::new("BR123").with_title(""),
    ///     PartialRecord::new("br-123").with_title("Crystalline Form"),
    /// ]);
    /// assert_eq!(records.len(), 1);
    /// assert_eq!(records[0].title.as_deref(), Some("Crystalline Form"));
    /// ```
    pub fn merge_all<I>(records: I) -> Vec<AggregatedRecord>
    where
        I: IntoIterator<Item = PartialRecord>,
    {
        let mut aggregator = Self::new();
        for record in records {
            aggregator.merge(record);
        }
        aggregator.finish()
    }

    /// Merges an identifier found by a cascade.
    pub fn push(&mut self, identifier: &Identifier) -> bool {
        self.merge(PartialRecord::from(identifier))
    }

    /// Merges every identifier of an iterator.
    ///
    /// Returns the number of new keys.
    pub fn extend<'a, I>(&mut self, identifiers: I) -> usize
    where
        I: IntoIterator<Item = &'a Identifier>,
    {
        identifiers.into_iter().filter(|id| self.push(id)).count()
    }

    /// Returns the record for `key`, normalizing it first.
    pub fn get(&self, key: &str) -> Option<&AggregatedRecord> {
        self.records.get(&normalize_key(key))
    }

    /// Returns the number of distinct keys.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing was merged.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consumes the aggregator and returns the records ordered by key.
    pub fn finish(self) -> Vec<AggregatedRecord> {
        self.records.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_fills_empty_field() {
        let mut aggregator = Aggregator::new();
        assert!(aggregator.merge(PartialRecord::new("BR123").with_title("")));
        assert!(!aggregator.merge(PartialRecord::new("BR123").with_title("Crystalline Form")));

        let records = aggregator.finish();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title.as_deref(), Some("Crystalline Form"));
    }

    #[test]
    fn test_merge_normalizes_keys() {
        let mut aggregator = Aggregator::new();
        aggregator.merge(PartialRecord::new("wo 2016/162604").with_source("a"));
        aggregator.merge(PartialRecord::new("WO2016162604").with_source("b").with_holder("Orion"));

        assert_eq!(aggregator.len(), 1);
        let record = aggregator.get("WO-2016-162604").unwrap();
        assert_eq!(record.sources, vec!["a", "b"]);
        assert_eq!(record.holder.as_deref(), Some("Orion"));
    }

    #[test]
    fn test_merge_all_one_shot() {
        let records = Aggregator::merge_all(vec![
            PartialRecord::new("WO2018162793").with_source("lens"),
            PartialRecord::new("BR123").with_title(""),
            PartialRecord::new("BR123").with_title("Crystalline Form").with_source("espacenet"),
            PartialRecord::new(" - "),
        ]);

        let keys: Vec<_> = records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["BR123", "WO2018162793"]);
        assert_eq!(records[0].title.as_deref(), Some("Crystalline Form"));
        assert_eq!(records[0].sources, vec!["espacenet"]);
    }

    #[test]
    fn test_merge_drops_empty_key() {
        let mut aggregator = Aggregator::new();
        assert!(!aggregator.merge(PartialRecord::new(" / - ")));
        assert!(aggregator.is_empty());
    }

    #[test]
    fn test_finish_orders_by_key() {
        let mut aggregator = Aggregator::new();
        for key in ["WO2018162793", "BR112017024082", "WO2016162604"] {
            aggregator.merge(PartialRecord::new(key));
        }
        let keys: Vec<_> = aggregator.finish().into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec!["BR112017024082", "WO2016162604", "WO2018162793"]);
    }

    #[test]
    fn test_push_identifiers_keeps_parent() {
        let mut aggregator = Aggregator::new();
        let ids = vec![
            Identifier::new("WO2016162604", "google-patents"),
            Identifier::new("BR112017024082", "espacenet-pn").with_parent("WO2016162604"),
            Identifier::new("WO2016162604", "lens"),
        ];
        assert_eq!(aggregator.extend(&ids), 2);

        let derived = aggregator.get("BR112017024082").unwrap();
        assert!(derived.is_derived());
        assert_eq!(derived.parent.as_deref(), Some("WO2016162604"));
        assert_eq!(
            aggregator.get("WO2016162604").unwrap().sources,
            vec!["google-patents", "lens"]
        );
    }
}
