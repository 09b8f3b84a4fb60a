//! Record types merged by the aggregator.

use crate::core::Identifier;

use serde::{Deserialize, Serialize};

/// One observation of a record, possibly incomplete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialRecord {
    /// Raw key, normalized on merge.
    pub key: String,
    /// Title.
    pub title: Option<String>,
    /// Applicant or holder.
    pub holder: Option<String>,
    /// Publication or filing date, as found.
    pub date: Option<String>,
    /// Classification code.
    pub classification: Option<String>,
    /// Key of the record this one was derived from.
    pub parent: Option<String>,
    /// Source tags.
    pub sources: Vec<String>,
}

impl PartialRecord {
    /// Creates a record with only a key.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Sets the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the holder.
    pub fn with_holder(mut self, holder: impl Into<String>) -> Self {
        self.holder = Some(holder.into());
        self
    }

    /// Sets the date.
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    /// Sets the classification.
    pub fn with_classification(mut self, classification: impl Into<String>) -> Self {
        self.classification = Some(classification.into());
        self
    }

    /// Sets the parent key.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Adds a source tag.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.sources.push(source.into());
        self
    }
}

impl From<&Identifier> for PartialRecord {
    fn from(id: &Identifier) -> Self {
        Self {
            key: id.value.clone(),
            parent: id.parent.clone(),
            sources: vec![id.source_strategy.clone()],
            ..Self::default()
        }
    }
}

/// The canonical record for one normalized key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedRecord {
    /// Normalized key.
    pub key: String,
    /// Title.
    pub title: Option<String>,
    /// Applicant or holder.
    pub holder: Option<String>,
    /// Publication or filing date.
    pub date: Option<String>,
    /// Classification code.
    pub classification: Option<String>,
    /// Normalized key of the parent record.
    pub parent: Option<String>,
    /// Distinct source tags, in first-seen order.
    pub sources: Vec<String>,
}

impl AggregatedRecord {
    pub(crate) fn new(key: String) -> Self {
        Self {
            key,
            title: None,
            holder: None,
            date: None,
            classification: None,
            parent: None,
            sources: Vec::new(),
        }
    }

    /// Folds `partial` into this record.
    ///
    /// A field is only written while it is still empty, so the first
    /// non-empty value wins.
    pub(crate) fn absorb(&mut self, partial: PartialRecord) {
        fill(&mut self.title, partial.title);
        fill(&mut self.holder, partial.holder);
        fill(&mut self.date, partial.date);
        fill(&mut self.classification, partial.classification);
        fill(
            &mut self.parent,
            partial.parent.map(|p| super::normalize_key(&p)),
        );

        for source in partial.sources {
            let source = source.trim();
            if !source.is_empty() && !self.sources.iter().any(|s| s == source) {
                self.sources.push(source.to_string());
            }
        }
    }

    /// Returns `true` if this record was derived from another one.
    pub fn is_derived(&self) -> bool {
        self.parent.is_some()
    }
}

fn fill(slot: &mut Option<String>, incoming: Option<String>) {
    let occupied = slot.as_deref().is_some_and(|v| !v.trim().is_empty());
    if occupied {
        return;
    }
    if let Some(value) = incoming.filter(|v| !v.trim().is_empty()) {
        *slot = Some(value.trim().to_string());
    }
}
