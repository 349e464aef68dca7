use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A paper whose citing works are being collected, loaded once from the input table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePaper {
    pub title: String,
    pub citation_source_url: String,
}

impl SourcePaper {
    pub fn new(title: impl Into<String>, citation_source_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            citation_source_url: citation_source_url.into(),
        }
    }
}

/// Source paper title -> citing identifiers, in the order the citation source listed them.
/// Blank entries are placeholders for rows whose identifier was unusable.
///
/// Titles iterate in the order they were first added, which is the input table's order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationMap {
    order: Vec<String>,
    entries: HashMap<String, Vec<String>>,
}

impl CitationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start every paper with an empty list
    pub fn for_papers(papers: &[SourcePaper]) -> Self {
        let mut map = Self::new();
        map.add_missing(papers);
        map
    }

    /// Add empty entries for titles not already present; returns the newly added titles
    pub fn add_missing(&mut self, papers: &[SourcePaper]) -> Vec<String> {
        let mut added = Vec::new();
        for paper in papers {
            if !self.entries.contains_key(&paper.title) {
                self.order.push(paper.title.clone());
                self.entries.insert(paper.title.clone(), Vec::new());
                added.push(paper.title.clone());
            }
        }
        added
    }

    /// Append identifiers to a title's list, creating the entry if needed
    pub fn extend(&mut self, title: &str, identifiers: impl IntoIterator<Item = String>) {
        if !self.entries.contains_key(title) {
            self.order.push(title.to_string());
        }
        self.entries
            .entry(title.to_string())
            .or_default()
            .extend(identifiers);
    }

    /// Drop a title entirely, so a later `add_missing` treats it as new again
    pub fn remove(&mut self, title: &str) -> Option<Vec<String>> {
        let removed = self.entries.remove(title)?;
        self.order.retain(|t| t != title);
        Some(removed)
    }

    #[cfg(test)]
    pub fn get(&self, title: &str) -> Option<&[String]> {
        self.entries.get(title).map(|v| v.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.order.iter().filter_map(|title| self.entries.get_key_value(title))
    }

    pub fn titles(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Length of the longest identifier list
    pub fn max_list_len(&self) -> usize {
        self.entries.values().map(Vec::len).max().unwrap_or(0)
    }

    /// Count of all identifier slots, placeholders included
    pub fn total_identifiers(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

/// Metadata collected for one distinct citing identifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbstractRecord {
    pub source_title: String,
    pub citing_identifier: String,
    pub citing_title: String,
    pub citing_abstract: String,
    pub lookup_url: String,
}

impl AbstractRecord {
    /// Complete iff every field is non-empty; incomplete records are fetched again on the next run
    pub fn is_complete(&self) -> bool {
        [
            &self.source_title,
            &self.citing_identifier,
            &self.citing_title,
            &self.citing_abstract,
            &self.lookup_url,
        ]
        .iter()
        .all(|field| !field.is_empty())
    }
}

/// Citing identifier -> abstract record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbstractMap {
    records: BTreeMap<String, AbstractRecord>,
}

impl AbstractMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert keyed by the record's identifier, replacing any previous record
    pub fn insert(&mut self, record: AbstractRecord) -> Option<AbstractRecord> {
        self.records.insert(record.citing_identifier.clone(), record)
    }

    #[cfg(test)]
    pub fn get(&self, identifier: &str) -> Option<&AbstractRecord> {
        self.records.get(identifier)
    }

    pub fn is_complete(&self, identifier: &str) -> bool {
        self.records
            .get(identifier)
            .map(AbstractRecord::is_complete)
            .unwrap_or(false)
    }

    pub fn complete_count(&self) -> usize {
        self.records.values().filter(|r| r.is_complete()).count()
    }

    pub fn values(&self) -> impl Iterator<Item = &AbstractRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Statistics from the citations phase
#[derive(Debug, Clone, Default)]
pub struct HarvestStats {
    pub papers_total: usize,
    pub papers_fetched: usize,
    pub papers_failed: usize,
    pub identifiers_added: usize,
    pub placeholders_added: usize,
    /// Export rows that had no identifier column or could not be read
    pub rows_skipped: usize,
    pub skipped_fully_cached: bool,
    pub interrupted: bool,
}

/// Statistics from the abstracts phase
#[derive(Debug, Clone, Default)]
pub struct EnrichStats {
    pub total: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped_complete: usize,
    pub checkpoints: usize,
    pub interrupted: bool,
}
