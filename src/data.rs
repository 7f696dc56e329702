//! Immutable value types exchanged between the crawler and the estimators.

use serde::{Deserialize, Serialize};

/// One document returned by a search engine.
///
/// Either field may be absent depending on the projection the caller asked
/// for. When present, `identifier` uniquely names the document within the
/// engine that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    pub identifier: Option<String>,
    pub content: Option<String>,
}

impl Data {
    pub fn new(identifier: Option<String>, content: Option<String>) -> Self {
        Self {
            identifier,
            content,
        }
    }
}

/// The outcome of one query: the total match count claimed by the engine and
/// the rows it actually handed back.
///
/// `results.len() <= number_results` always holds; the engine may cap the
/// returned rows well below the claimed total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    number_results: u64,
    results: Vec<Data>,
}

impl SearchResult {
    pub fn new(number_results: u64, results: Vec<Data>) -> Self {
        Self {
            number_results,
            results,
        }
    }

    /// A result carrying a match count but no rows.
    pub fn empty(number_results: u64) -> Self {
        Self::new(number_results, Vec::new())
    }

    #[must_use]
    pub fn number_results(&self) -> u64 {
        self.number_results
    }

    #[must_use]
    pub fn results(&self) -> &[Data] {
        &self.results
    }

    pub fn into_results(self) -> Vec<Data> {
        self.results
    }

    /// Re-project every row to carry only the requested fields. Asking for
    /// both (or neither) returns the rows unchanged.
    #[must_use]
    pub fn project(&self, want_id: bool, want_content: bool) -> SearchResult {
        let results = match (want_id, want_content) {
            (true, false) => self
                .results
                .iter()
                .map(|d| Data::new(d.identifier.clone(), None))
                .collect(),
            (false, true) => self
                .results
                .iter()
                .map(|d| Data::new(None, d.content.clone()))
                .collect(),
            _ => self.results.clone(),
        };
        SearchResult::new(self.number_results, results)
    }
}
