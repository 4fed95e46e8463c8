//! Result types for query execution

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One matched document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit<T> {
    pub id: String,
    pub document: T,
    /// Full-text relevance; 0 without a text query
    pub score: f64,
}

/// Execution details of one search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchStatistics {
    pub execution_time: Duration,
    /// Fields answered from a field index
    pub indices_used: Vec<String>,
    /// Fields answered by reading documents
    pub full_scan_fields: Vec<String>,
    /// Size of the candidate set before pagination
    pub candidates_examined: usize,
    /// Indices searched by a multi-index search
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indices_queried: Vec<String>,
}

/// A page of results. Failures are reported in-band, never thrown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult<T> {
    pub hits: Vec<SearchHit<T>>,
    pub total_count: usize,
    pub page_number: usize,
    pub page_size: usize,
    pub statistics: SearchStatistics,
    pub success: bool,
    pub error: Option<String>,
}

impl<T> SearchResult<T> {
    /// A successful page
    pub fn page(
        hits: Vec<SearchHit<T>>,
        total_count: usize,
        page_number: usize,
        page_size: usize,
        statistics: SearchStatistics,
    ) -> Self {
        Self {
            hits,
            total_count,
            page_number,
            page_size,
            statistics,
            success: true,
            error: None,
        }
    }

    /// A failed search
    pub fn failure(message: impl Into<String>, page_number: usize, page_size: usize) -> Self {
        Self {
            hits: Vec::new(),
            total_count: 0,
            page_number,
            page_size,
            statistics: SearchStatistics::default(),
            success: false,
            error: Some(message.into()),
        }
    }

    /// IDs on this page, in order
    pub fn ids(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.id.as_str()).collect()
    }

    pub fn documents(&self) -> impl Iterator<Item = &T> {
        self.hits.iter().map(|h| &h.document)
    }

    /// Returns true if no documents matched on this page
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Returns the number of hits on this page
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Number of pages for the total count (1 when the page size is 0)
    pub fn total_pages(&self) -> usize {
        if self.page_size == 0 {
            1
        } else {
            self.total_count.div_ceil(self.page_size)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str) -> SearchHit<u32> {
        SearchHit {
            id: id.to_string(),
            document: 0,
            score: 0.0,
        }
    }

    #[test]
    fn test_page_accessors() {
        let result = SearchResult::page(vec![hit("a"), hit("b")], 5, 1, 2, SearchStatistics::default());
        assert!(result.success);
        assert_eq!(result.ids(), vec!["a", "b"]);
        assert_eq!(result.len(), 2);
        assert_eq!(result.total_pages(), 3);
    }

    #[test]
    fn test_failure() {
        let result: SearchResult<u32> = SearchResult::failure("bad regex", 1, 10);
        assert!(!result.success);
        assert!(result.is_empty());
        assert_eq!(result.error.as_deref(), Some("bad regex"));
    }
}
