//! Boundary traits for external paper data capabilities.
//!
//! The workflow steps depend on these traits, not on the concrete HTTP
//! clients, which live in `paperscout-tools`. Tests substitute mocks.

use crate::error::SourceError;
use crate::paper::Paper;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A searchable paper source.
///
/// Implementations must return an empty list for "no results" and reserve
/// `Err` for transport failures, which the search step tolerates per source.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        limit: usize,
        year_min: Option<i32>,
    ) -> Result<Vec<Paper>, SourceError>;

    /// Source name used in logs.
    fn name(&self) -> &str;
}

/// Citation lookup result for a single paper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CitationRecord {
    /// Ids of papers this paper cites.
    pub references: Vec<String>,
    /// Ids of papers citing this paper.
    pub citations: Vec<String>,
    pub influential_citation_count: u64,
}

impl CitationRecord {
    /// The degraded record substituted when a fetch fails.
    pub fn zeroed() -> Self {
        Self::default()
    }
}

/// A citation-data capability.
///
/// The citation step tolerates `Err` by substituting a zeroed record and
/// counting the failure; concrete clients retry internally first.
#[async_trait]
pub trait CitationProvider: Send + Sync {
    async fn get_citations(
        &self,
        paper_id: &str,
        max_refs: usize,
        max_cites: usize,
    ) -> Result<CitationRecord, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_record() {
        let record = CitationRecord::zeroed();
        assert!(record.references.is_empty());
        assert!(record.citations.is_empty());
        assert_eq!(record.influential_citation_count, 0);
    }

    #[test]
    fn test_citation_record_serde() {
        let record = CitationRecord {
            references: vec!["r1".into()],
            citations: vec!["c1".into(), "c2".into()],
            influential_citation_count: 3,
        };
        let json = serde_json::to_string(&record).unwrap();
        let restored: CitationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.citations.len(), 2);
        assert_eq!(restored.influential_citation_count, 3);
    }
}
