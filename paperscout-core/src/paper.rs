//! Standardized paper records and deduplication.
//!
//! Every source client converts its native response into [`Paper`] so the
//! rest of the pipeline is source-agnostic. Analysis wraps a paper without
//! dropping any of its fields.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Which academic source a paper came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    SemanticScholar,
    Arxiv,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::SemanticScholar => write!(f, "semantic_scholar"),
            Source::Arxiv => write!(f, "arxiv"),
        }
    }
}

/// A paper in the standardized shape shared by all sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    /// Source-native identifier; may be empty when the source has none.
    pub id: String,
    pub source: Source,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub citation_count: u64,
    pub url: String,
    pub venue: String,
    pub publication_date: String,
    /// arXiv subject categories, empty for other sources.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
}

impl Paper {
    /// Title normalized for identity comparison: trimmed and lowercased.
    pub fn normalized_title(&self) -> String {
        self.title.trim().to_lowercase()
    }
}

/// A paper together with the structured analysis extracted from it.
///
/// The paper is flattened so every original field survives serialization;
/// analysis only ever adds fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzedPaper {
    #[serde(flatten)]
    pub paper: Paper,
    pub contribution: String,
    pub methodology: String,
    pub results: String,
    #[serde(default)]
    pub limitations: String,
    /// Relevance to the original query, 1 to 5.
    pub relevance_score: u8,
}

impl AnalyzedPaper {
    /// Placeholder analysis used when extraction fails for a paper.
    pub fn analysis_failed(paper: Paper) -> Self {
        Self {
            paper,
            contribution: "Analysis failed".to_string(),
            methodology: String::new(),
            results: String::new(),
            limitations: String::new(),
            relevance_score: 3,
        }
    }
}

/// Remove duplicate papers, keeping the first occurrence of each identity.
///
/// Two papers are the same if their ids match (non-empty and equal) or their
/// titles match case-insensitively after trimming. Survivors keep their
/// original encounter order.
pub fn deduplicate_papers(papers: Vec<Paper>) -> Vec<Paper> {
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut seen_titles: HashSet<String> = HashSet::new();
    let mut unique = Vec::with_capacity(papers.len());

    let total = papers.len();
    for paper in papers {
        let title = paper.normalized_title();

        if !paper.id.is_empty() && seen_ids.contains(&paper.id) {
            tracing::debug!(id = %paper.id, "Skipping duplicate paper id");
            continue;
        }
        if !title.is_empty() && seen_titles.contains(&title) {
            tracing::debug!(title = %title, "Skipping duplicate paper title");
            continue;
        }

        if !paper.id.is_empty() {
            seen_ids.insert(paper.id.clone());
        }
        if !title.is_empty() {
            seen_titles.insert(title);
        }
        unique.push(paper);
    }

    if total > unique.len() {
        tracing::debug!(before = total, after = unique.len(), "Deduplicated papers");
    }
    unique
}

/// Concatenate paper lists and deduplicate the result.
pub fn merge_paper_lists(lists: Vec<Vec<Paper>>) -> Vec<Paper> {
    deduplicate_papers(lists.into_iter().flatten().collect())
}
