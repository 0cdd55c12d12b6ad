//! Query decomposition: breaking a research question into sub-queries.

use crate::llm::StructuredOutput;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Minimum and maximum sub-queries a decomposition may produce.
pub const MIN_SUB_QUERIES: usize = 3;
pub const MAX_SUB_QUERIES: usize = 5;

/// Structured output of the decomposition step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubQueryList {
    /// Focused search phrases derived from the original question.
    pub queries: Vec<String>,
    /// Brief explanation of the decomposition strategy.
    #[serde(default)]
    pub reasoning: String,
}

impl StructuredOutput for SubQueryList {
    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "queries": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": MIN_SUB_QUERIES,
                    "maxItems": MAX_SUB_QUERIES,
                    "description": "List of 3-5 focused sub-queries for academic search"
                },
                "reasoning": {
                    "type": "string",
                    "description": "Brief explanation of decomposition strategy"
                }
            },
            "required": ["queries", "reasoning"]
        })
    }

    fn validate(&self) -> Result<(), String> {
        if self.queries.len() < MIN_SUB_QUERIES || self.queries.len() > MAX_SUB_QUERIES {
            return Err(format!(
                "expected {}-{} queries, got {}",
                MIN_SUB_QUERIES,
                MAX_SUB_QUERIES,
                self.queries.len()
            ));
        }
        if self.queries.iter().any(|q| q.trim().is_empty()) {
            return Err("queries must be non-empty".to_string());
        }
        Ok(())
    }
}

pub const DECOMPOSITION_SYSTEM_PROMPT: &str = "You are an expert research assistant specializing \
in academic literature review. Your role is to help researchers find relevant papers by \
decomposing broad research questions into focused, searchable sub-queries.\n\n\
Key principles:\n\
- Understand the research domain and its terminology\n\
- Consider multiple perspectives and aspects\n\
- Balance breadth (coverage) with depth (specificity)\n\
- Use terms that match how papers are actually titled/described\n\
- Focus on recent, relevant work\n\n\
You always provide structured output with clear reasoning.";

/// Build the decomposition prompt for a research question.
pub fn decomposition_prompt(query: &str) -> String {
    format!(
        r#"You are a research assistant helping to conduct academic literature review.

Your task is to decompose a broad research question into 3-5 focused sub-queries that will be used to search academic databases (Semantic Scholar and arXiv).

**Original Research Question:**
"{query}"

**Your Goal:**
Break this question down into specific, searchable sub-queries that:
1. Cover different aspects/dimensions of the topic
2. Are specific enough to retrieve relevant papers
3. Use appropriate academic terminology
4. Focus on recent work when relevant
5. Avoid redundancy: each sub-query should target a distinct aspect

**Guidelines:**
- Each sub-query should be a complete search phrase (not a question)
- Include key technical terms and concepts
- Consider: architectures, applications, methods, datasets, evaluation metrics
- Think about subdisciplines and related areas

**Example:**
Original: "How are transformers used in computer vision?"
Sub-queries:
1. "Vision transformer architectures ViT SWIN"
2. "Self-attention mechanisms image recognition"
3. "Transformer-based object detection DETR"
4. "Vision transformers vs CNNs comparative analysis"

Now decompose the original question into 3-5 sub-queries.

Also provide brief reasoning explaining your decomposition strategy.
"#
    )
}
