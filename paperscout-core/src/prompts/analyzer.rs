//! Paper analysis: structured extraction of contributions, methods, results.

use crate::llm::StructuredOutput;
use crate::paper::Paper;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Structured output of a single-paper analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperAnalysis {
    /// Main contribution in 1-2 sentences.
    pub contribution: String,
    /// Brief description of methods/approach used.
    pub methodology: String,
    /// Key findings and results.
    pub results: String,
    /// Mentioned limitations or future work.
    #[serde(default)]
    pub limitations: String,
    /// Relevance to the original query, 1-5.
    pub relevance_score: u8,
}

impl StructuredOutput for PaperAnalysis {
    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "contribution": {
                    "type": "string",
                    "description": "Main contribution in 1-2 sentences"
                },
                "methodology": {
                    "type": "string",
                    "description": "Brief description of methods/approach used"
                },
                "results": {
                    "type": "string",
                    "description": "Key findings and results"
                },
                "limitations": {
                    "type": "string",
                    "description": "Mentioned limitations or future work"
                },
                "relevance_score": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 5,
                    "description": "Relevance to original query (1-5 scale)"
                }
            },
            "required": ["contribution", "methodology", "results", "relevance_score"]
        })
    }

    fn validate(&self) -> Result<(), String> {
        if !(1..=5).contains(&self.relevance_score) {
            return Err(format!(
                "relevance_score must be 1-5, got {}",
                self.relevance_score
            ));
        }
        Ok(())
    }
}

pub const ANALYSIS_SYSTEM_PROMPT: &str = "You are an expert academic researcher skilled at \
quickly extracting key information from research papers. Your role is to analyze papers and \
identify their main contributions, methods, results, and relevance to specific research \
questions.\n\n\
Key principles:\n\
- Focus on factual information from abstracts\n\
- Be concise but comprehensive\n\
- Rate relevance objectively based on content overlap\n\
- Note when information is missing rather than speculating\n\
- Maintain academic terminology and precision\n\n\
You always provide structured, parseable output.";

/// Build the analysis prompt for a single paper.
pub fn analysis_prompt(paper: &Paper, original_query: &str) -> String {
    let authors = paper
        .authors
        .iter()
        .take(3)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    let year = paper
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    let abstract_text = if paper.abstract_text.is_empty() {
        "No abstract available"
    } else {
        &paper.abstract_text
    };

    format!(
        r#"You are analyzing an academic paper for a literature review.

**Original Research Question:**
"{original_query}"

**Paper Information:**
Title: {title}
Authors: {authors}
Year: {year}

**Abstract:**
{abstract_text}

**Your Task:**
Extract the following information from this paper:

1. **Contribution**: What is the main contribution or novel idea? (1-2 sentences)
2. **Methodology**: What approach/methods did they use? (brief description)
3. **Results**: What are the key findings or results? (main outcomes)
4. **Limitations**: Any mentioned limitations or future work directions? (optional)
5. **Relevance Score**: How relevant is this paper to the original research question? (1-5 scale)
   - 5 = Highly relevant, directly addresses the question
   - 4 = Very relevant, addresses key aspects
   - 3 = Moderately relevant, related but tangential
   - 2 = Somewhat relevant, peripheral connection
   - 1 = Minimally relevant, weak connection

**Guidelines:**
- Be concise and factual
- Focus on information present in the abstract
- If abstract lacks detail for a field, indicate "Not specified in abstract"
- Rate relevance based on how well it answers the original question

Provide structured analysis with all fields.
"#,
        title = paper.title,
    )
}
