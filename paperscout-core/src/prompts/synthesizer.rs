//! Report synthesis: turning analyzed papers into a markdown report.

use crate::citations::CitationNetwork;
use crate::paper::AnalyzedPaper;

pub const SYNTHESIS_SYSTEM_PROMPT: &str = "You are an expert academic writer and researcher. \
Your role is to synthesize findings from multiple research papers into coherent, well-structured \
literature reviews.\n\n\
Key principles:\n\
- Organize information thematically, not paper-by-paper\n\
- Identify patterns, trends, and contradictions\n\
- Maintain academic rigor and citation practices\n\
- Write clearly and concisely\n\
- Focus on answering the research question\n\
- Note limitations and gaps honestly\n\n\
You produce publication-quality research summaries.";

/// Build the synthesis prompt.
///
/// `papers` should already be limited to the slice fed into the prompt (the
/// synthesis step passes the first N by existing order).
pub fn synthesis_prompt(
    original_query: &str,
    papers: &[AnalyzedPaper],
    total_papers: usize,
    citation_network: Option<&CitationNetwork>,
) -> String {
    let mut papers_summary = String::new();
    for (i, analyzed) in papers.iter().enumerate() {
        papers_summary.push_str(&format!(
            "\n**Paper {n}: {title}**\n- Year: {year}\n- Contribution: {contribution}\n- Results: {results}\n- Relevance: {score}/5\n",
            n = i + 1,
            title = analyzed.paper.title,
            year = analyzed
                .paper
                .year
                .map(|y| y.to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
            contribution = analyzed.contribution,
            results = analyzed.results,
            score = analyzed.relevance_score,
        ));
    }

    let mut citation_context = String::new();
    if let Some(network) = citation_network {
        if !network.most_influential.is_empty() {
            citation_context.push_str("\n**Most Influential Papers (by citation network):**\n");
            for (paper_id, score) in network.most_influential.iter().take(3) {
                citation_context.push_str(&format!(
                    "- Paper ID: {} (influence score: {})\n",
                    paper_id, score
                ));
            }
        }
    }

    format!(
        r#"You are writing a comprehensive research report based on academic literature review.

**Original Research Question:**
"{original_query}"

**Analyzed Papers ({total_papers} total):**
{papers_summary}
{citation_context}

**Your Task:**
Synthesize the findings from these papers into a structured research report with the following sections:

1. **Executive Summary** (2-3 sentences)
   - Provide a concise overview of what was learned
   - Highlight the most important insights

2. **Key Findings** (3-7 bullet points)
   - Organize by themes or topics
   - Focus on novel contributions and significant results
   - Note consensus views and contradictions
   - Reference specific papers where relevant

3. **Methodological Approaches** (brief paragraph)
   - Common methods and techniques used across papers
   - Emerging approaches or innovations
   - Standard evaluation metrics or datasets

4. **Research Gaps** (2-5 bullet points)
   - Identify areas lacking research
   - Note limitations mentioned across papers
   - Suggest future research directions

5. **References** (formatted list)
   - List all papers analyzed
   - Format: [#] Author et al. (Year). Title. Venue.

**Guidelines:**
- Write for an academic audience
- Be objective and evidence-based
- Cite papers by number when making claims
- Organize thematically, not chronologically
- Highlight connections between papers
- Note disagreements or conflicting results
- Keep the report focused on answering the original question

**Output Format:**
Use clear markdown formatting with headers, bullet points, and proper citations.
"#
    )
}
