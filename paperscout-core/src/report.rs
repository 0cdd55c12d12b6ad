//! Best-effort section extraction from the synthesized markdown report.
//!
//! String scraping of free text is inherently lossy; both extractors fall
//! back to a single placeholder entry when no bulleted lines are found.

/// Maximum findings returned by [`extract_findings`].
const MAX_FINDINGS: usize = 7;
/// Maximum gaps returned by [`extract_gaps`].
const MAX_GAPS: usize = 5;

/// Extract key findings from a generated report.
///
/// Scans for a "key findings" / "main findings" heading and collects
/// bullet-marked lines until the next heading.
pub fn extract_findings(report: &str) -> Vec<String> {
    extract_section(
        report,
        &["key finding", "main finding"],
        MAX_FINDINGS,
        "See full report for detailed findings",
    )
}

/// Extract research gaps from a generated report.
///
/// Scans for a "research gaps" / "future work" heading and collects
/// bullet-marked lines until the next heading.
pub fn extract_gaps(report: &str) -> Vec<String> {
    extract_section(
        report,
        &["research gap", "future work"],
        MAX_GAPS,
        "See full report for research gaps",
    )
}

fn extract_section(report: &str, markers: &[&str], cap: usize, placeholder: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut in_section = false;

    for line in report.lines() {
        let lower = line.to_lowercase();
        if markers.iter().any(|m| lower.contains(m)) {
            in_section = true;
            continue;
        }

        // Stop at the next heading.
        if in_section && line.starts_with('#') {
            break;
        }

        if in_section {
            let trimmed = line.trim();
            if let Some(item) = strip_bullet(trimmed) {
                if !item.is_empty() {
                    items.push(item.to_string());
                }
            }
        }
    }

    if items.is_empty() {
        items.push(placeholder.to_string());
    }
    items.truncate(cap);
    items
}

/// Strip a leading bullet marker, returning the remaining text.
fn strip_bullet(line: &str) -> Option<&str> {
    line.strip_prefix('-')
        .or_else(|| line.strip_prefix('*'))
        .or_else(|| line.strip_prefix('\u{2022}'))
        .map(|rest| rest.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_REPORT: &str = "\
# Research Report

## Executive Summary
A short overview.

## Key Findings
- Finding one about attention
- Finding two about scaling
* Finding three with a star bullet

## Methodological Approaches
Common methods paragraph.

## Research Gaps
- Gap one: limited benchmarks
- Gap two: no long-context evaluation

## References
[1] Someone et al. (2024). A Paper.
";

    #[test]
    fn test_extract_findings_basic() {
        let findings = extract_findings(SAMPLE_REPORT);
        assert_eq!(findings.len(), 3);
        assert_eq!(findings[0], "Finding one about attention");
        assert_eq!(findings[2], "Finding three with a star bullet");
    }

    #[test]
    fn test_extract_gaps_basic() {
        let gaps = extract_gaps(SAMPLE_REPORT);
        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[0], "Gap one: limited benchmarks");
    }

    #[test]
    fn test_extraction_stops_at_next_heading() {
        let findings = extract_findings(SAMPLE_REPORT);
        // Nothing from the Research Gaps section leaks in.
        assert!(findings.iter().all(|f| !f.contains("Gap")));
    }

    #[test]
    fn test_case_insensitive_heading_match() {
        let report = "## KEY FINDINGS\n- shouted finding\n";
        let findings = extract_findings(report);
        assert_eq!(findings, vec!["shouted finding"]);
    }

    #[test]
    fn test_future_work_marker_matches_gaps() {
        let report = "## Future Work\n- try larger models\n";
        let gaps = extract_gaps(report);
        assert_eq!(gaps, vec!["try larger models"]);
    }

    #[test]
    fn test_placeholder_when_no_bullets() {
        let report = "## Key Findings\nProse only, no bullets here.\n";
        let findings = extract_findings(report);
        assert_eq!(findings, vec!["See full report for detailed findings"]);

        let gaps = extract_gaps("no gaps section at all");
        assert_eq!(gaps, vec!["See full report for research gaps"]);
    }

    #[test]
    fn test_findings_capped_at_seven() {
        let mut report = String::from("## Key Findings\n");
        for i in 0..10 {
            report.push_str(&format!("- finding {}\n", i));
        }
        let findings = extract_findings(&report);
        assert_eq!(findings.len(), 7);
        assert_eq!(findings[6], "finding 6");
    }

    #[test]
    fn test_gaps_capped_at_five() {
        let mut report = String::from("## Research Gaps\n");
        for i in 0..8 {
            report.push_str(&format!("- gap {}\n", i));
        }
        let gaps = extract_gaps(&report);
        assert_eq!(gaps.len(), 5);
    }

    #[test]
    fn test_unicode_bullet() {
        let report = "## Key Findings\n\u{2022} unicode bullet finding\n";
        let findings = extract_findings(report);
        assert_eq!(findings, vec!["unicode bullet finding"]);
    }
}
