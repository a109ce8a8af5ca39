//! Citation resolution: identifiers → original text.
//!
//! Resolution is a pure lookup against the [`SourceMap`] of the extraction
//! the identifiers were meant to reference. An identifier the map does not
//! know, whether it is well formed or not, resolves to an *invalid* citation
//! and is never paired with any text. Nothing here guesses a "nearest"
//! block.

use crate::document::SourceMap;
use crate::summary::SummaryReport;
use serde::Serialize;
use std::collections::HashSet;

/// A single resolved (or unresolved) citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    /// The identifier exactly as the model emitted it.
    pub id: String,
    pub valid: bool,
    /// Original block text; `None` exactly when `valid` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Citation {
    pub fn lookup(id: &str, map: &SourceMap) -> Self {
        let text = map.get(id).map(str::to_string);
        Self {
            id: id.to_string(),
            valid: text.is_some(),
            text,
        }
    }
}

/// Resolve a list of identifiers, preserving order and duplicates.
pub fn resolve<I, S>(ids: I, map: &SourceMap) -> Vec<Citation>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    ids.into_iter()
        .map(|id| Citation::lookup(id.as_ref(), map))
        .collect()
}

/// The citations of one key point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointCitations {
    pub section: String,
    pub statement: String,
    pub citations: Vec<Citation>,
}

/// Resolve every key point's `source_ids`, in summary order.
pub fn resolve_summary(report: &SummaryReport, map: &SourceMap) -> Vec<PointCitations> {
    report
        .key_points()
        .map(|(section, point)| PointCitations {
            section: section.to_string(),
            statement: point.statement.clone(),
            citations: resolve(&point.source_ids, map),
        })
        .collect()
}

/// Aggregate citation health for a summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CitationReport {
    /// Distinct identifiers that resolve, in first-seen order.
    pub valid: Vec<String>,
    /// Distinct identifiers that do not resolve, in first-seen order.
    pub invalid: Vec<String>,
    /// Key points with a statement but no resolvable citation.
    pub uncited_points: usize,
}

impl CitationReport {
    pub fn from_points(points: &[PointCitations]) -> Self {
        let mut seen = HashSet::new();
        let mut report = CitationReport::default();
        for point in points {
            if !point.statement.trim().is_empty() && !point.citations.iter().any(|c| c.valid) {
                report.uncited_points += 1;
            }
            for c in &point.citations {
                if !seen.insert(c.id.as_str()) {
                    continue;
                }
                if c.valid {
                    report.valid.push(c.id.clone());
                } else {
                    report.invalid.push(c.id.clone());
                }
            }
        }
        report
    }

    pub fn is_clean(&self) -> bool {
        self.invalid.is_empty() && self.uncited_points == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Block, Extraction};
    use crate::summary::{KeyPoint, Section, SummaryTree};

    fn alpha_beta() -> SourceMap {
        Extraction::from_blocks(
            2,
            vec![
                Block {
                    page: 1,
                    index: 0,
                    text: "Alpha.".into(),
                },
                Block {
                    page: 2,
                    index: 0,
                    text: "Beta.".into(),
                },
            ],
        )
        .source_map
    }

    fn report(points: Vec<Vec<&str>>) -> SummaryReport {
        SummaryReport {
            summary: SummaryTree {
                high_level_summary: String::new(),
                sections: vec![Section {
                    title: "S".into(),
                    key_points: points
                        .into_iter()
                        .enumerate()
                        .map(|(i, ids)| KeyPoint {
                            statement: format!("point {i}"),
                            source_ids: ids.into_iter().map(String::from).collect(),
                            ..Default::default()
                        })
                        .collect(),
                }],
            },
            ..Default::default()
        }
    }

    #[test]
    fn unknown_identifier_is_invalid_without_text() {
        let map = alpha_beta();
        let cites = resolve(["[[P1_0]]", "[[P9_9]]"], &map);
        assert_eq!(cites[0].text.as_deref(), Some("Alpha."));
        assert!(cites[0].valid);
        assert!(!cites[1].valid);
        assert_eq!(cites[1].text, None);
    }

    #[test]
    fn malformed_identifiers_are_invalid() {
        let map = alpha_beta();
        for id in ["P1_0", "[[p1_0]]", "[[P1_0]] ", ""] {
            assert!(!Citation::lookup(id, &map).valid, "{id:?}");
        }
    }

    #[test]
    fn resolve_keeps_order_and_duplicates() {
        let map = alpha_beta();
        let ids: Vec<_> = resolve(["[[P2_0]]", "[[P1_0]]", "[[P2_0]]"], &map)
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["[[P2_0]]", "[[P1_0]]", "[[P2_0]]"]);
    }

    #[test]
    fn invalid_citation_omits_text_field() {
        let c = Citation::lookup("[[P9_9]]", &alpha_beta());
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json, serde_json::json!({"id": "[[P9_9]]", "valid": false}));
    }

    #[test]
    fn summary_report_partitions_identifiers() {
        let map = alpha_beta();
        let summary = report(vec![
            vec!["[[P1_0]]", "[[P9_9]]"],
            vec!["[[P9_9]]"],
            vec![],
            vec!["[[P2_0]]", "[[P1_0]]"],
        ]);
        let points = resolve_summary(&summary, &map);
        assert_eq!(points.len(), 4);
        assert_eq!(points[0].section, "S");

        let r = CitationReport::from_points(&points);
        assert_eq!(r.valid, vec!["[[P1_0]]", "[[P2_0]]"]);
        assert_eq!(r.invalid, vec!["[[P9_9]]"]);
        assert_eq!(r.uncited_points, 2);
        assert!(!r.is_clean());
    }

    #[test]
    fn blank_statements_are_not_counted_as_uncited() {
        let map = alpha_beta();
        let mut summary = report(vec![vec![], vec![]]);
        summary.summary.sections[0].key_points[0].statement = "  ".into();
        let points = resolve_summary(&summary, &map);
        assert_eq!(CitationReport::from_points(&points).uncited_points, 1);
    }

    #[test]
    fn clean_report() {
        let map = alpha_beta();
        let points = resolve_summary(&report(vec![vec!["[[P1_0]]"], vec!["[[P2_0]]"]]), &map);
        assert!(CitationReport::from_points(&points).is_clean());
    }
}
