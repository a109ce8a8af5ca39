//! The structured result of a compression call.
//!
//! Field names match the JSON schema the compression prompt asks for, so
//! the types deserialize directly from the (cleaned) model response. Every
//! field defaults to empty when missing and unknown fields are ignored: the
//! model's output is only as reliable as the model.
//!
//! Enumerated fields ([`RiskType`], [`ImpactLevel`]) keep unrecognised values
//! verbatim instead of rejecting them. Deciding what an unfamiliar label
//! means is left to whoever renders it.

use crate::document::Extraction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level compression response.
///
/// `json_meta_analysis` is an older name some prompt revisions produced. It
/// is read when `meta_analysis` is absent and never written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSummaryReport")]
pub struct SummaryReport {
    pub summary: SummaryTree,
    pub meta_analysis: MetaAnalysis,
}

/// Wire shape of [`SummaryReport`], with both meta-analysis keys.
#[derive(Deserialize)]
struct RawSummaryReport {
    #[serde(default)]
    summary: SummaryTree,
    #[serde(default)]
    meta_analysis: Option<MetaAnalysis>,
    #[serde(default)]
    json_meta_analysis: Option<MetaAnalysis>,
}

impl From<RawSummaryReport> for SummaryReport {
    fn from(raw: RawSummaryReport) -> Self {
        Self {
            summary: raw.summary,
            meta_analysis: raw
                .meta_analysis
                .or(raw.json_meta_analysis)
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryTree {
    #[serde(default)]
    pub high_level_summary: String,
    #[serde(default)]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub key_points: Vec<KeyPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyPoint {
    #[serde(default)]
    pub statement: String,
    #[serde(default)]
    pub source_ids: Vec<String>,
    #[serde(default)]
    pub risk_type: RiskType,
    /// Long-form elaboration.
    #[serde(default)]
    pub details: String,
    /// Why this point survived compression.
    #[serde(default)]
    pub rationale: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaAnalysis {
    #[serde(default)]
    pub omitted_themes: Vec<OmittedTheme>,
    #[serde(default)]
    pub global_retention_rationale: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OmittedTheme {
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub reason_for_omission: String,
    #[serde(default)]
    pub impact_score: ImpactLevel,
}

// ── Enumerations ─────────────────────────────────────────────────────────

/// Risk classification of a key point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum RiskType {
    #[default]
    None,
    Operational,
    Financial,
    Legal,
    /// Anything the model invented, kept as written.
    Other(String),
}

impl RiskType {
    /// Counts toward the dashboard's risk profile.
    ///
    /// Matches on substrings so labels like "High - Legal" or
    /// "Critical Operational" still register.
    pub fn is_flagged(&self) -> bool {
        let label = self.as_str().to_lowercase();
        ["high", "critical", "operational", "financial", "legal"]
            .iter()
            .any(|k| label.contains(k))
    }

    /// Severe enough to raise an alert of its own.
    pub fn is_critical(&self) -> bool {
        let label = self.as_str().to_lowercase();
        label.contains("high") || label.contains("critical")
    }

    pub fn as_str(&self) -> &str {
        match self {
            RiskType::None => "None",
            RiskType::Operational => "Operational",
            RiskType::Financial => "Financial",
            RiskType::Legal => "Legal",
            RiskType::Other(s) => s,
        }
    }
}

impl From<Option<String>> for RiskType {
    fn from(s: Option<String>) -> Self {
        s.map(RiskType::from).unwrap_or_default()
    }
}

impl From<String> for RiskType {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => RiskType::None,
            "operational" => RiskType::Operational,
            "financial" => RiskType::Financial,
            "legal" => RiskType::Legal,
            _ => RiskType::Other(s),
        }
    }
}

impl From<RiskType> for String {
    fn from(r: RiskType) -> Self {
        match r {
            RiskType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for RiskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much an omitted theme matters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum ImpactLevel {
    #[default]
    Low,
    Medium,
    High,
    Other(String),
}

impl ImpactLevel {
    pub fn as_str(&self) -> &str {
        match self {
            ImpactLevel::Low => "Low",
            ImpactLevel::Medium => "Medium",
            ImpactLevel::High => "High",
            ImpactLevel::Other(s) => s,
        }
    }
}

impl From<Option<String>> for ImpactLevel {
    fn from(s: Option<String>) -> Self {
        s.map(ImpactLevel::from).unwrap_or_default()
    }
}

impl From<String> for ImpactLevel {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "" => ImpactLevel::Low,
            "medium" => ImpactLevel::Medium,
            "high" => ImpactLevel::High,
            _ => ImpactLevel::Other(s),
        }
    }
}

impl From<ImpactLevel> for String {
    fn from(i: ImpactLevel) -> Self {
        match i {
            ImpactLevel::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Metrics ──────────────────────────────────────────────────────────────

/// Headline numbers for a summarised document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DocumentMetrics {
    /// Key points whose risk type is flagged.
    pub risk_count: usize,
    /// Key points rated high or critical.
    pub critical_count: usize,
    /// Number of tagged source blocks.
    pub source_coverage: usize,
    /// Tagged-text characters per character of serialised summary.
    pub compression_ratio: f64,
}

impl SummaryReport {
    /// All key points with the title of the section they belong to.
    pub fn key_points(&self) -> impl Iterator<Item = (&str, &KeyPoint)> {
        self.summary
            .sections
            .iter()
            .flat_map(|s| s.key_points.iter().map(move |p| (s.title.as_str(), p)))
    }

    /// Key points that should be surfaced as alerts.
    pub fn critical_points(&self) -> Vec<(&str, &KeyPoint)> {
        self.key_points()
            .filter(|(_, p)| p.risk_type.is_critical())
            .collect()
    }

    pub fn metrics(&self, extraction: &Extraction) -> DocumentMetrics {
        let risk_count = self
            .key_points()
            .filter(|(_, p)| p.risk_type.is_flagged())
            .count();
        let critical_count = self.critical_points().len();

        let summary_len = serde_json::to_string(&self.summary)
            .map(|s| s.chars().count())
            .unwrap_or(0);
        let compression_ratio = if summary_len > 0 {
            extraction.char_count() as f64 / summary_len as f64
        } else {
            0.0
        };

        DocumentMetrics {
            risk_count,
            critical_count,
            source_coverage: extraction.source_map.len(),
            compression_ratio,
        }
    }
}
