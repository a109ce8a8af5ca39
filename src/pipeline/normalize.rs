//! Response normalisation: turn raw model text into a [`SummaryReport`].
//!
//! ## Why is this necessary?
//!
//! Even when asked for bare JSON, models regularly wrap their answer in a
//! fenced code block tagged `json`, or prefix it with a byte-order mark. Both are
//! harmless to a human and fatal to a JSON parser, so they are stripped
//! before parsing.
//!
//! Parsing itself is strict: a payload that is not a JSON object with a
//! `summary` object inside is reported as
//! [`TraceError::ResponseFormatError`] carrying the raw text. Nothing here
//! ever substitutes an empty summary for an answer it could not read.
//!
//! Field values are not validated. An unexpected `risk_type` flows through
//! untouched (see [`crate::summary::RiskType::Other`]).

use crate::error::TraceError;
use crate::summary::SummaryReport;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)\s*```\z").unwrap());

/// Strip an outer fenced-code wrapper, if there is one.
///
/// Input without a wrapper is returned unchanged, so applying this twice is
/// the same as applying it once.
pub fn normalize_response(raw: &str) -> String {
    let trimmed = raw.trim_start_matches('\u{FEFF}').trim();
    match RE_OUTER_FENCE.captures(trimmed) {
        Some(caps) => {
            debug!("Stripped code fence from model response");
            caps[1].trim().to_string()
        }
        None => raw.to_string(),
    }
}

/// Normalise and strictly parse a compression response.
pub fn parse_summary(raw: &str) -> Result<SummaryReport, TraceError> {
    let cleaned = normalize_response(raw);
    let format_error = |detail: String| TraceError::ResponseFormatError {
        detail,
        raw: raw.to_string(),
    };

    let value: Value = serde_json::from_str(cleaned.trim_start_matches('\u{FEFF}').trim())
        .map_err(|e| format_error(format!("invalid JSON: {}", e)))?;

    let Some(object) = value.as_object() else {
        return Err(format_error(format!(
            "expected a JSON object, got {}",
            json_kind(&value)
        )));
    };
    match object.get("summary") {
        Some(Value::Object(_)) => {}
        Some(other) => {
            return Err(format_error(format!(
                "\"summary\" must be an object, got {}",
                json_kind(other)
            )))
        }
        None => return Err(format_error("missing \"summary\" object".to_string())),
    }

    serde_json::from_value(value).map_err(|e| format_error(format!("unexpected shape: {}", e)))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
