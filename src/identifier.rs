//! Source identifiers: the `[[P<page>_<block>]]` tokens that tie every
//! generated claim back to a block of the original PDF.
//!
//! The lexical form is fixed: `P` is upper-case, both numbers are base-10
//! without padding, and the token is wrapped in double square brackets. The
//! same form is written into the tagged text sent to the LLM and is the only
//! form recognised when scanning the model's answer.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

/// Pattern matching one identifier anywhere in free text.
pub const IDENTIFIER_PATTERN: &str = r"\[\[P\d+_\d+\]\]";

static RE_IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(IDENTIFIER_PATTERN).unwrap());

static RE_IDENTIFIER_EXACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[\[P(0|[1-9]\d*)_(0|[1-9]\d*)\]\]$").unwrap());

/// A parsed source identifier.
///
/// Consumers treat identifiers as opaque strings; the structured form exists
/// for minting and for debugging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId {
    /// 1-based page number.
    pub page: usize,
    /// 0-based index in the page's unfiltered layout block list.
    pub block: usize,
}

impl SourceId {
    pub fn new(page: usize, block: usize) -> Self {
        Self { page, block }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[[P{}_{}]]", self.page, self.block)
    }
}

/// Returned when a string is not a canonical identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a source identifier: {0:?}")]
pub struct InvalidIdentifier(pub String);

impl FromStr for SourceId {
    type Err = InvalidIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = RE_IDENTIFIER_EXACT
            .captures(s)
            .ok_or_else(|| InvalidIdentifier(s.to_string()))?;
        let page = caps[1]
            .parse()
            .map_err(|_| InvalidIdentifier(s.to_string()))?;
        let block = caps[2]
            .parse()
            .map_err(|_| InvalidIdentifier(s.to_string()))?;
        Ok(SourceId { page, block })
    }
}

/// Every identifier appearing in `text`, in order of appearance.
///
/// Duplicates are kept: an answer that cites the same block twice reports it
/// twice.
pub fn find_identifiers(text: &str) -> Vec<String> {
    RE_IDENTIFIER
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// `true` when `s` is exactly one identifier and nothing else.
pub fn is_identifier(s: &str) -> bool {
    RE_IDENTIFIER_EXACT.is_match(s)
}
