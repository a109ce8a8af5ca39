//! Extraction output: blocks, the source map and the tagged text.
//!
//! An [`Extraction`] is built once per uploaded document and never mutated
//! afterwards. Summaries and Q&A answers only ever *read* it, so it can be
//! shared behind an `Arc` between concurrent requests without locking.

use crate::identifier::SourceId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::HashMap;

/// Separator written after every block in the tagged text.
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// One paragraph-like unit of text extracted from a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    /// 1-based page number.
    pub page: usize,
    /// 0-based position in the page's unfiltered layout block list.
    pub index: usize,
    /// Trimmed, non-empty text.
    pub text: String,
}

impl Block {
    pub fn source_id(&self) -> SourceId {
        SourceId::new(self.page, self.index)
    }

    /// The wire-form identifier, e.g. `[[P2_5]]`.
    pub fn identifier(&self) -> String {
        self.source_id().to_string()
    }
}

/// Identifier → original block text.
///
/// Iterates (and serialises, as a JSON object) in extraction order; lookups
/// go through a hash index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a block. A repeated identifier keeps its first text.
    pub(crate) fn insert(&mut self, id: String, text: String) {
        if self.index.contains_key(&id) {
            return;
        }
        self.index.insert(id.clone(), self.entries.len());
        self.entries.push((id, text));
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.index.get(id).map(|&i| self.entries[i].1.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(identifier, text)` pairs in extraction order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Rebuild a source map from a tagged-text blob.
    ///
    /// Used by stateless adapters that only get the tagged text back from a
    /// client. A block whose own text contains a line starting with an
    /// identifier followed by a space is split there; extraction never
    /// produces such text from ordinary documents.
    pub fn from_tagged_text(tagged_text: &str) -> Self {
        static RE_TAG_START: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"(?m)^\[\[P\d+_\d+\]\] ").unwrap());

        let mut map = SourceMap::new();
        let starts: Vec<_> = RE_TAG_START.find_iter(tagged_text).collect();
        for (i, tag) in starts.iter().enumerate() {
            let end = starts.get(i + 1).map_or(tagged_text.len(), |next| next.start());
            let text = tagged_text[tag.end()..end].trim_end();
            map.insert(tag.as_str().trim_end().to_string(), text.to_string());
        }
        map
    }
}

impl Serialize for SourceMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, text) in &self.entries {
            map.serialize_entry(id, text)?;
        }
        map.end()
    }
}

/// Everything one extraction pass produces.
#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    /// Document title from the PDF metadata, when present.
    pub title: Option<String>,
    pub page_count: usize,
    /// Surviving text blocks in page-then-block order.
    pub blocks: Vec<Block>,
    /// The exact payload sent to the LLM.
    pub tagged_text: String,
    pub source_map: SourceMap,
}

impl Extraction {
    /// Build tagged text and source map from blocks already in order.
    pub fn from_blocks(page_count: usize, blocks: Vec<Block>) -> Self {
        let mut tagged_text = String::new();
        let mut source_map = SourceMap::new();
        for block in &blocks {
            let id = block.identifier();
            tagged_text.push_str(&id);
            tagged_text.push(' ');
            tagged_text.push_str(&block.text);
            tagged_text.push_str(BLOCK_SEPARATOR);
            source_map.insert(id, block.text.clone());
        }
        Self {
            title: None,
            page_count,
            blocks,
            tagged_text,
            source_map,
        }
    }

    /// Size of the tagged text in characters (not bytes).
    pub fn char_count(&self) -> usize {
        self.tagged_text.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(page: usize, index: usize, text: &str) -> Block {
        Block {
            page,
            index,
            text: text.to_string(),
        }
    }

    #[test]
    fn two_page_scenario() {
        let ex = Extraction::from_blocks(2, vec![block(1, 0, "Alpha."), block(2, 0, "Beta.")]);
        assert_eq!(ex.tagged_text, "[[P1_0]] Alpha.\n\n[[P2_0]] Beta.\n\n");
        assert_eq!(ex.source_map.len(), 2);
        assert_eq!(ex.source_map.get("[[P1_0]]"), Some("Alpha."));
        assert_eq!(ex.source_map.get("[[P2_0]]"), Some("Beta."));
    }

    #[test]
    fn source_map_serialises_in_extraction_order() {
        let ex = Extraction::from_blocks(
            2,
            vec![block(1, 4, "z first"), block(1, 7, "a second"), block(2, 0, "m third")],
        );
        let json = serde_json::to_string(&ex.source_map).unwrap();
        assert_eq!(
            json,
            r#"{"[[P1_4]]":"z first","[[P1_7]]":"a second","[[P2_0]]":"m third"}"#
        );
    }

    #[test]
    fn rebuild_from_tagged_text() {
        let ex = Extraction::from_blocks(
            3,
            vec![
                block(1, 0, "Title"),
                block(1, 2, "Line one\nLine two"),
                block(3, 1, "Para\n\nwith blank line"),
            ],
        );
        let rebuilt = SourceMap::from_tagged_text(&ex.tagged_text);
        assert_eq!(rebuilt, ex.source_map);
    }

    #[test]
    fn rebuild_ignores_preamble_and_empty_input() {
        assert!(SourceMap::from_tagged_text("").is_empty());
        let map = SourceMap::from_tagged_text("garbage\n[[P1_0]] Alpha.\n\n");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("[[P1_0]]"), Some("Alpha."));
    }

    #[test]
    fn duplicate_insert_keeps_first_text() {
        let mut map = SourceMap::new();
        map.insert("[[P1_0]]".into(), "first".into());
        map.insert("[[P1_0]]".into(), "second".into());
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("[[P1_0]]"), Some("first"));
    }

    #[test]
    fn char_count_counts_unicode_scalars() {
        let ex = Extraction::from_blocks(1, vec![block(1, 0, "é")]);
        assert_eq!(ex.char_count(), "[[P1_0]] é\n\n".chars().count());
    }
}
