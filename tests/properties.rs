//! Property tests for the extraction → citation protocol.
//!
//! Extraction is driven through [`assemble`], the pdfium-free half of the
//! extractor, so these run without a pdfium library.

use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};
use tracecite::citation::{resolve_summary, CitationReport};
use tracecite::pipeline::extract::{assemble, BlockKind, LayoutBlock, LayoutPage};
use tracecite::summary::{KeyPoint, Section, SummaryTree};
use tracecite::{find_identifiers, normalize_response, SourceMap, SummaryReport};

// ── Strategies ───────────────────────────────────────────────────────────────

fn layout_block() -> impl Strategy<Value = LayoutBlock> {
    prop_oneof![
        6 => "[ \n]{0,2}[A-Za-z0-9][A-Za-z0-9 .,;:\n-]{0,40}[ \n]{0,2}".prop_map(|s| LayoutBlock::text(s)),
        1 => "[ \n\t]{0,4}".prop_map(|s| LayoutBlock::text(s)),
        1 => Just(LayoutBlock::non_text(BlockKind::Image)),
        1 => Just(LayoutBlock::non_text(BlockKind::Path)),
    ]
}

fn document() -> impl Strategy<Value = Vec<LayoutPage>> {
    prop::collection::vec(
        prop::collection::vec(layout_block(), 0..8).prop_map(|blocks| LayoutPage { blocks }),
        1..6,
    )
}

fn clean_json() -> impl Strategy<Value = String> {
    prop::collection::btree_map("[a-z_]{1,12}", "[A-Za-z0-9 .,`\\[\\]_-]{0,30}", 0..6).prop_map(
        |m: BTreeMap<String, String>| {
            serde_json::to_string(&serde_json::json!({ "summary": m })).unwrap()
        },
    )
}

// ── Properties ───────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn extraction_is_deterministic(pages in document()) {
        let a = assemble(pages.clone());
        let b = assemble(pages);
        prop_assert_eq!(&a.tagged_text, &b.tagged_text);
        prop_assert_eq!(&a.source_map, &b.source_map);
    }

    #[test]
    fn identifiers_are_unique_and_cover_every_text_block(pages in document()) {
        let expected = pages
            .iter()
            .flat_map(|p| &p.blocks)
            .filter(|b| b.kind == BlockKind::Text && !b.text.trim().is_empty())
            .count();
        let ex = assemble(pages);

        let ids: Vec<String> = ex.blocks.iter().map(|b| b.identifier()).collect();
        let distinct: HashSet<&String> = ids.iter().collect();
        prop_assert_eq!(distinct.len(), ids.len());
        prop_assert_eq!(ids.len(), expected);
        prop_assert_eq!(ex.source_map.len(), expected);
        prop_assert_eq!(find_identifiers(&ex.tagged_text), ids);
    }

    #[test]
    fn every_tagged_identifier_maps_to_the_text_after_it(pages in document()) {
        let ex = assemble(pages);
        for block in &ex.blocks {
            let id = block.identifier();
            let needle = format!("{} {}\n\n", id, block.text);
            prop_assert!(ex.tagged_text.contains(&needle));
            prop_assert_eq!(ex.source_map.get(&id), Some(block.text.as_str()));
        }
        prop_assert_eq!(SourceMap::from_tagged_text(&ex.tagged_text), ex.source_map);
    }

    #[test]
    fn cited_identifiers_partition_into_valid_and_invalid(
        pages in document(),
        picks in prop::collection::vec(prop::collection::vec((any::<bool>(), 0usize..64, 0usize..64), 0..5), 0..6),
    ) {
        let ex = assemble(pages);
        let known: Vec<String> = ex.source_map.iter().map(|(id, _)| id.to_string()).collect();

        let key_points: Vec<KeyPoint> = picks
            .iter()
            .map(|ids| KeyPoint {
                statement: "claim".into(),
                source_ids: ids
                    .iter()
                    .map(|&(use_known, a, b)| match (use_known, known.is_empty()) {
                        (true, false) => known[a % known.len()].clone(),
                        _ => format!("[[P{}_{}]]", 1000 + a, b),
                    })
                    .collect(),
                ..Default::default()
            })
            .collect();
        let cited: HashSet<String> = key_points.iter().flat_map(|k| k.source_ids.clone()).collect();

        let report = SummaryReport {
            summary: SummaryTree {
                high_level_summary: String::new(),
                sections: vec![Section { title: "S".into(), key_points }],
            },
            ..Default::default()
        };
        let points = resolve_summary(&report, &ex.source_map);
        for pc in &points {
            for c in &pc.citations {
                prop_assert_eq!(c.valid, c.text.is_some());
                prop_assert_eq!(c.text.as_deref(), ex.source_map.get(&c.id));
            }
        }

        let partition = CitationReport::from_points(&points);
        let valid: HashSet<String> = partition.valid.iter().cloned().collect();
        let invalid: HashSet<String> = partition.invalid.iter().cloned().collect();
        prop_assert!(valid.is_disjoint(&invalid));
        prop_assert_eq!(valid.union(&invalid).cloned().collect::<HashSet<_>>(), cited);
        prop_assert!(valid.iter().all(|id| ex.source_map.contains(id)));
        prop_assert!(invalid.iter().all(|id| !ex.source_map.contains(id)));
    }

    #[test]
    fn clean_json_passes_through_unchanged(json in clean_json()) {
        prop_assert_eq!(normalize_response(&json), json.clone());
        let fenced = format!("```json\n{}\n```", json);
        prop_assert_eq!(normalize_response(&fenced), json);
    }
}
