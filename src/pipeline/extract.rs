//! Text extraction: PDF bytes → layout blocks → tagged text + source map.
//!
//! ## Two halves
//!
//! Reading the layout needs pdfium; minting identifiers does not. The
//! pdfium half ([`read_layout`]) lists every page object in the order pdfium
//! reports them. [`group_paragraphs`] folds runs of consecutive text objects
//! that sit on the same or the next line into one paragraph block, since a
//! pdfium text object is usually a single `Tj` run. Non-text objects stay
//! their own entries. The pure half ([`assemble`]) filters those blocks to
//! text, trims, drops empties and mints `[[P{page}_{index}]]` from the
//! position in the *unfiltered* list, so the same PDF always yields the same
//! identifiers.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with global state and no async story.
//! [`extract`] moves the blocking work onto tokio's blocking pool so
//! the runtime's worker threads never stall on a large document.

use crate::document::{Block, Extraction};
use crate::error::TraceError;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// What kind of page object a layout block came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Text,
    Image,
    Path,
    Other,
}

/// One entry in a page's layout block list, text or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutBlock {
    pub kind: BlockKind,
    /// Raw, untrimmed text. Empty for non-text blocks.
    pub text: String,
}

impl LayoutBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Text,
            text: text.into(),
        }
    }

    pub fn non_text(kind: BlockKind) -> Self {
        Self {
            kind,
            text: String::new(),
        }
    }
}

/// The layout blocks of one page, in parser order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutPage {
    pub blocks: Vec<LayoutBlock>,
}

// ── Paragraph grouping ───────────────────────────────────────────────────

/// Vertical extent of a page object, in PDF points (y grows upwards).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerticalSpan {
    pub top: f32,
    pub bottom: f32,
}

impl VerticalSpan {
    fn height(&self) -> f32 {
        (self.top - self.bottom).max(0.0)
    }
}

/// One pdfium page object before paragraph grouping.
#[derive(Debug, Clone, PartialEq)]
pub struct PageObject {
    pub kind: BlockKind,
    pub text: String,
    /// `None` when pdfium cannot report bounds; such text never merges.
    pub span: Option<VerticalSpan>,
}

impl PageObject {
    pub fn text(text: impl Into<String>, top: f32, bottom: f32) -> Self {
        Self {
            kind: BlockKind::Text,
            text: text.into(),
            span: Some(VerticalSpan { top, bottom }),
        }
    }

    pub fn non_text(kind: BlockKind) -> Self {
        Self {
            kind,
            text: String::new(),
            span: None,
        }
    }
}

/// Line gap, in multiples of the taller line's height, that still continues
/// a paragraph.
const PARAGRAPH_GAP_FACTOR: f32 = 1.5;

/// How `next` continues the run ending in `prev`, if it does.
fn continuation(prev: VerticalSpan, next: VerticalSpan) -> Option<&'static str> {
    let line_height = prev.height().max(next.height()).max(1.0);
    if (prev.bottom - next.bottom).abs() < line_height * 0.5 {
        return Some(" ");
    }
    // Below the previous line, within one paragraph gap.
    let gap = prev.bottom - next.top;
    if next.top < prev.top && gap <= line_height * PARAGRAPH_GAP_FACTOR {
        return Some("\n");
    }
    None
}

/// Fold consecutive text objects into paragraph-like layout blocks.
///
/// Object order is preserved; a non-text object, a text object without
/// bounds, a jump upwards (next column) or a gap wider than
/// [`PARAGRAPH_GAP_FACTOR`] line heights ends the current paragraph.
/// Whitespace-only text objects are dropped inside a run and kept as their
/// own (later discarded) entry otherwise.
pub fn group_paragraphs(objects: impl IntoIterator<Item = PageObject>) -> LayoutPage {
    let mut blocks: Vec<LayoutBlock> = Vec::new();
    // Span of the last line of the open paragraph, if one is open.
    let mut open: Option<VerticalSpan> = None;

    for object in objects {
        if object.kind != BlockKind::Text {
            blocks.push(LayoutBlock::non_text(object.kind));
            open = None;
            continue;
        }

        let text = object.text.trim();
        if text.is_empty() {
            if open.is_none() {
                blocks.push(LayoutBlock::text(object.text));
            }
            continue;
        }

        let joined = match (open, object.span, blocks.last_mut()) {
            (Some(prev), Some(next), Some(last)) => match continuation(prev, next) {
                Some(sep) => {
                    last.text.push_str(sep);
                    last.text.push_str(text);
                    true
                }
                None => false,
            },
            _ => false,
        };
        if !joined {
            blocks.push(LayoutBlock::text(text));
        }
        open = object.span;
    }

    LayoutPage { blocks }
}

/// Mint identifiers and build the tagged text for a laid-out document.
///
/// Pages are numbered from 1 in iteration order. Block order within a page is
/// taken as-is; it is never re-sorted.
pub fn assemble(pages: impl IntoIterator<Item = LayoutPage>) -> Extraction {
    let mut blocks = Vec::new();
    let mut page_count = 0;

    for (page_idx, page) in pages.into_iter().enumerate() {
        page_count += 1;
        let page_num = page_idx + 1;
        for (index, layout) in page.blocks.into_iter().enumerate() {
            if layout.kind != BlockKind::Text {
                continue;
            }
            let text = layout.text.trim();
            if text.is_empty() {
                continue;
            }
            blocks.push(Block {
                page: page_num,
                index,
                text: text.to_string(),
            });
        }
    }

    debug!("Assembled {} text blocks from {} pages", blocks.len(), page_count);
    Extraction::from_blocks(page_count, blocks)
}

/// Extract and tag a PDF held in memory.
///
/// Runs the pdfium work inside `spawn_blocking`.
pub async fn extract(bytes: Vec<u8>, password: Option<String>) -> Result<Extraction, TraceError> {
    tokio::task::spawn_blocking(move || extract_blocking(&bytes, password.as_deref()))
        .await
        .map_err(|e| TraceError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Blocking implementation of [`extract`].
pub fn extract_blocking(bytes: &[u8], password: Option<&str>) -> Result<Extraction, TraceError> {
    check_pdf_header(bytes)?;
    let (title, pages) = read_layout(bytes, password)?;
    let mut extraction = assemble(pages);
    extraction.title = title;
    info!(
        "Extracted {} blocks ({} chars) from {} pages",
        extraction.blocks.len(),
        extraction.char_count(),
        extraction.page_count
    );
    Ok(extraction)
}

/// Reject bytes that cannot be a PDF before paying for a pdfium bind.
///
/// Readers accept a `%PDF` header anywhere in the first kilobyte.
pub fn check_pdf_header(bytes: &[u8]) -> Result<(), TraceError> {
    let head = &bytes[..bytes.len().min(1024)];
    if head.windows(4).any(|w| w == b"%PDF") {
        Ok(())
    } else {
        let magic: Vec<u8> = bytes.iter().take(4).copied().collect();
        Err(TraceError::MalformedDocument {
            detail: format!("missing %PDF header (first bytes: {:?})", magic),
        })
    }
}

/// Bind to a pdfium library.
///
/// Resolution order: `PDFIUM_LIB_PATH` (file, or directory containing the
/// platform library), the working directory, then the system library.
pub fn bind_pdfium() -> Result<Pdfium, TraceError> {
    if let Ok(env_path) = std::env::var("PDFIUM_LIB_PATH") {
        let path = PathBuf::from(env_path);
        let lib_path = if path.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&path)
        } else {
            path
        };
        return Pdfium::bind_to_library(&lib_path)
            .map(Pdfium::new)
            .map_err(|e| TraceError::PdfiumBindingFailed(format!("{}: {}", lib_path.display(), e)));
    }

    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| TraceError::PdfiumBindingFailed(e.to_string()))
}

/// Read every page's object list through pdfium.
fn read_layout(
    bytes: &[u8],
    password: Option<&str>,
) -> Result<(Option<String>, Vec<LayoutPage>), TraceError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| {
            let detail = format!("{:?}", e);
            if detail.contains("Password") || detail.contains("password") {
                TraceError::MalformedDocument {
                    detail: if password.is_some() {
                        "wrong password for encrypted PDF".to_string()
                    } else {
                        "PDF is encrypted and requires a password".to_string()
                    },
                }
            } else {
                TraceError::MalformedDocument { detail }
            }
        })?;

    let title = document
        .metadata()
        .get(PdfDocumentMetadataTagType::Title)
        .map(|tag| tag.value().trim().to_string())
        .filter(|t| !t.is_empty());

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut layout = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let objects: Vec<PageObject> = page.objects().iter().map(|obj| page_object(&obj)).collect();
        let object_count = objects.len();
        let grouped = group_paragraphs(objects);
        debug!(
            "Page {}: {} page objects → {} layout blocks",
            idx + 1,
            object_count,
            grouped.blocks.len()
        );
        layout.push(grouped);
    }

    Ok((title, layout))
}

fn page_object(object: &PdfPageObject<'_>) -> PageObject {
    if let Some(text) = object.as_text_object() {
        let span = object.bounds().ok().map(|b| VerticalSpan {
            top: b.top().value,
            bottom: b.bottom().value,
        });
        return PageObject {
            kind: BlockKind::Text,
            text: text.text(),
            span,
        };
    }
    let kind = match object.object_type() {
        PdfPageObjectType::Image => BlockKind::Image,
        PdfPageObjectType::Path => BlockKind::Path,
        _ => BlockKind::Other,
    };
    PageObject::non_text(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(blocks: Vec<LayoutBlock>) -> LayoutPage {
        LayoutPage { blocks }
    }

    #[test]
    fn two_page_alpha_beta() {
        let ex = assemble(vec![
            page(vec![LayoutBlock::text("Alpha.")]),
            page(vec![LayoutBlock::text("Beta.")]),
        ]);
        assert_eq!(ex.tagged_text, "[[P1_0]] Alpha.\n\n[[P2_0]] Beta.\n\n");
        assert_eq!(ex.source_map.get("[[P1_0]]"), Some("Alpha."));
        assert_eq!(ex.source_map.get("[[P2_0]]"), Some("Beta."));
        assert_eq!(ex.page_count, 2);
    }

    #[test]
    fn identifiers_use_unfiltered_index() {
        let ex = assemble(vec![page(vec![
            LayoutBlock::non_text(BlockKind::Image),
            LayoutBlock::text("   "),
            LayoutBlock::text("  Kept  \n"),
            LayoutBlock::non_text(BlockKind::Path),
            LayoutBlock::text("Also kept"),
        ])]);
        let ids: Vec<_> = ex.source_map.iter().map(|(id, _)| id.to_string()).collect();
        assert_eq!(ids, vec!["[[P1_2]]", "[[P1_4]]"]);
        assert_eq!(ex.source_map.get("[[P1_2]]"), Some("Kept"));
    }

    #[test]
    fn empty_pages_still_count() {
        let ex = assemble(vec![page(vec![]), page(vec![LayoutBlock::text("x")])]);
        assert_eq!(ex.page_count, 2);
        assert_eq!(ex.tagged_text, "[[P2_0]] x\n\n");
    }

    #[test]
    fn block_index_is_scoped_per_page() {
        let ex = assemble(vec![
            page(vec![LayoutBlock::text("a"), LayoutBlock::text("b")]),
            page(vec![LayoutBlock::text("c"), LayoutBlock::text("d")]),
        ]);
        let ids: Vec<_> = ex.blocks.iter().map(|b| b.identifier()).collect();
        assert_eq!(ids, vec!["[[P1_0]]", "[[P1_1]]", "[[P2_0]]", "[[P2_1]]"]);
    }

    #[test]
    fn wrapped_lines_form_one_paragraph() {
        let page = group_paragraphs(vec![
            PageObject::text("Line one", 729.0, 717.0),
            PageObject::text("Line two", 715.0, 703.0),
        ]);
        assert_eq!(page.blocks, vec![LayoutBlock::text("Line one\nLine two")]);
    }

    #[test]
    fn runs_on_one_line_join_with_a_space() {
        let page = group_paragraphs(vec![
            PageObject::text("Total:", 700.0, 688.0),
            PageObject::text(" 42 EUR", 700.5, 688.5),
        ]);
        assert_eq!(page.blocks, vec![LayoutBlock::text("Total: 42 EUR")]);
    }

    #[test]
    fn wide_gap_starts_a_new_paragraph() {
        let page = group_paragraphs(vec![
            PageObject::text("Heading", 730.0, 718.0),
            PageObject::text("Body", 680.0, 668.0),
        ]);
        assert_eq!(
            page.blocks,
            vec![LayoutBlock::text("Heading"), LayoutBlock::text("Body")]
        );
    }

    #[test]
    fn jump_upwards_starts_a_new_paragraph() {
        let page = group_paragraphs(vec![
            PageObject::text("left column end", 100.0, 88.0),
            PageObject::text("right column top", 730.0, 718.0),
        ]);
        assert_eq!(page.blocks.len(), 2);
    }

    #[test]
    fn non_text_object_breaks_a_run_and_keeps_its_slot() {
        let page = group_paragraphs(vec![
            PageObject::text("Above", 729.0, 717.0),
            PageObject::non_text(BlockKind::Image),
            PageObject::text("Below", 715.0, 703.0),
        ]);
        let ex = assemble(vec![page]);
        let ids: Vec<_> = ex.blocks.iter().map(|b| b.identifier()).collect();
        assert_eq!(ids, vec!["[[P1_0]]", "[[P1_2]]"]);
    }

    #[test]
    fn text_without_bounds_never_merges() {
        let unbounded = PageObject {
            kind: BlockKind::Text,
            text: "floating".into(),
            span: None,
        };
        let page = group_paragraphs(vec![PageObject::text("anchored", 729.0, 717.0), unbounded]);
        assert_eq!(page.blocks.len(), 2);
    }

    #[test]
    fn header_check_rejects_non_pdf() {
        let err = check_pdf_header(b"PK\x03\x04 zip file").unwrap_err();
        assert!(matches!(err, TraceError::MalformedDocument { .. }));
        assert!(check_pdf_header(b"").is_err());
    }

    #[test]
    fn header_check_accepts_leading_junk() {
        assert!(check_pdf_header(b"%PDF-1.7\n...").is_ok());
        assert!(check_pdf_header(b"\xEF\xBB\xBF%PDF-1.4").is_ok());
    }

    #[tokio::test]
    async fn malformed_bytes_fail_before_binding_pdfium() {
        let err = extract(b"definitely not a pdf".to_vec(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, TraceError::MalformedDocument { .. }), "got {err:?}");
    }
}
