//! # tracecite
//!
//! Compress PDF documents with an LLM while keeping every claim traceable
//! to the exact block of source text it came from.
//!
//! ## Why this crate?
//!
//! An LLM summary is only as useful as it is checkable. This crate tags
//! every extracted text block with a stable identifier such as `[[P3_7]]`
//! (page 3, layout block 7), asks the model to carry those tags through
//! into its summary and answers, and then resolves each tag back to the
//! original text. Tags the model invented resolve to nothing and are
//! reported as invalid, never matched to a "nearest" block.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Extract   layout blocks via pdfium → tagged text + source map
//!  ├─ 3. Compress  LLM call with rate-limit backoff → JSON summary
//!  ├─ 4. Normalize strip fences, strict parse
//!  └─ 5. Cite      resolve identifiers against the source map
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tracecite::{DocumentSession, TraceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let bytes = std::fs::read("contract.pdf")?;
//!     let mut session = DocumentSession::ingest(bytes, "contract.pdf", TraceConfig::default()).await?;
//!
//!     let report = session.summarize().await?;
//!     println!("{}", report.summary.high_level_summary);
//!
//!     let turn = session.ask("What is the termination notice period?").await?;
//!     println!("{} ({})", turn.answer.answer, turn.answer.evidence_label());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `tracecite` binary (clap + indicatif + anyhow + tracing-subscriber) |
//! | `server` | on      | Enables [`server`] and the `tracecite-server` binary (axum + tower-http + dotenvy) |
//!
//! Disable both when using only the library:
//! ```toml
//! tracecite = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod citation;
pub mod config;
pub mod document;
pub mod error;
pub mod identifier;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;
pub mod session;
pub mod summary;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use citation::{resolve, resolve_summary, Citation, CitationReport, PointCitations};
pub use config::{TraceConfig, TraceConfigBuilder};
pub use document::{Block, Extraction, SourceMap};
pub use error::{TraceError, UpstreamFailure};
pub use identifier::{find_identifiers, SourceId};
pub use pipeline::extract::extract;
pub use pipeline::input::{resolve_input, LoadedInput};
pub use pipeline::llm::{Completion, CompletionRequest, ProviderClient, RetryPolicy};
pub use pipeline::normalize::{normalize_response, parse_summary};
pub use process::{
    answer_question, compress, extract_document, process_document, ProcessedDocument, QaAnswer,
};
pub use progress::{NoopProgressCallback, ProgressCallback, RequestKind, TraceProgressCallback};
pub use session::{DocumentSession, QaTurn};
pub use summary::{DocumentMetrics, ImpactLevel, KeyPoint, RiskType, Section, SummaryReport};
