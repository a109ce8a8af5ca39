//! Pipeline stages for traceable document compression.
//!
//! Each submodule implements exactly one step, so each can be tested
//! without the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ llm ──▶ normalize
//! (URL/path)  (pdfium)   (LLM)   (fences, JSON)
//! ```
//!
//! 1. [`input`]     — load the user-supplied path or URL into memory
//! 2. [`extract`]   — read page layout blocks and mint source identifiers;
//!    runs in `spawn_blocking` because pdfium is not async-safe
//! 3. [`llm`]       — drive the LLM call with retry/backoff; the only stage
//!    with network I/O besides URL downloads
//! 4. [`normalize`] — strip fenced-code wrapping and strictly parse the
//!    compression response

pub mod extract;
pub mod input;
pub mod llm;
pub mod normalize;
