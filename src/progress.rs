//! Progress-callback trait for document pipeline events.
//!
//! Inject an [`Arc<dyn TraceProgressCallback>`] via
//! [`crate::config::TraceConfigBuilder::progress_callback`] to observe a
//! document as it is extracted, summarised and queried.
//!
//! # Why callbacks instead of channels?
//!
//! The host decides how events travel: a terminal spinner, a log line, a
//! WebSocket push. The library only reports them. The trait is
//! `Send + Sync` so a single callback can be shared by concurrent requests.
//!
//! # Example
//!
//! ```rust
//! use tracecite::{TraceConfig, TraceProgressCallback};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct Announcer;
//!
//! impl TraceProgressCallback for Announcer {
//!     fn on_rate_limited(&self, attempt: u32, max_attempts: u32, delay: Duration) {
//!         eprintln!("quota hit ({attempt}/{max_attempts}), waiting {delay:?}");
//!     }
//! }
//!
//! let config = TraceConfig::builder()
//!     .progress_callback(Arc::new(Announcer) as Arc<dyn TraceProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Which of the two LLM operations a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Compression,
    Question,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Compression => f.write_str("compression"),
            RequestKind::Question => f.write_str("question"),
        }
    }
}

/// Called by the pipeline as a document moves through it.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait TraceProgressCallback: Send + Sync {
    /// Called once a document's text has been extracted and tagged.
    ///
    /// # Arguments
    /// * `page_count`  — pages in the document
    /// * `block_count` — tagged text blocks that survived filtering
    fn on_extraction_complete(&self, page_count: usize, block_count: usize) {
        let _ = (page_count, block_count);
    }

    /// Called just before the first attempt of an LLM request.
    fn on_request_start(&self, kind: RequestKind) {
        let _ = kind;
    }

    /// Called when a rate-limited attempt is about to be retried.
    ///
    /// # Arguments
    /// * `attempt`      — 1-indexed attempt that just failed
    /// * `max_attempts` — attempt budget for this request
    /// * `delay`        — how long the pipeline will wait before retrying
    fn on_rate_limited(&self, attempt: u32, max_attempts: u32, delay: Duration) {
        let _ = (attempt, max_attempts, delay);
    }

    /// Called once an LLM request has finished, successfully or not.
    fn on_request_complete(&self, kind: RequestKind, success: bool) {
        let _ = (kind, success);
    }
}

/// The default when no callback is configured.
pub struct NoopProgressCallback;

impl TraceProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::TraceConfig`].
pub type ProgressCallback = Arc<dyn TraceProgressCallback>;
