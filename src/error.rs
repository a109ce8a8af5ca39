//! Error types for the tracecite library.
//!
//! Two error types reflect two different layers:
//!
//! * [`TraceError`] — every failure a caller of the library can observe.
//!   Each kind is distinct and inspectable: a malformed PDF, a missing API
//!   key, an exhausted rate-limit budget, an upstream failure and an
//!   unparseable model response all surface as different variants.
//!
//! * [`UpstreamFailure`] — the raw outcome of a single LLM call, classified
//!   into "rate limited" (transient) or "other" (permanent). Only the retry
//!   loop in [`crate::pipeline::llm`] sees these; it converts them into
//!   [`TraceError::RateLimited`] or [`TraceError::UpstreamError`].

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the tracecite library.
#[derive(Debug, Error)]
pub enum TraceError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is neither a usable path nor an HTTP/HTTPS URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but the download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Document errors ───────────────────────────────────────────────────
    /// The bytes could not be parsed as a PDF.
    #[error("Malformed document: {detail}")]
    MalformedDocument { detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or to the directory containing it),\n\
place the library in the working directory, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// No LLM provider could be configured (usually a missing API key).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    MissingCredential { provider: String, hint: String },

    /// The provider kept rate-limiting us until the attempt budget ran out.
    #[error(
        "Exceeded maximum retries ({attempts}) for API quota. \
Please try again later or switch models.\nLast error: {detail}"
    )]
    RateLimited { attempts: u32, detail: String },

    /// Any non-rate-limit failure from the LLM side. Never retried.
    #[error("LLM API error: {message}")]
    UpstreamError { message: String },

    /// The model answered, but the answer is not the structure we asked for.
    ///
    /// `raw` is the untouched response text so an operator can see exactly
    /// what came back.
    #[error("Failed to parse LLM response as a summary: {detail}")]
    ResponseFormatError { detail: String, raw: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TraceError {
    /// `true` only for transient upstream conditions worth waiting out.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TraceError::RateLimited { .. })
    }

    /// The raw model output attached to a [`TraceError::ResponseFormatError`].
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            TraceError::ResponseFormatError { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

/// Lower-case substrings that mark a provider error as quota / rate-limit.
const RATE_LIMIT_MARKERS: &[&str] = &[
    "429",
    "rate limit",
    "ratelimit",
    "quota",
    "resource exhausted",
    "resource_exhausted",
    "too many requests",
];

/// Outcome of one failed LLM call, before retry policy is applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamFailure {
    /// HTTP 429 / quota exhaustion. Transient.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Anything else (auth, bad request, server error, timeout).
    #[error("{0}")]
    Other(String),
}

impl UpstreamFailure {
    /// Classify a provider error message.
    ///
    /// Providers surface quota problems with different wording; all of them
    /// carry one of these markers somewhere in the message.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        let rate_limited = RATE_LIMIT_MARKERS
            .iter()
            .any(|marker| lower.contains(marker));
        if rate_limited {
            UpstreamFailure::RateLimited(message)
        } else {
            UpstreamFailure::Other(message)
        }
    }

    pub fn message(&self) -> &str {
        match self {
            UpstreamFailure::RateLimited(m) | UpstreamFailure::Other(m) => m,
        }
    }
}
