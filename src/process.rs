//! One-shot entry points: extract, compress, answer.
//!
//! These functions are stateless. Everything they need comes in as
//! arguments, which is what the HTTP adapter wants: the client sends the
//! tagged text back with every question. For a long-lived, in-process view
//! of one document use [`crate::session::DocumentSession`] instead.
//!
//! Every LLM-backed function resolves its client *before* building a
//! prompt, so a missing API key is reported as
//! [`TraceError::MissingCredential`] without any upstream traffic.

use crate::citation::{self, Citation, PointCitations};
use crate::config::TraceConfig;
use crate::document::{Extraction, SourceMap};
use crate::error::TraceError;
use crate::identifier::find_identifiers;
use crate::pipeline::llm::{self, Completion, CompletionRequest, RetryPolicy};
use crate::pipeline::{extract, normalize};
use crate::progress::RequestKind;
use crate::prompts;
use crate::summary::{DocumentMetrics, SummaryReport};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

/// Evidence label used when an answer cites nothing.
pub const NO_EVIDENCE_LABEL: &str = "Based on document context";

/// Everything the process endpoint returns for an uploaded document.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedDocument {
    pub filename: String,
    pub extraction: Extraction,
    pub report: SummaryReport,
    /// Per key point citations, in summary order.
    pub citations: Vec<PointCitations>,
    pub metrics: DocumentMetrics,
    pub duration_ms: u64,
}

/// A question's answer with the identifiers it cites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QaAnswer {
    /// The model's text, untouched.
    pub answer: String,
    /// Identifiers found in the answer, in order of appearance.
    pub evidence: Vec<String>,
    pub citations: Vec<Citation>,
}

impl QaAnswer {
    /// Build from raw answer text, resolving citations against `map`.
    pub fn from_text(answer: String, map: &SourceMap) -> Self {
        let evidence = find_identifiers(&answer);
        let citations = citation::resolve(&evidence, map);
        Self {
            answer,
            evidence,
            citations,
        }
    }

    /// Comma-joined evidence, or a fixed label when there is none.
    pub fn evidence_label(&self) -> String {
        if self.evidence.is_empty() {
            NO_EVIDENCE_LABEL.to_string()
        } else {
            self.evidence.join(", ")
        }
    }
}

/// Extract and tag a PDF held in memory, reporting to the progress callback.
pub async fn extract_document(bytes: Vec<u8>, config: &TraceConfig) -> Result<Extraction, TraceError> {
    let extraction = extract::extract(bytes, config.password.clone()).await?;
    if extraction.blocks.is_empty() {
        warn!("Document has no extractable text; the model will see an empty body");
    }
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(extraction.page_count, extraction.blocks.len());
    }
    Ok(extraction)
}

/// Compress tagged text into a [`SummaryReport`].
pub async fn compress(tagged_text: &str, config: &TraceConfig) -> Result<SummaryReport, TraceError> {
    let client = llm::resolve_client(config)?;
    compress_with(client.as_ref(), tagged_text, config).await
}

/// Answer a question about tagged text.
///
/// Citations are resolved against a source map rebuilt from `tagged_text`.
pub async fn answer_question(
    tagged_text: &str,
    question: &str,
    config: &TraceConfig,
) -> Result<QaAnswer, TraceError> {
    let client = llm::resolve_client(config)?;
    let map = SourceMap::from_tagged_text(tagged_text);
    ask_with(client.as_ref(), tagged_text, &map, question, config).await
}

/// Extract, compress and cross-reference one uploaded document.
pub async fn process_document(
    bytes: Vec<u8>,
    filename: impl Into<String>,
    config: &TraceConfig,
) -> Result<ProcessedDocument, TraceError> {
    let start = Instant::now();
    let filename = filename.into();
    info!("Processing document: {}", filename);

    let client = llm::resolve_client(config)?;
    let extraction = extract_document(bytes, config).await?;
    let report = compress_with(client.as_ref(), &extraction.tagged_text, config).await?;
    let citations = citation::resolve_summary(&report, &extraction.source_map);
    let metrics = report.metrics(&extraction);

    let duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Processed {}: {} sections, {} risks flagged, ratio {:.1}x in {}ms",
        filename,
        report.summary.sections.len(),
        metrics.risk_count,
        metrics.compression_ratio,
        duration_ms
    );

    Ok(ProcessedDocument {
        filename,
        extraction,
        report,
        citations,
        metrics,
        duration_ms,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

pub(crate) async fn compress_with(
    client: &dyn Completion,
    tagged_text: &str,
    config: &TraceConfig,
) -> Result<SummaryReport, TraceError> {
    let request = CompletionRequest {
        prompt: prompts::build_compression_prompt(tagged_text),
        temperature: config.compression_temperature,
        max_tokens: config.max_tokens,
    };
    let raw = run(
        client,
        &request,
        RetryPolicy::compression(config),
        RequestKind::Compression,
        config,
    )
    .await?;
    normalize::parse_summary(&raw)
}

pub(crate) async fn ask_with(
    client: &dyn Completion,
    tagged_text: &str,
    map: &SourceMap,
    question: &str,
    config: &TraceConfig,
) -> Result<QaAnswer, TraceError> {
    let request = CompletionRequest {
        prompt: prompts::build_qa_prompt(tagged_text, question),
        temperature: config.qa_temperature,
        max_tokens: config.max_tokens,
    };
    let raw = run(
        client,
        &request,
        RetryPolicy::question(config),
        RequestKind::Question,
        config,
    )
    .await?;
    Ok(QaAnswer::from_text(raw, map))
}

async fn run(
    client: &dyn Completion,
    request: &CompletionRequest,
    policy: RetryPolicy,
    kind: RequestKind,
    config: &TraceConfig,
) -> Result<String, TraceError> {
    let progress = config.progress_callback.as_deref();
    if let Some(cb) = progress {
        cb.on_request_start(kind);
    }
    info!("Sending {} request ({} prompt chars)", kind, request.prompt.len());
    let result = llm::complete_with_retry(client, request, policy, progress).await;
    if let Some(cb) = progress {
        cb.on_request_complete(kind, result.is_ok());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamFailure;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const TAGGED: &str = "[[P1_0]] Alpha.\n\n[[P2_0]] Beta.\n\n";

    struct Canned {
        reply: Result<String, UpstreamFailure>,
        prompts: Mutex<Vec<CompletionRequest>>,
    }

    impl Canned {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    impl Completion for Canned {
        fn complete<'a>(
            &'a self,
            request: &'a CompletionRequest,
        ) -> BoxFuture<'a, Result<String, UpstreamFailure>> {
            self.prompts.lock().unwrap().push(request.clone());
            let reply = self.reply.clone();
            Box::pin(async move { reply })
        }
    }

    fn config_with(client: Arc<Canned>) -> TraceConfig {
        TraceConfig::builder().client(client).build().unwrap()
    }

    #[tokio::test]
    async fn answer_resolves_citations_against_tagged_text() {
        let client = Canned::ok("Beta follows Alpha [[P2_0]] [[P1_0]], not [[P9_9]].");
        let answer = answer_question(TAGGED, "Order?", &config_with(client.clone()))
            .await
            .unwrap();

        assert_eq!(answer.evidence, vec!["[[P2_0]]", "[[P1_0]]", "[[P9_9]]"]);
        assert_eq!(answer.citations[0].text.as_deref(), Some("Beta."));
        assert!(!answer.citations[2].valid);
        assert_eq!(answer.evidence_label(), "[[P2_0]], [[P1_0]], [[P9_9]]");

        let sent = client.prompts.lock().unwrap();
        assert_eq!(sent[0].temperature, 0.2);
        assert!(sent[0].prompt.contains("User Question: Order?"));
    }

    #[tokio::test]
    async fn uncited_answer_gets_context_label() {
        let client = Canned::ok(prompts::NOT_AVAILABLE);
        let answer = answer_question(TAGGED, "Price?", &config_with(client))
            .await
            .unwrap();
        assert!(answer.evidence.is_empty());
        assert_eq!(answer.evidence_label(), NO_EVIDENCE_LABEL);
    }

    #[tokio::test]
    async fn compress_parses_fenced_reply() {
        let client = Canned::ok(
            "```json\n{\"summary\":{\"high_level_summary\":\"two letters\",\"sections\":[]}}\n```",
        );
        let report = compress(TAGGED, &config_with(client.clone())).await.unwrap();
        assert_eq!(report.summary.high_level_summary, "two letters");
        assert_eq!(client.prompts.lock().unwrap()[0].temperature, 0.5);
    }

    #[tokio::test]
    async fn compress_reports_format_error_with_raw_text() {
        let client = Canned::ok("I cannot summarise this.");
        let err = compress(TAGGED, &config_with(client)).await.unwrap_err();
        assert_eq!(err.raw_response(), Some("I cannot summarise this."));
    }

    #[tokio::test]
    async fn progress_sees_request_lifecycle() {
        #[derive(Default)]
        struct Count(AtomicUsize, AtomicUsize);
        impl crate::progress::TraceProgressCallback for Count {
            fn on_request_start(&self, _kind: RequestKind) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
            fn on_request_complete(&self, _kind: RequestKind, success: bool) {
                if success {
                    self.1.fetch_add(1, Ordering::SeqCst);
                }
            }
        }

        let count = Arc::new(Count::default());
        let config = TraceConfig::builder()
            .client(Canned::ok("fine"))
            .progress_callback(count.clone())
            .build()
            .unwrap();
        answer_question(TAGGED, "q", &config).await.unwrap();
        assert_eq!(count.0.load(Ordering::SeqCst), 1);
        assert_eq!(count.1.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn credentials_are_checked_before_extraction() {
        let config = TraceConfig::builder()
            .provider_name("definitely-not-a-provider")
            .build()
            .unwrap();
        let err = process_document(b"not a pdf".to_vec(), "x.pdf", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, TraceError::MissingCredential { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn malformed_upload_fails_before_compression() {
        let client = Canned::ok("{\"summary\":{}}");
        let err = process_document(b"hello".to_vec(), "x.txt", &config_with(client.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, TraceError::MalformedDocument { .. }));
        assert!(client.prompts.lock().unwrap().is_empty());
    }
}
