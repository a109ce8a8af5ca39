//! A long-lived view of one document: extract once, summarise, ask many.
//!
//! The session owns the [`Extraction`] behind an `Arc` and never mutates
//! it, so the summary and every answer resolve citations against the exact
//! source map the model was shown. Q&A turns are appended to a history the
//! caller can render as a transcript.

use crate::citation::{self, CitationReport, PointCitations};
use crate::config::TraceConfig;
use crate::document::Extraction;
use crate::error::TraceError;
use crate::pipeline::llm::{self, Completion};
use crate::process::{self, QaAnswer};
use crate::summary::{DocumentMetrics, SummaryReport};
use std::sync::Arc;
use tracing::info;

/// One question and its answer.
#[derive(Debug, Clone)]
pub struct QaTurn {
    pub question: String,
    pub answer: QaAnswer,
}

pub struct DocumentSession {
    filename: String,
    extraction: Arc<Extraction>,
    client: Arc<dyn Completion>,
    config: TraceConfig,
    report: Option<SummaryReport>,
    history: Vec<QaTurn>,
}

impl DocumentSession {
    /// Extract `bytes` and open a session over the result.
    ///
    /// The LLM client is resolved first, so a missing credential fails here
    /// rather than on the first question.
    pub async fn ingest(
        bytes: Vec<u8>,
        filename: impl Into<String>,
        config: TraceConfig,
    ) -> Result<Self, TraceError> {
        let client = llm::resolve_client(&config)?;
        let extraction = process::extract_document(bytes, &config).await?;
        Ok(Self::from_parts(filename, extraction, client, config))
    }

    /// Open a session over an existing extraction.
    pub fn from_extraction(
        filename: impl Into<String>,
        extraction: Extraction,
        config: TraceConfig,
    ) -> Result<Self, TraceError> {
        let client = llm::resolve_client(&config)?;
        Ok(Self::from_parts(filename, extraction, client, config))
    }

    fn from_parts(
        filename: impl Into<String>,
        extraction: Extraction,
        client: Arc<dyn Completion>,
        config: TraceConfig,
    ) -> Self {
        let filename = filename.into();
        info!(
            "Session opened for {} ({} blocks)",
            filename,
            extraction.source_map.len()
        );
        Self {
            filename,
            extraction: Arc::new(extraction),
            client,
            config,
            report: None,
            history: Vec::new(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn extraction(&self) -> &Arc<Extraction> {
        &self.extraction
    }

    /// The last successful summary, if any.
    pub fn report(&self) -> Option<&SummaryReport> {
        self.report.as_ref()
    }

    pub fn history(&self) -> &[QaTurn] {
        &self.history
    }

    /// Compress the document and keep the result.
    ///
    /// A failed call leaves any earlier summary in place.
    pub async fn summarize(&mut self) -> Result<&SummaryReport, TraceError> {
        let report = process::compress_with(
            self.client.as_ref(),
            &self.extraction.tagged_text,
            &self.config,
        )
        .await?;
        Ok(self.report.insert(report))
    }

    /// Ask a question and append the turn to the history.
    pub async fn ask(&mut self, question: &str) -> Result<&QaTurn, TraceError> {
        let answer = process::ask_with(
            self.client.as_ref(),
            &self.extraction.tagged_text,
            &self.extraction.source_map,
            question,
            &self.config,
        )
        .await?;
        self.history.push(QaTurn {
            question: question.to_string(),
            answer,
        });
        let last = self.history.len() - 1;
        Ok(&self.history[last])
    }

    /// Headline numbers for the current summary.
    pub fn metrics(&self) -> Option<DocumentMetrics> {
        self.report.as_ref().map(|r| r.metrics(&self.extraction))
    }

    /// Per key point citations for the current summary.
    pub fn citations(&self) -> Vec<PointCitations> {
        self.report
            .as_ref()
            .map(|r| citation::resolve_summary(r, &self.extraction.source_map))
            .unwrap_or_default()
    }

    pub fn citation_report(&self) -> CitationReport {
        CitationReport::from_points(&self.citations())
    }
}
