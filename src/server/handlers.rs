//! HTTP handlers for the tracecite server.

use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::ApiError;
use super::AppState;
use crate::citation::{Citation, PointCitations};
use crate::document::SourceMap;
use crate::process;
use crate::summary::{DocumentMetrics, SummaryReport};

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub filename: String,
    pub page_count: usize,
    pub source_map: SourceMap,
    pub tagged_text: String,
    pub data: SummaryReport,
    pub citations: Vec<PointCitations>,
    pub metrics: DocumentMetrics,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub tagged_text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub answer: String,
    pub evidence: String,
    pub citations: Vec<Citation>,
}

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

/// Extract, compress and cross-reference an uploaded PDF
pub async fn process(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let mut multipart =
        multipart.map_err(|_| ApiError::BadRequest("No file uploaded".to_string()))?;

    let (filename, bytes) = read_file_field(&mut multipart)
        .await?
        .ok_or_else(|| ApiError::BadRequest("No file uploaded".to_string()))?;
    if filename.is_empty() || bytes.is_empty() {
        return Err(ApiError::BadRequest("No file selected".to_string()));
    }
    info!("Upload received: {} ({} bytes)", filename, bytes.len());

    let doc = process::process_document(bytes, filename, &state.config).await?;

    Ok(Json(ProcessResponse {
        success: true,
        filename: doc.filename,
        page_count: doc.extraction.page_count,
        source_map: doc.extraction.source_map,
        tagged_text: doc.extraction.tagged_text,
        data: doc.report,
        citations: doc.citations,
        metrics: doc.metrics,
    }))
}

/// Answer a question about tagged text sent back by the client
pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let question = req.question.unwrap_or_default();
    let tagged_text = req.tagged_text.unwrap_or_default();
    if question.trim().is_empty() || tagged_text.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Missing question or context".to_string(),
        ));
    }

    let answer = process::answer_question(&tagged_text, question.trim(), &state.config).await?;

    Ok(Json(ChatResponse {
        success: true,
        evidence: answer.evidence_label(),
        answer: answer.answer,
        citations: answer.citations,
    }))
}

/// First multipart field named `file`, as `(file name, bytes)`.
async fn read_file_field(
    multipart: &mut Multipart,
) -> Result<Option<(String, Vec<u8>)>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(upload_error)?;
        return Ok(Some((filename, bytes.to_vec())));
    }
    Ok(None)
}

fn upload_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::Upload {
        status: e.status(),
        message: e.body_text(),
    }
}
