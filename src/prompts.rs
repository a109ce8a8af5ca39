//! Prompt templates for compression and question answering.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing what the model is asked to do
//!    (a new summary field, a stricter citation rule) means editing exactly
//!    one place.
//!
//! 2. **Testability** — unit tests inspect the prompts directly, so a
//!    regression that drops the "preserve tags" rule is caught without
//!    calling a model.
//!
//! Both builders are plain templates: the tagged text (and the question) is
//! embedded verbatim, with no truncation or chunking. A document therefore
//! has to fit in the model's context window.

/// Fixed answer the Q&A prompt asks for when the text has no answer.
pub const NOT_AVAILABLE: &str = "Information not available in the document.";

/// Instructions and JSON schema for the compression call.
pub const COMPRESSION_INSTRUCTIONS: &str = r#"You are an expert analyst. Your task is to compress the provided document into a structured summary.
Input text contains source tags like [[P1_0]], [[P2_5]] at the start of blocks.
You MUST preserve these tags in your output for traceability. Copy them exactly as they appear; never invent, renumber or reformat a tag.

Output Format (JSON):
{
  "summary": {
    "high_level_summary": "A concise 2-3 sentence overview of the entire document.",
    "sections": [
      {
        "title": "Section/Chapter Title",
        "key_points": [
          {
            "statement": "Key fact or claim.",
            "source_ids": ["[[P1_0]]", "[[P1_2]]"],
            "risk_type": "None/Operational/Financial/Legal",
            "details": "A comprehensive 3-5 sentence deep-dive. Include background context, specific figures, dates, exceptions, and potential implications. This is for users who need the full story behind the bullet point.",
            "rationale": "Why this retention is critical."
          }
        ]
      }
    ]
  },
  "meta_analysis": {
    "omitted_themes": [
      {
        "theme": "Description of omitted topic",
        "reason_for_omission": "Why it was removed.",
        "impact_score": "Low/Medium/High"
      }
    ],
    "global_retention_rationale": "Overall strategy."
  }
}

Requirements:
1. Capture ALL key facts, exceptions, and risks.
2. EVERY 'statement' must include at least one 'source_id'.
3. The 'details' field MUST be elaborate and comprehensive (not just a rephrasing).
4. Fill 'meta_analysis' to explain what was removed and why.
5. Output ONLY the JSON object. Do NOT wrap it in ```json fences."#;

/// Build the compression prompt for a tagged document.
pub fn build_compression_prompt(tagged_text: &str) -> String {
    format!(
        "{}\n\nDocument Content:\n{}",
        COMPRESSION_INSTRUCTIONS, tagged_text
    )
}

/// Build the question-answering prompt for a tagged document.
pub fn build_qa_prompt(tagged_text: &str, question: &str) -> String {
    format!(
        "You are an expert document analyst. You must answer the user's question based ONLY on the provided document text.\n\
The text contains source tags like [[P1_0]]. You MUST use these tags as 'proofs' in your answer.\n\
Requirements:\n\
1. Provide a detailed, comprehensive answer.\n\
2. Explicitly cite the source tags (e.g., [[P1_0]], [[P2_5]]) for EVERY claim or fact you mention. Copy tags exactly; never invent one.\n\
3. If the answer is not in the text, say '{not_available}'\n\
4. Your goal is to show the user exactly WHY you chose this answer by referencing the tags.\n\n\
Document Content:\n{tagged_text}\n\n\
User Question: {question}\n\n\
Answer (Detailed with Proofs):",
        not_available = NOT_AVAILABLE,
        tagged_text = tagged_text,
        question = question,
    )
}
