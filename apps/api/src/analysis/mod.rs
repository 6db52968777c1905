//! Analysis: the three AI operations a resume goes through.
//!
//! `AnalysisService` is the seam the pipeline depends on. `LlmAnalysisService` is the
//! production backend; tests swap in scripted implementations.
//! All LLM calls go through llm_client; no direct Anthropic calls here.

pub mod prompts;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::files::split_data_uri;
use crate::llm_client::prompts::json_system;
use crate::llm_client::{Attachment, LlmClient, LlmError};
use prompts::{
    PARSE_PROMPT, PARSE_ROLE, RELEVANCY_PROMPT_TEMPLATE, RELEVANCY_ROLE, SPAM_PROMPT_TEMPLATE,
    SPAM_ROLE,
};

/// Text and structure extracted from a resume document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseOutput {
    pub parsed_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_skills: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_experience_summaries: Option<Vec<String>>,
}

/// Spam / fabrication verdict for a resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpamAssessment {
    pub is_spam: bool,
    /// 0.0 – 1.0, confidence that the resume IS spam.
    pub confidence_score: f64,
    pub explanation: String,
}

/// How well a resume matches the job description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevancyAssessment {
    /// 0 – 100
    pub relevancy_score: f64,
    pub matched_skills: Vec<String>,
    pub explanation: String,
}

impl SpamAssessment {
    fn clamped(mut self) -> Self {
        self.confidence_score = self.confidence_score.clamp(0.0, 1.0);
        self
    }
}

impl RelevancyAssessment {
    fn clamped(mut self) -> Self {
        self.relevancy_score = self.relevancy_score.clamp(0.0, 100.0);
        self
    }
}

/// The AI operations the pipeline needs. Each call is atomic from the caller's view.
///
/// Held by the `Session` as `Arc<dyn AnalysisService>`.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// `resume_data_uri` is `data:<mime>;base64,<data>`.
    async fn parse(&self, resume_data_uri: &str) -> Result<ParseOutput, LlmError>;

    async fn detect_spam(
        &self,
        resume_text: &str,
        current_year: i32,
    ) -> Result<SpamAssessment, LlmError>;

    async fn score_relevancy(
        &self,
        job_description: &str,
        resume_text: &str,
    ) -> Result<RelevancyAssessment, LlmError>;
}

/// Analysis backed by Claude.
pub struct LlmAnalysisService(pub LlmClient);

#[async_trait]
impl AnalysisService for LlmAnalysisService {
    async fn parse(&self, resume_data_uri: &str) -> Result<ParseOutput, LlmError> {
        let attachment = attachment_from_data_uri(resume_data_uri)?;
        let output: ParseOutput = self
            .0
            .call_json(PARSE_PROMPT, &json_system(PARSE_ROLE), Some(&attachment))
            .await?;
        debug!("Parsed resume: {} chars", output.parsed_text.len());
        Ok(output)
    }

    async fn detect_spam(
        &self,
        resume_text: &str,
        current_year: i32,
    ) -> Result<SpamAssessment, LlmError> {
        let prompt = SPAM_PROMPT_TEMPLATE
            .replace("{current_year}", &current_year.to_string())
            .replace("{resume_text}", resume_text);
        let assessment: SpamAssessment = self
            .0
            .call_json(&prompt, &json_system(SPAM_ROLE), None)
            .await?;
        Ok(assessment.clamped())
    }

    async fn score_relevancy(
        &self,
        job_description: &str,
        resume_text: &str,
    ) -> Result<RelevancyAssessment, LlmError> {
        let prompt = RELEVANCY_PROMPT_TEMPLATE
            .replace("{job_description}", job_description)
            .replace("{resume_text}", resume_text);
        let assessment: RelevancyAssessment = self
            .0
            .call_json(&prompt, &json_system(RELEVANCY_ROLE), None)
            .await?;
        Ok(assessment.clamped())
    }
}

/// MIME type the Messages API takes as a base64 document block.
const PDF_MIME: &str = "application/pdf";

/// Plain text is decoded and sent as text, PDFs go as base64 documents.
/// Any other type is refused here, before a request is spent on it.
fn attachment_from_data_uri(uri: &str) -> Result<Attachment, LlmError> {
    let (media_type, data) = split_data_uri(uri)
        .ok_or_else(|| LlmError::InvalidInput("resume is not a base64 data URI".to_string()))?;

    match mime_essence(media_type).as_str() {
        "text/plain" => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(data)
                .map_err(|e| LlmError::InvalidInput(format!("invalid base64 payload: {e}")))?;
            Ok(Attachment::PlainText(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))
        }
        PDF_MIME => Ok(Attachment::Base64Document {
            media_type: PDF_MIME.to_string(),
            data: data.to_string(),
        }),
        _ => Err(LlmError::InvalidInput(format!(
            "unsupported resume type {media_type}; upload a PDF or plain text file"
        ))),
    }
}

/// `text/plain; charset=utf-8` -> `text/plain`
fn mime_essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
