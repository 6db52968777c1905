/// LLM Client: the single point of entry for all Claude API calls in ResumeFlow.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// All LLM interactions MUST go through this module.
///
/// Each call is a single attempt. Retrying is the caller's decision (see `crate::retry`),
/// so the client only reports whether a failure looks like a transient overload.
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all LLM calls in ResumeFlow.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 4096;

/// HTTP status the service answers with when it is temporarily unable to serve.
const STATUS_SERVICE_UNAVAILABLE: u16 = 503;
/// Anthropic-specific status for `overloaded_error`.
const STATUS_OVERLOADED: u16 = 529;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl LlmError {
    /// True when the service reported it is temporarily overloaded (503 / 529).
    /// These are the only failures worth retrying.
    pub fn is_overloaded(&self) -> bool {
        matches!(
            self,
            LlmError::Api { status, .. }
                if *status == STATUS_SERVICE_UNAVAILABLE || *status == STATUS_OVERLOADED
        )
    }
}

/// Non-text input sent alongside the prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum Attachment {
    /// Base64 payload with its MIME type, sent as a document block.
    Base64Document { media_type: String, data: String },
    /// Already-decoded plain text, sent as a text document block.
    PlainText(String),
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: Vec<RequestBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RequestBlock<'a> {
    Text { text: &'a str },
    Document { source: DocumentSource<'a> },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DocumentSource<'a> {
    Base64 { media_type: &'a str, data: &'a str },
    Text { media_type: &'a str, data: &'a str },
}

impl<'a> From<&'a Attachment> for RequestBlock<'a> {
    fn from(attachment: &'a Attachment) -> Self {
        let source = match attachment {
            Attachment::Base64Document { media_type, data } => DocumentSource::Base64 {
                media_type,
                data,
            },
            Attachment::PlainText(text) => DocumentSource::Text {
                media_type: "text/plain",
                data: text,
            },
        };
        RequestBlock::Document { source }
    }
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// The single LLM client used by all services in ResumeFlow.
/// Wraps the Anthropic Messages API with structured output helpers.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()?,
            api_key,
        })
    }

    /// Makes one call to the Claude API, returning the full response object.
    pub async fn call(
        &self,
        prompt: &str,
        system: &str,
        attachment: Option<&Attachment>,
    ) -> Result<LlmResponse, LlmError> {
        let mut content: Vec<RequestBlock<'_>> = attachment.into_iter().map(Into::into).collect();
        content.push(RequestBlock::Text { text: prompt });

        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content,
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("LLM API returned {}: {}", status, body);
            // Try to parse error message
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: format!("{status}: {message}"),
            });
        }

        let llm_response: LlmResponse = response.json().await?;

        debug!(
            "LLM call succeeded: input_tokens={}, output_tokens={}",
            llm_response.usage.input_tokens, llm_response.usage.output_tokens
        );

        Ok(llm_response)
    }

    /// Convenience method that calls the LLM and deserializes the text response as JSON.
    /// The prompt must instruct the model to return valid JSON.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        system: &str,
        attachment: Option<&Attachment>,
    ) -> Result<T, LlmError> {
        let response = self.call(prompt, system, attachment).await?;

        let text = response.text().ok_or(LlmError::EmptyContent)?;

        // Strip markdown code fences if the model wraps JSON in them
        let text = strip_json_fences(text);

        serde_json::from_str(text).map_err(LlmError::Parse)
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_overload_statuses_are_transient() {
        for status in [503, 529] {
            let err = LlmError::Api {
                status,
                message: "busy".to_string(),
            };
            assert!(err.is_overloaded(), "status {status} should be transient");
        }
    }

    #[test]
    fn test_other_failures_are_not_transient() {
        let err = LlmError::Api {
            status: 400,
            message: "bad request".to_string(),
        };
        assert!(!err.is_overloaded());
        assert!(!LlmError::EmptyContent.is_overloaded());
    }

    #[test]
    fn test_pdf_attachment_serializes_as_base64_document() {
        let attachment = Attachment::Base64Document {
            media_type: "application/pdf".to_string(),
            data: "JVBERi0=".to_string(),
        };
        let block = RequestBlock::from(&attachment);
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "document");
        assert_eq!(json["source"]["type"], "base64");
        assert_eq!(json["source"]["media_type"], "application/pdf");
        assert_eq!(json["source"]["data"], "JVBERi0=");
    }

    #[test]
    fn test_plain_text_attachment_serializes_as_text_document() {
        let attachment = Attachment::PlainText("5 years Go".to_string());
        let json = serde_json::to_value(RequestBlock::from(&attachment)).unwrap();
        assert_eq!(json["source"]["type"], "text");
        assert_eq!(json["source"]["media_type"], "text/plain");
        assert_eq!(json["source"]["data"], "5 years Go");
    }
}
