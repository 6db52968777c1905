//! Scripted `AnalysisService` and fixtures shared by the pipeline and route tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::analysis::{AnalysisService, ParseOutput, RelevancyAssessment, SpamAssessment};
use crate::llm_client::LlmError;
use crate::pipeline::session::Session;
use crate::retry::RetryPolicy;

type Script<T> = Mutex<VecDeque<Result<T, LlmError>>>;

/// Answers each operation from its own queue, in order, and records every call.
/// An exhausted queue answers with a 500.
#[derive(Default)]
pub struct ScriptedAnalysis {
    parse: Script<ParseOutput>,
    spam: Script<SpamAssessment>,
    relevancy: Script<RelevancyAssessment>,
    spam_delay: Duration,
    relevancy_delay: Duration,
    calls: Mutex<Vec<String>>,
}

impl ScriptedAnalysis {
    pub fn with_scoring_delays(spam_delay: Duration, relevancy_delay: Duration) -> Self {
        Self {
            spam_delay,
            relevancy_delay,
            ..Self::default()
        }
    }

    pub fn push_parse(&self, result: Result<ParseOutput, LlmError>) {
        self.parse.lock().unwrap().push_back(result);
    }

    pub fn push_spam(&self, result: Result<SpamAssessment, LlmError>) {
        self.spam.lock().unwrap().push_back(result);
    }

    pub fn push_relevancy(&self, result: Result<RelevancyAssessment, LlmError>) {
        self.relevancy.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn next<T>(&self, script: &Script<T>, call: String) -> Result<T, LlmError> {
        self.calls.lock().unwrap().push(call);
        script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(api_error(500, "unscripted call")))
    }
}

#[async_trait]
impl AnalysisService for ScriptedAnalysis {
    async fn parse(&self, resume_data_uri: &str) -> Result<ParseOutput, LlmError> {
        self.next(&self.parse, format!("parse:{resume_data_uri}"))
    }

    async fn detect_spam(
        &self,
        _resume_text: &str,
        current_year: i32,
    ) -> Result<SpamAssessment, LlmError> {
        let result = self.next(&self.spam, format!("spam:{current_year}"));
        tokio::time::sleep(self.spam_delay).await;
        result
    }

    async fn score_relevancy(
        &self,
        job_description: &str,
        _resume_text: &str,
    ) -> Result<RelevancyAssessment, LlmError> {
        let result = self.next(&self.relevancy, format!("relevancy:{job_description}"));
        tokio::time::sleep(self.relevancy_delay).await;
        result
    }
}

pub fn session_with(analysis: Arc<ScriptedAnalysis>, current_year: Option<i32>) -> Session {
    Session::new(analysis, RetryPolicy::default(), current_year)
}

pub fn api_error(status: u16, message: &str) -> LlmError {
    LlmError::Api {
        status,
        message: message.to_string(),
    }
}

pub fn overloaded() -> LlmError {
    api_error(503, "503 Service Unavailable")
}

pub fn parsed(text: &str) -> ParseOutput {
    ParseOutput {
        parsed_text: text.to_string(),
        extracted_skills: None,
        extracted_experience_summaries: None,
    }
}

pub fn spam(is_spam: bool, confidence_score: f64, explanation: &str) -> SpamAssessment {
    SpamAssessment {
        is_spam,
        confidence_score,
        explanation: explanation.to_string(),
    }
}

pub fn relevancy(score: f64, skills: &[&str], explanation: &str) -> RelevancyAssessment {
    RelevancyAssessment {
        relevancy_score: score,
        matched_skills: skills.iter().map(|s| s.to_string()).collect(),
        explanation: explanation.to_string(),
    }
}
