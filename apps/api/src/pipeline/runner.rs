//! Batch runner: drives each task through parse → (spam ∥ relevancy), one task at a time.

use std::future::Future;

use thiserror::Error;
use tracing::{error, info};

use crate::files::{read_as_data_uri, FileReadError};
use crate::llm_client::LlmError;
use crate::pipeline::notifications::Level;
use crate::pipeline::session::{Batch, Session};
use crate::pipeline::task::TransitionError;
use crate::retry::{self, CallContext, RetryError};

const OP_PARSE: &str = "Parsing Resume";
const OP_SPAM: &str = "Spam Detection";
const OP_RELEVANCY: &str = "Relevancy Scoring";

/// Stored on the task instead of the raw error when the AI service was overloaded.
pub const OVERLOADED_MESSAGE: &str = "AI service temporarily overloaded. Please try again later.";
const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred";

#[derive(Debug, Error)]
enum TaskError {
    #[error(transparent)]
    FileRead(#[from] FileReadError),

    #[error(transparent)]
    Call(#[from] RetryError<LlmError>),

    #[error("Resume parsing returned no text.")]
    EmptyParse,

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl TaskError {
    fn is_overloaded(&self) -> bool {
        match self {
            TaskError::Call(e) => e.is_exhausted() || e.last_error().is_overloaded(),
            _ => false,
        }
    }

    /// The message stored on the failed task.
    fn task_message(&self) -> String {
        if self.is_overloaded() {
            return OVERLOADED_MESSAGE.to_string();
        }
        let message = self.to_string();
        if message.trim().is_empty() {
            UNKNOWN_ERROR_MESSAGE.to_string()
        } else {
            message
        }
    }
}

impl Session {
    /// Processes every task of the batch in order. Task failures are recorded on the
    /// task and never stop the batch. The processing flag clears when `batch` drops.
    pub async fn run_batch(&self, batch: Batch) {
        info!(batch_id = %batch.id, "Processing {} resume(s)", batch.tasks.len());

        for (task_id, file_name) in &batch.tasks {
            self.process_task(&batch, task_id, file_name).await;
        }

        info!(batch_id = %batch.id, "Batch finished");
    }

    async fn process_task(&self, batch: &Batch, task_id: &str, file_name: &str) {
        match self.analyze(batch, task_id, file_name).await {
            Ok(()) => {
                info!(task_id, "Resume processed: {file_name}");
                self.notifications.push(
                    Level::Info,
                    "Resume Processed",
                    format!("{file_name} analyzed successfully."),
                );
            }
            Err(err) => {
                error!(task_id, "Error processing {file_name}: {err}");
                let overloaded = err.is_overloaded();
                if let Err(e) = self.tasks.fail(task_id, err.task_message()).await {
                    error!(task_id, "Could not record failure: {e}");
                }
                let (title, description) = if overloaded {
                    (
                        "API Service Overload",
                        format!(
                            "The AI service is temporarily overloaded. Please try again later for {file_name}."
                        ),
                    )
                } else {
                    ("Processing Error", err.task_message())
                };
                self.notifications
                    .push(Level::Destructive, title, description);
            }
        }
    }

    async fn analyze(&self, batch: &Batch, task_id: &str, file_name: &str) -> Result<(), TaskError> {
        let file = self.tasks.begin_parsing(task_id).await?;
        let data_uri = read_as_data_uri(&file).await?;
        // The upload is not needed past this point.
        drop(file);

        let parsed = self
            .call(file_name, OP_PARSE, || self.analysis.parse(&data_uri))
            .await?;
        let resume_text = parsed.parsed_text.clone();
        self.tasks.finish_parsing(task_id, parsed).await?;

        if resume_text.trim().is_empty() {
            return Err(TaskError::EmptyParse);
        }

        let (spam, relevancy) = tokio::try_join!(
            self.call(file_name, OP_SPAM, || {
                self.analysis.detect_spam(&resume_text, batch.current_year)
            }),
            self.call(file_name, OP_RELEVANCY, || {
                self.analysis
                    .score_relevancy(&batch.job_description, &resume_text)
            }),
        )?;

        self.tasks.complete(task_id, spam, relevancy).await?;
        Ok(())
    }

    /// One AI call with overload retry; each retry is announced in the notification feed.
    async fn call<T, Op, Fut>(
        &self,
        subject: &str,
        operation: &str,
        op: Op,
    ) -> Result<T, RetryError<LlmError>>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        retry::invoke(
            &self.policy,
            CallContext { subject, operation },
            LlmError::is_overloaded,
            |notice| {
                self.notifications.push(
                    Level::Warning,
                    format!("API Overload: {} ({})", notice.operation, notice.subject),
                    notice.to_string(),
                );
            },
            op,
        )
        .await
    }
}
