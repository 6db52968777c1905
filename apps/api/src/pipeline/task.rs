//! ResumeTask: one uploaded resume moving through the processing state machine.
//!
//! ```text
//! queued ──► parsing ──► analyzing ──► completed
//!               │            │
//!               └──► error ◄─┘
//! ```
//!
//! The state enum carries exactly the data each status allows, so a completed task
//! always has both assessments and only an errored task has a message.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::{ParseOutput, RelevancyAssessment, SpamAssessment};
use crate::files::UploadedFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Parsing,
    Analyzing,
    Completed,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Parsing => "parsing",
            TaskStatus::Analyzing => "analyzing",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("Unknown task {0}")]
    UnknownTask(String),

    #[error("Task {task_id} cannot move from {from} to {to}")]
    Invalid {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },
}

/// One applied transition. `seq` is ordered across every task in the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange {
    pub status: TaskStatus,
    pub seq: u64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
enum TaskState {
    /// Holds the upload until parsing takes it.
    Queued { file: UploadedFile },
    Parsing,
    Analyzing {
        parse: ParseOutput,
    },
    Completed {
        parse: ParseOutput,
        spam: SpamAssessment,
        relevancy: RelevancyAssessment,
    },
    Error {
        parse: Option<ParseOutput>,
        message: String,
    },
}

impl TaskState {
    fn status(&self) -> TaskStatus {
        match self {
            TaskState::Queued { .. } => TaskStatus::Queued,
            TaskState::Parsing => TaskStatus::Parsing,
            TaskState::Analyzing { .. } => TaskStatus::Analyzing,
            TaskState::Completed { .. } => TaskStatus::Completed,
            TaskState::Error { .. } => TaskStatus::Error,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResumeTask {
    id: String,
    file_name: String,
    state: TaskState,
    history: Vec<StatusChange>,
}

impl ResumeTask {
    pub fn new(id: String, file: UploadedFile, seq: u64) -> Self {
        Self {
            id,
            file_name: file.file_name().to_string(),
            state: TaskState::Queued { file },
            history: vec![StatusChange {
                status: TaskStatus::Queued,
                seq,
                at: Utc::now(),
            }],
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn status(&self) -> TaskStatus {
        self.state.status()
    }

    pub fn history(&self) -> &[StatusChange] {
        &self.history
    }

    pub fn parse_output(&self) -> Option<&ParseOutput> {
        match &self.state {
            TaskState::Analyzing { parse } | TaskState::Completed { parse, .. } => Some(parse),
            TaskState::Error { parse, .. } => parse.as_ref(),
            TaskState::Queued { .. } | TaskState::Parsing => None,
        }
    }

    pub fn spam(&self) -> Option<&SpamAssessment> {
        match &self.state {
            TaskState::Completed { spam, .. } => Some(spam),
            _ => None,
        }
    }

    pub fn relevancy(&self) -> Option<&RelevancyAssessment> {
        match &self.state {
            TaskState::Completed { relevancy, .. } => Some(relevancy),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            TaskState::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    /// queued → parsing. Hands the upload over to the caller.
    pub fn begin_parsing(&mut self, seq: u64) -> Result<UploadedFile, TransitionError> {
        match std::mem::replace(&mut self.state, TaskState::Parsing) {
            TaskState::Queued { file } => {
                self.record(seq);
                Ok(file)
            }
            other => Err(self.reject(other, TaskStatus::Parsing)),
        }
    }

    /// parsing → analyzing.
    pub fn finish_parsing(&mut self, parse: ParseOutput, seq: u64) -> Result<(), TransitionError> {
        match std::mem::replace(&mut self.state, TaskState::Parsing) {
            TaskState::Parsing => {
                self.state = TaskState::Analyzing { parse };
                self.record(seq);
                Ok(())
            }
            other => Err(self.reject(other, TaskStatus::Analyzing)),
        }
    }

    /// analyzing → completed. Both assessments land in the same transition.
    pub fn complete(
        &mut self,
        spam: SpamAssessment,
        relevancy: RelevancyAssessment,
        seq: u64,
    ) -> Result<(), TransitionError> {
        match std::mem::replace(&mut self.state, TaskState::Parsing) {
            TaskState::Analyzing { parse } => {
                self.state = TaskState::Completed {
                    parse,
                    spam,
                    relevancy,
                };
                self.record(seq);
                Ok(())
            }
            other => Err(self.reject(other, TaskStatus::Completed)),
        }
    }

    /// parsing | analyzing → error. Keeps the parse output if there was one.
    pub fn fail(&mut self, message: String, seq: u64) -> Result<(), TransitionError> {
        match std::mem::replace(&mut self.state, TaskState::Parsing) {
            TaskState::Parsing => {
                self.state = TaskState::Error {
                    parse: None,
                    message,
                };
                self.record(seq);
                Ok(())
            }
            TaskState::Analyzing { parse } => {
                self.state = TaskState::Error {
                    parse: Some(parse),
                    message,
                };
                self.record(seq);
                Ok(())
            }
            other => Err(self.reject(other, TaskStatus::Error)),
        }
    }

    fn record(&mut self, seq: u64) {
        self.history.push(StatusChange {
            status: self.state.status(),
            seq,
            at: Utc::now(),
        });
    }

    /// Puts the untouched state back and describes the refused move.
    fn reject(&mut self, previous: TaskState, to: TaskStatus) -> TransitionError {
        let from = previous.status();
        self.state = previous;
        TransitionError::Invalid {
            task_id: self.id.clone(),
            from,
            to,
        }
    }
}
