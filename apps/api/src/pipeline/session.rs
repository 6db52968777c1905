use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::analysis::AnalysisService;
use crate::files::{SelectedFile, Selection, UploadedFile};
use crate::pipeline::notifications::{Level, NotificationFeed};
use crate::pipeline::store::TaskStore;
use crate::projection::{project, ResultRow, SortConfig, SortKey};
use crate::retry::RetryPolicy;

/// Why a batch (or a selection change) was refused before anything was created.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("Please provide a job description before processing resumes.")]
    MissingJobDescription,

    #[error("Please upload resumes to process.")]
    NoFiles,

    #[error("Could not determine the current year. Please restart the service.")]
    MissingCurrentYear,

    #[error("Resumes are already being processed. Wait for the current batch to finish.")]
    AlreadyProcessing,
}

impl PreconditionError {
    pub fn title(&self) -> &'static str {
        match self {
            PreconditionError::MissingJobDescription => "Job Description Missing",
            PreconditionError::NoFiles => "No Resumes Uploaded",
            PreconditionError::MissingCurrentYear => "System Error",
            PreconditionError::AlreadyProcessing => "Processing In Progress",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PreconditionError::MissingJobDescription => "MISSING_JOB_DESCRIPTION",
            PreconditionError::NoFiles => "NO_FILES",
            PreconditionError::MissingCurrentYear => "MISSING_CURRENT_YEAR",
            PreconditionError::AlreadyProcessing => "ALREADY_PROCESSING",
        }
    }
}

/// Checks the inputs of a batch in the order the user would fix them.
/// Returns the year to use for spam detection.
pub fn check_preconditions(
    job_description: &str,
    file_count: usize,
    current_year: Option<i32>,
) -> Result<i32, PreconditionError> {
    if job_description.trim().is_empty() {
        return Err(PreconditionError::MissingJobDescription);
    }
    if file_count == 0 {
        return Err(PreconditionError::NoFiles);
    }
    current_year.ok_or(PreconditionError::MissingCurrentYear)
}

/// A batch that has been validated and queued but not yet run.
#[must_use = "a started batch must be handed to Session::run_batch"]
#[derive(Debug)]
pub struct Batch {
    pub id: Uuid,
    pub job_description: String,
    pub current_year: i32,
    /// `(task id, file name)` in processing order.
    pub tasks: Vec<(String, String)>,
    _processing: ProcessingGuard,
}

/// Clears the session's processing flag when its batch is dropped, whether it ran or not.
#[derive(Debug)]
struct ProcessingGuard(Arc<AtomicBool>);

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub batch_id: Uuid,
    pub queued: usize,
}

/// The single in-memory workspace: selection, task records, sort and notifications.
pub struct Session {
    pub(crate) analysis: Arc<dyn AnalysisService>,
    pub(crate) policy: RetryPolicy,
    current_year: Option<i32>,
    selection: RwLock<Selection>,
    pub(crate) tasks: TaskStore,
    pub(crate) notifications: NotificationFeed,
    sort: RwLock<Option<SortConfig>>,
    processing: Arc<AtomicBool>,
}

impl Session {
    pub fn new(
        analysis: Arc<dyn AnalysisService>,
        policy: RetryPolicy,
        current_year: Option<i32>,
    ) -> Self {
        Self {
            analysis,
            policy,
            current_year,
            selection: RwLock::new(Selection::default()),
            tasks: TaskStore::default(),
            notifications: NotificationFeed::default(),
            sort: RwLock::new(None),
            processing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn notifications(&self) -> &NotificationFeed {
        &self.notifications
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Adds a file to the selection. Returns false if the name is already selected.
    pub async fn add_file(&self, file: UploadedFile) -> bool {
        self.selection.write().await.add(file)
    }

    pub async fn selected_files(&self) -> Vec<SelectedFile> {
        self.selection.read().await.list()
    }

    /// Drops the file and any result row with its name. Refused while a batch runs.
    pub async fn remove_file(&self, file_name: &str) -> Result<bool, PreconditionError> {
        let mut selection = self.selection.write().await;
        if self.is_processing() {
            return Err(PreconditionError::AlreadyProcessing);
        }
        let removed_file = selection.remove(file_name);
        let removed_rows = self.tasks.remove_by_file_name(file_name).await;
        Ok(removed_file || removed_rows > 0)
    }

    /// Validates the request and queues one task per selected file, replacing the
    /// previous batch. Every violation is also published as a notification.
    pub async fn start_batch(&self, job_description: &str) -> Result<Batch, PreconditionError> {
        // Held until the tasks exist, so a concurrent removal cannot slip in between.
        let selection = self.selection.write().await;

        let checked = if self.is_processing() {
            Err(PreconditionError::AlreadyProcessing)
        } else {
            check_preconditions(job_description, selection.len(), self.current_year)
        };
        let current_year = match checked {
            Ok(year) => year,
            Err(err) => {
                self.notifications
                    .push(Level::Destructive, err.title(), err.to_string());
                return Err(err);
            }
        };
        self.processing.store(true, Ordering::SeqCst);
        let guard = ProcessingGuard(self.processing.clone());

        let created = Utc::now().timestamp_millis();
        let files: Vec<(String, UploadedFile)> = selection
            .snapshot()
            .into_iter()
            .enumerate()
            .map(|(i, file)| (format!("{}-{created}-{i}", file.file_name()), file))
            .collect();
        let names: Vec<String> = files.iter().map(|(_, f)| f.file_name().to_string()).collect();
        let ids = self.tasks.replace_batch(files).await;

        let batch = Batch {
            id: Uuid::new_v4(),
            job_description: job_description.to_string(),
            current_year,
            tasks: ids.into_iter().zip(names).collect(),
            _processing: guard,
        };

        info!(batch_id = %batch.id, "Queued {} resume(s)", batch.tasks.len());
        self.notifications.push(
            Level::Info,
            "Processing Started",
            format!("Analyzing {} resume(s)...", batch.tasks.len()),
        );
        Ok(batch)
    }

    /// Rows of the results table, using `sort` if given, else the session's sort.
    pub async fn results(&self, sort: Option<SortConfig>) -> Vec<ResultRow> {
        let sort = match sort {
            Some(sort) => Some(sort),
            None => self.current_sort().await,
        };
        self.tasks.read(|tasks| project(tasks, sort)).await
    }

    pub async fn current_sort(&self) -> Option<SortConfig> {
        *self.sort.read().await
    }

    /// Applies a column-header click to the session's sort and returns the new config.
    pub async fn request_sort(&self, key: SortKey) -> SortConfig {
        let mut sort = self.sort.write().await;
        let next = SortConfig::request(*sort, key);
        *sort = Some(next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::task::TaskStatus;
    use crate::pipeline::testing::{parsed, relevancy, session_with, spam, ScriptedAnalysis};

    fn file(name: &str) -> UploadedFile {
        UploadedFile::spool(name, None, b"resume").unwrap()
    }

    #[test]
    fn test_preconditions_in_order() {
        assert_eq!(
            check_preconditions("   \n", 0, None),
            Err(PreconditionError::MissingJobDescription)
        );
        assert_eq!(
            check_preconditions("Rust engineer", 0, None),
            Err(PreconditionError::NoFiles)
        );
        assert_eq!(
            check_preconditions("Rust engineer", 2, None),
            Err(PreconditionError::MissingCurrentYear)
        );
        assert_eq!(check_preconditions("Rust engineer", 2, Some(2026)), Ok(2026));
    }

    #[tokio::test]
    async fn test_rejected_batch_creates_no_tasks_and_notifies() {
        let session = session_with(Arc::new(ScriptedAnalysis::default()), None);
        session.add_file(file("a.txt")).await;

        let err = session.start_batch("Rust engineer").await.unwrap_err();
        assert_eq!(err, PreconditionError::MissingCurrentYear);
        assert!(!session.is_processing());
        assert!(session.results(None).await.is_empty());

        let notifications = session.notifications().since(0);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].level, Level::Destructive);
        assert_eq!(notifications[0].title, "System Error");
    }

    #[tokio::test]
    async fn test_start_batch_queues_selection_in_order() {
        let session = session_with(Arc::new(ScriptedAnalysis::default()), Some(2026));
        session.add_file(file("b.txt")).await;
        session.add_file(file("a.txt")).await;

        let batch = session.start_batch("Rust engineer").await.unwrap();
        assert_eq!(batch.current_year, 2026);
        let names: Vec<_> = batch.tasks.iter().map(|(_, name)| name.as_str()).collect();
        assert_eq!(names, vec!["b.txt", "a.txt"]);
        assert!(batch.tasks[0].0.starts_with("b.txt-"));
        assert_ne!(batch.tasks[0].0, batch.tasks[1].0);

        let rows = session.results(None).await;
        assert!(rows.iter().all(|r| r.status == TaskStatus::Queued));
        session.run_batch(batch).await;
    }

    #[tokio::test]
    async fn test_removed_file_is_dropped_from_results_and_next_batch() {
        let analysis = Arc::new(ScriptedAnalysis::default());
        for text in ["a", "b"] {
            analysis.push_parse(Ok(parsed(text)));
            analysis.push_spam(Ok(spam(false, 0.1, "fine")));
            analysis.push_relevancy(Ok(relevancy(60.0, &["Rust"], "ok")));
        }
        let session = session_with(analysis.clone(), Some(2026));
        session.add_file(file("a.txt")).await;
        session.add_file(file("b.txt")).await;
        let batch = session.start_batch("Rust engineer").await.unwrap();
        session.run_batch(batch).await;
        assert_eq!(session.results(None).await.len(), 2);

        assert!(session.remove_file("a.txt").await.unwrap());
        let remaining: Vec<_> = session
            .results(None)
            .await
            .into_iter()
            .map(|r| r.file_name)
            .collect();
        assert_eq!(remaining, vec!["b.txt"]);
        assert!(!session.remove_file("a.txt").await.unwrap());

        let next = session.start_batch("Rust engineer").await.unwrap();
        let names: Vec<_> = next.tasks.iter().map(|(_, name)| name.as_str()).collect();
        assert_eq!(names, vec!["b.txt"]);
    }

    #[tokio::test]
    async fn test_dropped_batch_releases_processing_flag() {
        let session = session_with(Arc::new(ScriptedAnalysis::default()), Some(2026));
        session.add_file(file("a.txt")).await;

        let batch = session.start_batch("Rust engineer").await.unwrap();
        assert!(session.is_processing());
        drop(batch);
        assert!(!session.is_processing());

        assert!(session.remove_file("a.txt").await.unwrap());
        session.add_file(file("b.txt")).await;
        let next = session.start_batch("Rust engineer").await.unwrap();
        assert_eq!(next.tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_request_sort_is_remembered() {
        let session = session_with(Arc::new(ScriptedAnalysis::default()), Some(2026));
        let first = session.request_sort(SortKey::FileName).await;
        let second = session.request_sort(SortKey::FileName).await;
        assert_eq!(first.direction, crate::projection::SortDirection::Ascending);
        assert_eq!(second.direction, crate::projection::SortDirection::Descending);
    }
}
