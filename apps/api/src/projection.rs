//! Results projection: the sorted, read-only table view of the current batch.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::analysis::{ParseOutput, RelevancyAssessment, SpamAssessment};
use crate::pipeline::task::{ResumeTask, StatusChange, TaskStatus};

/// Matched skills shown inline; the rest are counted and available in full.
pub const SKILLS_PREVIEW_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    FileName,
    RelevancyScore,
    IsSpam,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortConfig {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortConfig {
    /// Column-header click: the same key flips direction, a new key starts ascending.
    pub fn request(current: Option<SortConfig>, key: SortKey) -> SortConfig {
        match current {
            Some(cfg) if cfg.key == key => SortConfig {
                key,
                direction: match cfg.direction {
                    SortDirection::Ascending => SortDirection::Descending,
                    SortDirection::Descending => SortDirection::Ascending,
                },
            },
            _ => SortConfig {
                key,
                direction: SortDirection::Ascending,
            },
        }
    }
}

/// One row of the results table.
#[derive(Debug, Clone, Serialize)]
pub struct ResultRow {
    pub id: String,
    pub file_name: String,
    pub status: TaskStatus,
    pub parse_output: Option<ParseOutput>,
    pub relevancy: Option<RelevancyAssessment>,
    pub spam: Option<SpamAssessment>,
    pub error_message: Option<String>,
    /// First few matched skills, for the inline cell.
    pub matched_skills_preview: Vec<String>,
    /// How many matched skills the preview leaves out.
    pub hidden_skill_count: usize,
    pub status_history: Vec<StatusChange>,
}

impl From<&ResumeTask> for ResultRow {
    fn from(task: &ResumeTask) -> Self {
        let matched = task
            .relevancy()
            .map(|r| r.matched_skills.as_slice())
            .unwrap_or_default();
        Self {
            id: task.id().to_string(),
            file_name: task.file_name().to_string(),
            status: task.status(),
            parse_output: task.parse_output().cloned(),
            relevancy: task.relevancy().cloned(),
            spam: task.spam().cloned(),
            error_message: task.error_message().map(str::to_string),
            matched_skills_preview: matched.iter().take(SKILLS_PREVIEW_LEN).cloned().collect(),
            hidden_skill_count: matched.len().saturating_sub(SKILLS_PREVIEW_LEN),
            status_history: task.history().to_vec(),
        }
    }
}

/// Builds the table rows, sorted when a sort is given. Never touches the tasks.
///
/// Sorting is stable. Tasks without a value for the sort key always come last,
/// whichever the direction; the direction only orders the tasks that have one.
pub fn project(tasks: &[ResumeTask], sort: Option<SortConfig>) -> Vec<ResultRow> {
    let mut ordered: Vec<&ResumeTask> = tasks.iter().collect();
    if let Some(cfg) = sort {
        ordered.sort_by(|a, b| compare(a, b, cfg));
    }
    ordered.into_iter().map(ResultRow::from).collect()
}

fn compare(a: &ResumeTask, b: &ResumeTask, cfg: SortConfig) -> Ordering {
    match cfg.key {
        SortKey::FileName => cfg.direction.apply(
            a.file_name()
                .to_lowercase()
                .cmp(&b.file_name().to_lowercase()),
        ),
        SortKey::RelevancyScore => missing_last(
            a.relevancy().map(|r| r.relevancy_score),
            b.relevancy().map(|r| r.relevancy_score),
            |x, y| x.total_cmp(y),
            cfg.direction,
        ),
        SortKey::IsSpam => missing_last(
            a.spam().map(|s| s.is_spam),
            b.spam().map(|s| s.is_spam),
            |x, y| x.cmp(y),
            cfg.direction,
        ),
    }
}

fn missing_last<T>(
    a: Option<T>,
    b: Option<T>,
    cmp: impl Fn(&T, &T) -> Ordering,
    direction: SortDirection,
) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => direction.apply(cmp(&x, &y)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
