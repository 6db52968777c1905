//! Axum route handlers for the selection, batch, results and notification endpoints.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::files::{has_accepted_extension, SelectedFile, UploadedFile};
use crate::pipeline::notifications::Notification;
use crate::pipeline::session::BatchSummary;
use crate::projection::{ResultRow, SortConfig, SortDirection, SortKey};
use crate::state::AppState;

/// Multipart field carrying resume files.
const FILES_FIELD: &str = "files";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub added: Vec<String>,
    /// Names already in the selection; those uploads were dropped.
    pub skipped: Vec<String>,
    pub files: Vec<SelectedFile>,
}

#[derive(Debug, Deserialize)]
pub struct StartBatchRequest {
    pub job_description: String,
}

#[derive(Debug, Serialize)]
pub struct StartBatchResponse {
    #[serde(flatten)]
    pub batch: BatchSummary,
    pub results: Vec<ResultRow>,
}

#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    pub sort: Option<SortKey>,
    pub direction: Option<SortDirection>,
}

#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    pub processing: bool,
    pub sort: Option<SortConfig>,
    pub results: Vec<ResultRow>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationsQuery {
    #[serde(default)]
    pub since: u64,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/files
pub async fn handle_list_files(State(state): State<AppState>) -> Json<Vec<SelectedFile>> {
    Json(state.session.selected_files().await)
}

/// POST /api/v1/files
///
/// Multipart upload; every `files` part becomes one selected resume.
pub async fn handle_upload_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut added = Vec::new();
    let mut skipped = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| AppError::Validation("every uploaded file needs a name".to_string()))?;
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;

        if !has_accepted_extension(&file_name) {
            warn!("Accepting {file_name} although it is not a PDF, DOC, DOCX or TXT file");
        }

        let spool_name = file_name.clone();
        let file = tokio::task::spawn_blocking(move || {
            UploadedFile::spool(&spool_name, content_type.as_deref(), &bytes)
        })
        .await
        .map_err(|e| AppError::Internal(e.into()))??;

        if state.session.add_file(file).await {
            added.push(file_name);
        } else {
            skipped.push(file_name);
        }
    }

    info!("Upload: {} added, {} skipped", added.len(), skipped.len());
    Ok(Json(UploadResponse {
        added,
        skipped,
        files: state.session.selected_files().await,
    }))
}

/// DELETE /api/v1/files/:file_name
///
/// Removes the file and any result row with the same name.
pub async fn handle_remove_file(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.session.remove_file(&file_name).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("File {file_name} is not selected")))
    }
}

/// POST /api/v1/batches
///
/// Queues every selected file and processes them in the background, one at a time.
pub async fn handle_start_batch(
    State(state): State<AppState>,
    Json(request): Json<StartBatchRequest>,
) -> Result<(StatusCode, Json<StartBatchResponse>), AppError> {
    let batch = state.session.start_batch(&request.job_description).await?;
    let summary = BatchSummary {
        batch_id: batch.id,
        queued: batch.tasks.len(),
    };

    let session = state.session.clone();
    tokio::spawn(async move { session.run_batch(batch).await });

    Ok((
        StatusCode::ACCEPTED,
        Json(StartBatchResponse {
            batch: summary,
            results: state.session.results(None).await,
        }),
    ))
}

/// GET /api/v1/results
///
/// `sort` (+ optional `direction`) overrides the session's sort for this request only.
pub async fn handle_get_results(
    State(state): State<AppState>,
    Query(query): Query<ResultsQuery>,
) -> Json<ResultsResponse> {
    let override_sort = query.sort.map(|key| SortConfig {
        key,
        direction: query.direction.unwrap_or_default(),
    });
    Json(results_response(&state, override_sort).await)
}

/// POST /api/v1/results/sort/:key
///
/// Column-header click: same key toggles direction, a new key sorts ascending.
pub async fn handle_request_sort(
    State(state): State<AppState>,
    Path(key): Path<SortKey>,
) -> Json<ResultsResponse> {
    let sort = state.session.request_sort(key).await;
    Json(results_response(&state, Some(sort)).await)
}

/// GET /api/v1/notifications?since=<seq>
pub async fn handle_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationsQuery>,
) -> Json<Vec<Notification>> {
    Json(state.session.notifications().since(query.since))
}

async fn results_response(state: &AppState, sort: Option<SortConfig>) -> ResultsResponse {
    ResultsResponse {
        processing: state.session.is_processing(),
        sort: match sort {
            Some(sort) => Some(sort),
            None => state.session.current_sort().await,
        },
        results: state.session.results(sort).await,
    }
}
