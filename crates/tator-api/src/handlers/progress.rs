//! Progress ingress: workers post lifecycle updates here and the
//! producer fans them out to subscribers.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use tracing::debug;
use validator::Validate;

use tator_core::error::AppError;
use tator_core::types::ProjectId;
use tator_entity::progress::{ProgressHeader, ProgressState};

use crate::dto::request::{ProgressUpdate, SummaryUpdate};
use crate::dto::response::{ApiResponse, ProgressAccepted};
use crate::error::ApiResult;
use crate::extractors::{ValidatedJson, validation_error};
use crate::state::AppState;

/// POST /api/progress/{project_id}
///
/// The whole batch is validated before anything is broadcast.
pub async fn post_progress(
    State(state): State<AppState>,
    Path(project_id): Path<ProjectId>,
    payload: Result<Json<Vec<ProgressUpdate>>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<ProgressAccepted>>> {
    let Json(batch) = payload.map_err(|r| AppError::validation(r.body_text()))?;
    for (index, update) in batch.iter().enumerate() {
        update.validate().map_err(|e| {
            let err = validation_error(e);
            AppError::validation(format!("message {index}: {}", err.message))
        })?;
    }

    for update in &batch {
        let producer = state.realtime.producer(update.header(project_id));
        match update.state {
            ProgressState::Queued => producer.queued(&update.message).await?,
            ProgressState::Started => {
                producer
                    .progress(&update.message, update.progress.unwrap_or(0))
                    .await?
            }
            ProgressState::Failed => producer.failed(&update.message).await?,
            ProgressState::Finished => {
                producer
                    .finished(&update.message, update.auxiliary())
                    .await?
            }
        }
    }

    debug!(project_id = %project_id, count = batch.len(), "Applied progress batch");
    Ok(Json(ApiResponse::ok(ProgressAccepted {
        accepted: batch.len(),
    })))
}

/// POST /api/progress-summary/{project_id}
pub async fn post_summary(
    State(state): State<AppState>,
    Path(project_id): Path<ProjectId>,
    ValidatedJson(update): ValidatedJson<SummaryUpdate>,
) -> ApiResult<Json<ApiResponse<ProgressAccepted>>> {
    let mut group_header = serde_json::Map::new();
    if let Some(name) = &update.name {
        group_header.insert("name".to_string(), name.clone().into());
    }
    let header = ProgressHeader {
        job_type: update.job_type,
        project_id,
        gid: update.gid.clone(),
        uid: update.gid.clone(),
        name: update.name.clone().unwrap_or_default(),
        user: None,
        swid: None,
        extra: serde_json::Map::new(),
    };

    state
        .realtime
        .producer(header)
        .with_group_header(group_header)
        .summary(update.num_jobs, update.num_complete)
        .await?;

    Ok(Json(ApiResponse::ok(ProgressAccepted { accepted: 1 })))
}
