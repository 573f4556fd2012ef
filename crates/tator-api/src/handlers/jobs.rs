//! Job table endpoints.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use tracing::info;

use tator_core::error::AppError;
use tator_core::types::JobId;
use tator_entity::job::Job;

use crate::dto::request::{ClaimRequest, CreateJobRequest, JobQuery};
use crate::dto::response::ApiResponse;
use crate::error::ApiResult;
use crate::extractors::ValidatedJson;
use crate::state::AppState;

/// POST /api/jobs
pub async fn create_job(
    State(state): State<AppState>,
    payload: Result<Json<CreateJobRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Job>>)> {
    let Json(req) = payload.map_err(|r| AppError::validation(r.body_text()))?;
    let job = state.jobs.create(&req.into()).await?;
    info!(job_id = %job.id, channel = %job.channel, "Job enqueued");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(job))))
}

/// GET /api/jobs?channel=&status=
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobQuery>,
) -> ApiResult<Json<ApiResponse<Vec<Job>>>> {
    let jobs = state.jobs.list(query.channel, query.status).await?;
    Ok(Json(ApiResponse::ok(jobs)))
}

/// GET /api/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> ApiResult<Json<ApiResponse<Job>>> {
    let job = find(&state, id).await?;
    Ok(Json(ApiResponse::ok(job)))
}

/// POST /api/jobs/{id}/claim
pub async fn claim_job(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
    ValidatedJson(req): ValidatedJson<ClaimRequest>,
) -> ApiResult<Json<ApiResponse<Job>>> {
    find(&state, id).await?;
    if !state.jobs.claim(id, &req.pod_name, Utc::now()).await? {
        return Err(AppError::conflict(format!("Job {id} has not been dispatched")).into());
    }
    info!(job_id = %id, pod = %req.pod_name, "Job claimed");
    let job = find(&state, id).await?;
    Ok(Json(ApiResponse::ok(job)))
}

/// DELETE /api/jobs/{id}
pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> ApiResult<StatusCode> {
    if !state.jobs.delete(id).await? {
        return Err(AppError::not_found(format!("Job {id} not found")).into());
    }
    info!(job_id = %id, "Job deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn find(state: &AppState, id: JobId) -> ApiResult<Job> {
    state
        .jobs
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Job {id} not found")).into())
}
