use std::path::{Path, PathBuf};

use axum::extract::{Multipart, Path as UrlPath, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::analysis::AnalysisRecord;
use crate::models::job::{JobStatus, JobStatusResponse, SubmitJobForm, SubmitJobResponse};
use crate::services::storage::sanitize_filename;

/// Uploaded video saved to disk, plus its client-side name.
struct StagedVideo {
    path: PathBuf,
    original_filename: String,
}

/// POST /api/jobs: Upload a video and start an analysis job.
///
/// Multipart fields: `file` (the video), `owner_id` (or `user_id`),
/// `subject_id` (or `dog_id`). Responds `202` as soon as the job is scheduled.
pub async fn submit_job(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitJobResponse>), ApiError> {
    let mut owner_id = None;
    let mut subject_id = None;
    let mut video: Option<StagedVideo> = None;

    let parsed: Result<(), ApiError> = async {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?
        {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("file") => {
                    if let Some(content_type) = field.content_type() {
                        if !is_video_content_type(content_type) {
                            return Err(ApiError::UnsupportedMedia(content_type.to_string()));
                        }
                    }
                    let original_filename = field.file_name().unwrap_or("video.mp4").to_string();
                    let path = state.upload_dir.join(format!(
                        "{}_{}",
                        Uuid::new_v4(),
                        sanitize_filename(&original_filename)
                    ));
                    // Registered before writing so a failed write is cleaned up too
                    video = Some(StagedVideo {
                        path: path.clone(),
                        original_filename,
                    });
                    stage_field(field, &path).await?;
                }
                Some("owner_id") | Some("user_id") => {
                    owner_id = Some(text(field).await?);
                }
                Some("subject_id") | Some("dog_id") => {
                    subject_id = Some(text(field).await?);
                }
                _ => {}
            }
        }
        Ok::<(), ApiError>(())
    }
    .await;

    let submission = parsed.and_then(|()| {
        let staged = video
            .as_ref()
            .ok_or_else(|| ApiError::BadRequest("missing video file".to_string()))?;
        let form = SubmitJobForm {
            owner_id: owner_id.unwrap_or_default(),
            subject_id: subject_id.unwrap_or_default(),
            original_filename: staged.original_filename.clone(),
        };
        form.validate()?;
        Ok(form)
    });

    let form = match submission {
        Ok(form) => form,
        Err(e) => {
            if let Some(staged) = &video {
                discard(&staged.path).await;
            }
            return Err(e);
        }
    };

    // `submission` succeeded, so a video was staged.
    let staged = video.ok_or_else(|| ApiError::Internal("staged video vanished".to_string()))?;
    let subject_id = form.subject_id.clone();
    let job_id = state.executor.submit(form.into(), staged.path);

    tracing::info!(job_id = %job_id, subject_id = %subject_id, "Analysis job submitted");

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitJobResponse {
            job_id,
            status: JobStatus::Pending,
        }),
    ))
}

/// GET /api/jobs/{job_id}: Check analysis job status.
pub async fn get_job_status(
    State(state): State<AppState>,
    UrlPath(job_id): UrlPath<Uuid>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let job = state.registry().get(job_id)?;
    Ok(Json(job.into()))
}

/// GET /api/subjects/{subject_id}/analyses: Archived analyses, newest first.
pub async fn list_subject_analyses(
    State(state): State<AppState>,
    UrlPath(subject_id): UrlPath<String>,
) -> Result<Json<Vec<AnalysisRecord>>, ApiError> {
    let records = state.executor.archive().list_records(&subject_id).await?;
    Ok(Json(records))
}

fn is_video_content_type(content_type: &str) -> bool {
    content_type.starts_with("video/") || content_type == "application/octet-stream"
}

async fn text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    let value = field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(value.trim().to_string())
}

/// Stream a multipart field to `path`. An empty upload is rejected.
async fn stage_field(
    mut field: axum::extract::multipart::Field<'_>,
    path: &Path,
) -> Result<(), ApiError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to stage upload: {e}")))?;

    let mut written = 0usize;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| ApiError::Internal(format!("failed to stage upload: {e}")))?;
        written += chunk.len();
    }
    file.flush()
        .await
        .map_err(|e| ApiError::Internal(format!("failed to stage upload: {e}")))?;

    if written == 0 {
        return Err(ApiError::BadRequest("video file is empty".to_string()));
    }
    Ok(())
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to discard staged upload");
        }
    }
}
