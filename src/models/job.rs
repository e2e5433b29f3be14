use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::analysis::MetricsResult;

/// Status of an analysis job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// What stage of the analysis a job failure came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Ingestion,
    Metrics,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
}

impl JobError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Identifying metadata carried through to persistence, never interpreted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobMetadata {
    pub owner_id: String,
    pub subject_id: String,
    pub original_filename: String,
}

/// An analysis job. Snapshots of this are handed out by the registry; the
/// registry is the only place the live record is mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub progress: u8,
    pub metadata: JobMetadata,
    pub result: Option<MetricsResult>,
    pub error: Option<JobError>,
    /// Server-side diagnostic for degraded-but-completed jobs (archival failed).
    pub diagnostic: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: Uuid, metadata: JobMetadata) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Pending,
            progress: 0,
            metadata,
            result: None,
            error: None,
            diagnostic: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Text fields of the multipart submission.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitJobForm {
    #[garde(length(min = 1, max = 128))]
    pub owner_id: String,

    #[garde(length(min = 1, max = 128))]
    pub subject_id: String,

    #[garde(length(min = 1, max = 255))]
    pub original_filename: String,
}

impl From<SubmitJobForm> for JobMetadata {
    fn from(form: SubmitJobForm) -> Self {
        Self {
            owner_id: form.owner_id,
            subject_id: form.subject_id,
            original_filename: form.original_filename,
        }
    }
}

/// Response after submitting a video for analysis.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitJobResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// Response for querying job status.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub result: Option<MetricsResult>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_kind: Option<ErrorKind>,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        let (error, error_kind) = match job.error {
            Some(e) => (Some(e.message), Some(e.kind)),
            None => (None, None),
        };
        Self {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
            result: job.result,
            error,
            error_kind,
        }
    }
}
