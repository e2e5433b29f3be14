//! In-process job registry and lifecycle state machine.
//!
//! `pending -> processing -> {completed, failed}`. Terminal records are never
//! mutated again. Every mutation runs under the entry's write guard, and
//! readers clone a snapshot under the read guard, so a reader can never see a
//! status whose implied field (`result` / `error`) is not yet set.

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::analysis::MetricsResult;
use crate::models::job::{Job, JobError, JobMetadata, JobStatus};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("job {id} cannot go from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },
}

/// Concurrency-safe map of job id to job record.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<Uuid, Job>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh `pending` job and return its id.
    pub fn create(&self, metadata: JobMetadata) -> Uuid {
        let id = Uuid::new_v4();
        self.jobs.insert(id, Job::new(id, metadata));
        id
    }

    /// Point-in-time snapshot of a job.
    pub fn get(&self, id: Uuid) -> Result<Job, RegistryError> {
        self.jobs
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(RegistryError::NotFound(id))
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Apply `f` to the live record while holding its write guard.
    fn with_job<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Job) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let mut entry = self.jobs.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
        f(entry.value_mut())
    }

    /// `pending -> processing`. A second call is rejected.
    pub fn transition_to_processing(&self, id: Uuid) -> Result<(), RegistryError> {
        self.with_job(id, |job| {
            if job.status != JobStatus::Pending {
                return Err(RegistryError::InvalidTransition {
                    id,
                    from: job.status,
                    to: JobStatus::Processing,
                });
            }
            job.status = JobStatus::Processing;
            job.progress = 0;
            job.updated_at = Utc::now();
            Ok(())
        })
    }

    /// Record progress for a processing job. Values are clamped to `0..=100`
    /// and never move backwards. Returns the progress now recorded.
    pub fn update_progress(&self, id: Uuid, percent: i64) -> Result<u8, RegistryError> {
        self.with_job(id, |job| {
            if job.status != JobStatus::Processing {
                return Err(RegistryError::InvalidTransition {
                    id,
                    from: job.status,
                    to: JobStatus::Processing,
                });
            }
            let percent = percent.clamp(0, 100) as u8;
            if percent > job.progress {
                job.progress = percent;
                job.updated_at = Utc::now();
            }
            Ok(job.progress)
        })
    }

    /// Attach a server-side diagnostic to a job that has not finished yet.
    pub fn record_diagnostic(&self, id: Uuid, message: impl Into<String>) -> Result<(), RegistryError> {
        self.with_job(id, |job| {
            if job.status.is_terminal() {
                return Err(RegistryError::InvalidTransition {
                    id,
                    from: job.status,
                    to: job.status,
                });
            }
            job.diagnostic = Some(message.into());
            job.updated_at = Utc::now();
            Ok(())
        })
    }

    /// `processing -> completed`. Returns `false` when the job was already
    /// terminal and nothing changed.
    pub fn complete(&self, id: Uuid, result: MetricsResult) -> Result<bool, RegistryError> {
        self.with_job(id, |job| match job.status {
            JobStatus::Completed | JobStatus::Failed => Ok(false),
            JobStatus::Pending => Err(RegistryError::InvalidTransition {
                id,
                from: job.status,
                to: JobStatus::Completed,
            }),
            JobStatus::Processing => {
                job.result = Some(result);
                job.progress = 100;
                job.status = JobStatus::Completed;
                job.updated_at = Utc::now();
                Ok(true)
            }
        })
    }

    /// `pending | processing -> failed`. Returns `false` when the job was
    /// already terminal and nothing changed.
    pub fn fail(&self, id: Uuid, error: JobError) -> Result<bool, RegistryError> {
        self.with_job(id, |job| {
            if job.status.is_terminal() {
                return Ok(false);
            }
            job.error = Some(error);
            job.progress = 100;
            job.status = JobStatus::Failed;
            job.updated_at = Utc::now();
            Ok(true)
        })
    }
}
