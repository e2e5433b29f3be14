//! One spawned task per job: ingest keypoints, score them, archive the run,
//! and drive the job's registry record to a terminal state.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::models::analysis::{MetricsResult, NewAnalysisRecord};
use crate::models::job::{ErrorKind, JobError, JobMetadata};
use crate::services::archive::{AnalysisArchive, PersistenceError};
use crate::services::kinematics::{self, KinematicsConfig};
use crate::services::pose::{self, PoseSource};
use crate::services::registry::{JobRegistry, RegistryError};

pub struct JobExecutor {
    registry: Arc<JobRegistry>,
    poses: Arc<dyn PoseSource>,
    archive: Arc<dyn AnalysisArchive>,
    config: KinematicsConfig,
}

impl JobExecutor {
    pub fn new(
        registry: Arc<JobRegistry>,
        poses: Arc<dyn PoseSource>,
        archive: Arc<dyn AnalysisArchive>,
        config: KinematicsConfig,
    ) -> Self {
        Self {
            registry,
            poses,
            archive,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn archive(&self) -> &Arc<dyn AnalysisArchive> {
        &self.archive
    }

    /// Create a `pending` job for `video` and schedule it. Returns without
    /// waiting for any processing. The task owns `video` and removes it when
    /// done.
    pub fn submit(self: &Arc<Self>, metadata: JobMetadata, video: PathBuf) -> Uuid {
        let job_id = self.registry.create(metadata);
        metrics::counter!("gait_jobs_submitted_total").increment(1);

        let executor = Arc::clone(self);
        tokio::spawn(async move {
            executor.run(job_id, &video).await;
        });

        job_id
    }

    /// Drive an already-created job to a terminal state.
    ///
    /// Only the run that moves the job out of `pending` owns it. Any other
    /// run returns without touching the job, its metrics or `video`.
    pub async fn run(&self, job_id: Uuid, video: &Path) {
        if let Err(e) = self.registry.transition_to_processing(job_id) {
            tracing::warn!(job_id = %job_id, error = %e, "Job not claimable, skipping run");
            return;
        }

        metrics::gauge!("gait_jobs_in_flight").increment(1.0);
        let start = Instant::now();

        match self.process(job_id, video).await {
            Ok(()) => {
                metrics::counter!("gait_jobs_completed_total").increment(1);
            }
            Err(error) => {
                tracing::error!(
                    job_id = %job_id,
                    kind = %error.kind,
                    error = %error.message,
                    "Analysis job failed"
                );
                if let Err(e) = self.registry.fail(job_id, error) {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to record job failure");
                }
                metrics::counter!("gait_jobs_failed_total").increment(1);
            }
        }

        metrics::histogram!("gait_job_processing_seconds").record(start.elapsed().as_secs_f64());
        metrics::gauge!("gait_jobs_in_flight").decrement(1.0);

        if let Err(e) = tokio::fs::remove_file(video).await {
            tracing::warn!(
                job_id = %job_id,
                path = %video.display(),
                error = %e,
                "Failed to remove uploaded video"
            );
        }
    }

    async fn process(&self, job_id: Uuid, video: &Path) -> Result<(), JobError> {
        let metadata = self.registry.get(job_id).map_err(internal)?.metadata;

        tracing::info!(
            job_id = %job_id,
            subject_id = %metadata.subject_id,
            video = %video.display(),
            "Processing analysis job"
        );

        let registry = &self.registry;
        let ingest_start = Instant::now();
        let ingested = pose::ingest(self.poses.as_ref(), video, |percent| {
            if let Err(e) = registry.update_progress(job_id, i64::from(percent)) {
                tracing::warn!(job_id = %job_id, error = %e, "Progress update rejected");
            }
        })
        .await
        .map_err(|e| JobError::new(ErrorKind::Ingestion, e.to_string()))?;

        tracing::info!(
            job_id = %job_id,
            frames = ingested.frames.len(),
            fps = ingested.metadata.fps,
            ingest_duration_ms = ingest_start.elapsed().as_millis() as u64,
            "Pose extraction complete"
        );

        let result = kinematics::compute_metrics(ingested.frames, ingested.metadata, &self.config)
            .map_err(|e| JobError::new(ErrorKind::Metrics, e.to_string()))?;

        tracing::info!(
            job_id = %job_id,
            stability = result.scores.stability,
            curvature = result.scores.curvature,
            warnings = result.warnings.len(),
            "Metrics computed"
        );

        // Archival is best-effort: a computed result is still delivered.
        match self.archive_result(job_id, &metadata, video, &result).await {
            Ok(record_id) => {
                tracing::info!(job_id = %job_id, record_id = %record_id, "Analysis archived");
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Archiving analysis failed");
                metrics::counter!("gait_persistence_failures_total").increment(1);
                if let Err(e) = self.registry.record_diagnostic(job_id, e.to_string()) {
                    tracing::warn!(job_id = %job_id, error = %e, "Failed to record diagnostic");
                }
            }
        }

        self.registry.complete(job_id, result).map_err(internal)?;
        tracing::info!(job_id = %job_id, "Job completed successfully");
        Ok(())
    }

    async fn archive_result(
        &self,
        job_id: Uuid,
        metadata: &JobMetadata,
        video: &Path,
        result: &MetricsResult,
    ) -> Result<Uuid, PersistenceError> {
        let bytes = tokio::fs::read(video).await?;
        let video_url = self
            .archive
            .upload_blob(&metadata.owner_id, job_id, &metadata.original_filename, bytes)
            .await?;

        // Checked as late as possible before the insert.
        let is_baseline = self
            .archive
            .is_first_record_for_subject(&metadata.subject_id)
            .await?;
        if is_baseline {
            tracing::info!(
                job_id = %job_id,
                subject_id = %metadata.subject_id,
                "First analysis for subject, storing as baseline"
            );
        }

        self.archive
            .insert_record(NewAnalysisRecord {
                job_id,
                owner_id: metadata.owner_id.clone(),
                subject_id: metadata.subject_id.clone(),
                original_video_filename: metadata.original_filename.clone(),
                video_url,
                result: result.clone(),
                is_baseline,
            })
            .await
    }
}

fn internal(e: RegistryError) -> JobError {
    JobError::new(ErrorKind::Internal, e.to_string())
}
