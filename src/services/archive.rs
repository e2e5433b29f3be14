//! Durable archival of finished analyses: the source video goes to object
//! storage, and a row describing the run goes to PostgreSQL.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{self, queries};
use crate::models::analysis::{AnalysisRecord, NewAnalysisRecord};
use crate::services::storage::{self, R2Client, StorageError};

/// Most history rows returned for one subject.
pub const HISTORY_LIMIT: i64 = 100;

#[async_trait]
pub trait AnalysisArchive: Send + Sync {
    /// Store `bytes` and return a publicly reachable URL.
    async fn upload_blob(
        &self,
        owner_id: &str,
        job_id: Uuid,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<String, PersistenceError>;

    /// Whether this subject has no archived analysis yet. Best-effort: see
    /// [`queries::is_first_record_for_subject`].
    async fn is_first_record_for_subject(&self, subject_id: &str) -> Result<bool, PersistenceError>;

    async fn insert_record(&self, record: NewAnalysisRecord) -> Result<Uuid, PersistenceError>;

    async fn list_records(&self, subject_id: &str) -> Result<Vec<AnalysisRecord>, PersistenceError>;

    /// Check backend connectivity (for readiness probes).
    async fn health_check(&self) -> Result<(), PersistenceError>;
}

/// R2 for videos, PostgreSQL for records.
pub struct R2Archive {
    db: PgPool,
    storage: R2Client,
}

impl R2Archive {
    pub fn new(db: PgPool, storage: R2Client) -> Self {
        Self { db, storage }
    }
}

#[async_trait]
impl AnalysisArchive for R2Archive {
    async fn upload_blob(
        &self,
        owner_id: &str,
        job_id: Uuid,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<String, PersistenceError> {
        let key = storage::video_key(owner_id, &job_id, filename);
        let url = self
            .storage
            .upload(&key, &bytes, storage::video_content_type(filename))
            .await?;
        tracing::debug!(job_id = %job_id, key = %key, size = bytes.len(), "Video archived");
        Ok(url)
    }

    async fn is_first_record_for_subject(&self, subject_id: &str) -> Result<bool, PersistenceError> {
        Ok(queries::is_first_record_for_subject(&self.db, subject_id).await?)
    }

    async fn insert_record(&self, record: NewAnalysisRecord) -> Result<Uuid, PersistenceError> {
        Ok(queries::insert_record(&self.db, &record).await?)
    }

    async fn list_records(&self, subject_id: &str) -> Result<Vec<AnalysisRecord>, PersistenceError> {
        Ok(queries::list_records_for_subject(&self.db, subject_id, HISTORY_LIMIT).await?)
    }

    async fn health_check(&self) -> Result<(), PersistenceError> {
        Ok(db::ping(&self.db).await?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to read video for upload: {0}")]
    Io(#[from] std::io::Error),
}
