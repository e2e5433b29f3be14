use std::path::PathBuf;
use std::sync::Arc;

use crate::services::{executor::JobExecutor, registry::JobRegistry};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<JobExecutor>,
    pub upload_dir: Arc<PathBuf>,
}

impl AppState {
    pub fn new(executor: JobExecutor, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            executor: Arc::new(executor),
            upload_dir: Arc::new(upload_dir.into()),
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        self.executor.registry()
    }
}
