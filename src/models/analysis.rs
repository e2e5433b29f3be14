use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::pose::KeypointFrame;

/// Container-level facts about a video, known before any frame is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub fps: f64,
    /// Zero when the container does not report a frame count.
    pub total_frames: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    /// 0-100, higher means less spinal sway.
    pub stability: u8,
    /// 0-100, higher means a straighter back.
    pub curvature: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameMetadata {
    pub fps: f64,
    pub frame_count: u64,
}

/// Output of a completed analysis, as returned to clients and archived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResult {
    pub scores: Scores,
    pub metadata: FrameMetadata,
    pub keypoints: Vec<KeypointFrame>,

    // Non-fatal issues, e.g. one metric could not be computed
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
}

impl MetricsResult {
    /// Human-readable summary stored alongside the archived record.
    pub fn notes(&self, is_baseline: bool) -> String {
        let mut notes = format!(
            "Stability score: {}/100, curvature score: {:.1}/100",
            self.scores.stability, self.scores.curvature
        );
        if is_baseline {
            notes.push_str(" (baseline)");
        }
        notes
    }
}

/// Row in `gait_analysis_records`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub job_id: Uuid,
    pub owner_id: String,
    pub subject_id: String,
    pub original_video_filename: String,
    pub video_url: String,
    pub stability_score: i16,
    pub curvature_score: f64,
    pub is_baseline: bool,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// Helper for inserting analysis records
#[derive(Debug, Clone)]
pub struct NewAnalysisRecord {
    pub job_id: Uuid,
    pub owner_id: String,
    pub subject_id: String,
    pub original_video_filename: String,
    pub video_url: String,
    pub result: MetricsResult,
    pub is_baseline: bool,
}
