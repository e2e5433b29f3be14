//! Keypoint builders and in-memory stand-ins for the pose model and archive.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use uuid::Uuid;

use gait_analysis::models::analysis::{AnalysisRecord, NewAnalysisRecord, VideoMetadata};
use gait_analysis::models::pose::{KeypointFrame, Point2D, Subject};
use gait_analysis::services::archive::{AnalysisArchive, PersistenceError};
use gait_analysis::services::pose::{IngestionError, PoseStream, PoseSource};

pub const COCO17_LEN: usize = 17;

/// One subject whose shoulders sit at `shoulder` and hips at `hip`.
pub fn spine_frame(shoulder: (f64, f64), hip: (f64, f64)) -> KeypointFrame {
    let mut keypoints = vec![None; COCO17_LEN];
    for idx in [5, 6] {
        keypoints[idx] = Some(Point2D::new(shoulder.0, shoulder.1));
    }
    for idx in [11, 12] {
        keypoints[idx] = Some(Point2D::new(hip.0, hip.1));
    }
    KeypointFrame::new(vec![Subject::new(keypoints)])
}

/// Spine parallel to the horizontal reference: full marks on both scores.
pub fn level_frame() -> KeypointFrame {
    spine_frame((10.0, 10.0), (-30.0, 10.0))
}

/// Spine swinging between two angles on alternate frames.
pub fn swaying_frames(count: usize) -> Vec<KeypointFrame> {
    (0..count)
        .map(|i| {
            if i % 2 == 0 {
                spine_frame((10.0, 10.0), (-30.0, 10.0))
            } else {
                spine_frame((10.0, 14.0), (-30.0, 10.0))
            }
        })
        .collect()
}

/// Pose source that replays fixed frames regardless of the video content.
pub struct CannedPoses {
    pub frames: Vec<KeypointFrame>,
    pub fps: f64,
    pub fail_open: bool,
}

impl CannedPoses {
    pub fn new(frames: Vec<KeypointFrame>) -> Self {
        Self {
            frames,
            fps: 30.0,
            fail_open: false,
        }
    }

    pub fn unreadable() -> Self {
        Self {
            frames: Vec::new(),
            fps: 0.0,
            fail_open: true,
        }
    }
}

#[async_trait]
impl PoseSource for CannedPoses {
    async fn open(&self, video: &Path) -> Result<PoseStream, IngestionError> {
        if self.fail_open {
            return Err(IngestionError::Open(format!(
                "cannot decode {}",
                video.display()
            )));
        }
        Ok(PoseStream {
            metadata: VideoMetadata {
                fps: self.fps,
                total_frames: self.frames.len() as u64,
            },
            frames: stream::iter(self.frames.clone().into_iter().map(Ok)).boxed(),
        })
    }
}

/// Archive keeping records in memory, newest first on listing.
#[derive(Default)]
pub struct MemoryArchive {
    pub unavailable: bool,
    pub records: Mutex<Vec<AnalysisRecord>>,
}

impl MemoryArchive {
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.unavailable {
            return Err(PersistenceError::Io(std::io::Error::other(
                "archive offline",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl AnalysisArchive for MemoryArchive {
    async fn upload_blob(
        &self,
        owner_id: &str,
        job_id: Uuid,
        filename: &str,
        _bytes: Vec<u8>,
    ) -> Result<String, PersistenceError> {
        self.check()?;
        Ok(format!("https://videos.test/{owner_id}/{job_id}/{filename}"))
    }

    async fn is_first_record_for_subject(&self, subject_id: &str) -> Result<bool, PersistenceError> {
        self.check()?;
        let records = self.records.lock().unwrap();
        Ok(!records.iter().any(|r| r.subject_id == subject_id))
    }

    async fn insert_record(&self, record: NewAnalysisRecord) -> Result<Uuid, PersistenceError> {
        self.check()?;
        let id = Uuid::new_v4();
        let notes = record.result.notes(record.is_baseline);
        self.records.lock().unwrap().push(AnalysisRecord {
            id,
            job_id: record.job_id,
            owner_id: record.owner_id,
            subject_id: record.subject_id,
            original_video_filename: record.original_video_filename,
            video_url: record.video_url,
            stability_score: i16::from(record.result.scores.stability),
            curvature_score: record.result.scores.curvature,
            is_baseline: record.is_baseline,
            notes,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn list_records(&self, subject_id: &str) -> Result<Vec<AnalysisRecord>, PersistenceError> {
        self.check()?;
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.subject_id == subject_id)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> Result<(), PersistenceError> {
        self.check()
    }
}
