//! Recompute scores from a stored keypoint sequence without touching the
//! server, the model, or the archive.
//!
//! Usage: `replay <keypoints.json> [fps]`
//!
//! The input is either a bare array of frames or a previously returned
//! analysis result (anything with a `keypoints` field).

use gait_analysis::models::analysis::VideoMetadata;
use gait_analysis::models::pose::KeypointFrame;
use gait_analysis::services::kinematics::{self, KinematicsConfig};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

const DEFAULT_FPS: f64 = 30.0;

#[derive(Deserialize)]
#[serde(untagged)]
enum ReplayInput {
    Frames(Vec<KeypointFrame>),
    Result {
        keypoints: Vec<KeypointFrame>,
        #[serde(default)]
        metadata: Option<ReplayMetadata>,
    },
}

#[derive(Deserialize)]
struct ReplayMetadata {
    fps: f64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: replay <keypoints.json> [fps]");
        std::process::exit(2);
    };
    let fps_arg = args
        .next()
        .map(|raw| raw.parse::<f64>().expect("fps must be a number"));

    let raw = tokio::fs::read(&path)
        .await
        .expect("Failed to read keypoints file");
    let input: ReplayInput = serde_json::from_slice(&raw).expect("Failed to parse keypoints");

    let (frames, stored_fps) = match input {
        ReplayInput::Frames(frames) => (frames, None),
        ReplayInput::Result {
            keypoints,
            metadata,
        } => (keypoints, metadata.map(|m| m.fps)),
    };
    let fps = fps_arg.or(stored_fps).unwrap_or(DEFAULT_FPS);

    tracing::info!(path = %path, frames = frames.len(), fps, "Replaying keypoints");

    let video = VideoMetadata {
        fps,
        total_frames: frames.len() as u64,
    };
    match kinematics::compute_metrics(frames, video, &KinematicsConfig::default()) {
        Ok(result) => {
            let output = serde_json::json!({
                "scores": result.scores,
                "metadata": result.metadata,
                "warnings": result.warnings,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&output).expect("Failed to encode scores")
            );
        }
        Err(e) => {
            eprintln!("replay failed: {e}");
            std::process::exit(1);
        }
    }
}
