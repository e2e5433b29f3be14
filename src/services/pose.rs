//! Pose-sequence ingestion.
//!
//! The pose model itself is an external sidecar: it accepts a video and
//! streams back one NDJSON line per frame,
//! `{"subjects": [[[x, y, conf], ...], ...]}`. Container metadata comes from
//! `ffprobe` before any frame is requested.

use std::path::Path;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::Deserialize;
use tokio::process::Command;

use crate::models::analysis::VideoMetadata;
use crate::models::pose::{KeypointFrame, Point2D, Subject};

/// Metadata plus a lazily-produced frame sequence.
pub struct PoseStream {
    pub metadata: VideoMetadata,
    pub frames: BoxStream<'static, Result<KeypointFrame, IngestionError>>,
}

/// Source of per-frame keypoints for a video.
#[async_trait]
pub trait PoseSource: Send + Sync {
    async fn open(&self, video: &Path) -> Result<PoseStream, IngestionError>;
}

/// Collected output of a full ingestion run.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub metadata: VideoMetadata,
    pub frames: Vec<KeypointFrame>,
}

/// Progress in whole percent, or `None` when the total is unknown.
pub fn progress_percent(processed: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    Some((processed.saturating_mul(100) / total).min(100) as u8)
}

/// Drain `source` for `video`, calling `on_progress` whenever the whole
/// percentage changes. Nothing is reported when the frame total is unknown.
pub async fn ingest<F>(
    source: &dyn PoseSource,
    video: &Path,
    mut on_progress: F,
) -> Result<Ingested, IngestionError>
where
    F: FnMut(u8) + Send,
{
    let PoseStream {
        metadata,
        mut frames,
    } = source.open(video).await?;

    let mut collected = Vec::with_capacity(metadata.total_frames.min(100_000) as usize);
    let mut last_reported = None;

    while let Some(frame) = frames.next().await {
        collected.push(frame?);
        if let Some(percent) = progress_percent(collected.len() as u64, metadata.total_frames) {
            if last_reported != Some(percent) {
                last_reported = Some(percent);
                on_progress(percent);
            }
        }
    }

    tracing::debug!(
        frames = collected.len(),
        total_frames = metadata.total_frames,
        fps = metadata.fps,
        "Pose stream exhausted"
    );

    Ok(Ingested {
        metadata,
        frames: collected,
    })
}

/// Production source: `ffprobe` for metadata, HTTP sidecar for keypoints.
pub struct HttpPoseSource {
    http: Client,
    model_url: String,
    ffprobe_bin: String,
    confidence_threshold: f64,
}

impl HttpPoseSource {
    pub fn new(model_url: &str, ffprobe_bin: &str, confidence_threshold: f64) -> Self {
        Self {
            http: Client::new(),
            model_url: model_url.trim_end_matches('/').to_string(),
            ffprobe_bin: ffprobe_bin.to_string(),
            confidence_threshold,
        }
    }

    async fn probe(&self, video: &Path) -> Result<VideoMetadata, IngestionError> {
        let output = Command::new(&self.ffprobe_bin)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=r_frame_rate,avg_frame_rate,nb_frames",
                "-of",
                "json",
            ])
            .arg(video)
            .output()
            .await
            .map_err(|e| IngestionError::Open(format!("failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(IngestionError::Open(format!(
                "ffprobe rejected {}: {}",
                video.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_probe(&output.stdout)
    }
}

#[async_trait]
impl PoseSource for HttpPoseSource {
    async fn open(&self, video: &Path) -> Result<PoseStream, IngestionError> {
        let metadata = self.probe(video).await?;

        let bytes = tokio::fs::read(video)
            .await
            .map_err(|e| IngestionError::Open(format!("{}: {e}", video.display())))?;

        let response = self
            .http
            .post(format!("{}/predict", self.model_url))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(IngestionError::Http)?
            .error_for_status()
            .map_err(IngestionError::Http)?;

        tracing::debug!(
            video = %video.display(),
            fps = metadata.fps,
            total_frames = metadata.total_frames,
            "Pose model stream opened"
        );

        Ok(PoseStream {
            metadata,
            frames: ndjson_frames(response.bytes_stream(), self.confidence_threshold),
        })
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeStream {
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

/// Parse `ffprobe -of json` output for the first video stream.
pub fn parse_probe(raw: &[u8]) -> Result<VideoMetadata, IngestionError> {
    let probe: ProbeOutput = serde_json::from_slice(raw).map_err(IngestionError::Decode)?;
    let stream = probe
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| IngestionError::Open("no video stream found".to_string()))?;

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rational)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rational))
        .unwrap_or(0.0);

    let total_frames = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.trim().parse::<u64>().ok())
        .unwrap_or(0);

    Ok(VideoMetadata { fps, total_frames })
}

/// `"30000/1001"` or `"25"`; zero denominators and non-finite values are rejected.
fn parse_rational(raw: &str) -> Option<f64> {
    let value = match raw.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num.trim().parse::<f64>().ok()? / den
        }
        None => raw.trim().parse().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(default)]
    subjects: Vec<Vec<Option<Vec<f64>>>>,
}

/// Decode one NDJSON line. Points that are missing, `[0, 0]`, or below
/// `confidence_threshold` are marked absent.
pub fn parse_frame_line(
    line: &[u8],
    confidence_threshold: f64,
) -> Result<KeypointFrame, IngestionError> {
    let raw: RawFrame = serde_json::from_slice(line).map_err(IngestionError::Decode)?;
    let subjects = raw
        .subjects
        .into_iter()
        .map(|points| {
            Subject::new(
                points
                    .into_iter()
                    .map(|p| p.and_then(|p| to_point(&p, confidence_threshold)))
                    .collect(),
            )
        })
        .collect();
    Ok(KeypointFrame::new(subjects))
}

fn to_point(raw: &[f64], confidence_threshold: f64) -> Option<Point2D> {
    let (x, y) = match raw {
        [x, y, ..] => (*x, *y),
        _ => return None,
    };
    if let Some(confidence) = raw.get(2) {
        if *confidence < confidence_threshold {
            return None;
        }
    }
    if (x == 0.0 && y == 0.0) || !x.is_finite() || !y.is_finite() {
        return None;
    }
    Some(Point2D::new(x, y))
}

/// Split a chunked byte stream into NDJSON lines and decode each as a frame.
/// Lines may straddle chunk boundaries; blank lines are ignored.
pub fn ndjson_frames<S, B, E>(
    body: S,
    confidence_threshold: f64,
) -> BoxStream<'static, Result<KeypointFrame, IngestionError>>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display,
{
    let body = body.map_err(|e| IngestionError::Model(e.to_string())).boxed();

    stream::try_unfold(
        (body, Vec::<u8>::new(), false),
        move |(mut body, mut buf, mut eof)| async move {
            loop {
                if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buf.drain(..=pos).collect();
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    let frame = parse_frame_line(&line, confidence_threshold)?;
                    return Ok(Some((frame, (body, buf, eof))));
                }
                if eof {
                    if buf.iter().all(u8::is_ascii_whitespace) {
                        return Ok::<_, IngestionError>(None);
                    }
                    let line = std::mem::take(&mut buf);
                    let frame = parse_frame_line(&line, confidence_threshold)?;
                    return Ok(Some((frame, (body, buf, eof))));
                }
                match body.next().await {
                    Some(chunk) => buf.extend_from_slice(chunk?.as_ref()),
                    None => eof = true,
                }
            }
        },
    )
    .boxed()
}

#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("Cannot open video: {0}")]
    Open(String),

    #[error("Pose model request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Pose model stream failed: {0}")]
    Model(String),

    #[error("Malformed pose model output: {0}")]
    Decode(#[from] serde_json::Error),
}
