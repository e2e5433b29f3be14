//! Test helper utilities for E2E testing against a running server

#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use reqwest::multipart;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use uuid::Uuid;

/// Response from POST /api/jobs
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub status: String,
}

/// Response from GET /api/jobs/{job_id}
#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: String,
    pub progress: u8,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub error_kind: Option<String>,
}

/// Upload a video to the jobs endpoint
pub async fn upload_video(
    client: &reqwest::Client,
    base_url: &str,
    video_path: &Path,
    owner_id: &str,
    subject_id: &str,
) -> Result<SubmitResponse, Box<dyn std::error::Error>> {
    let video_bytes = tokio::fs::read(video_path).await?;
    let filename = video_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("video.mp4")
        .to_string();

    let form = multipart::Form::new()
        .part(
            "file",
            multipart::Part::bytes(video_bytes)
                .file_name(filename)
                .mime_str("video/mp4")?,
        )
        .text("owner_id", owner_id.to_string())
        .text("subject_id", subject_id.to_string());

    let response = client
        .post(format!("{}/api/jobs", base_url))
        .multipart(form)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await?;
        return Err(format!("Upload failed with status {}: {}", status, error_text).into());
    }

    Ok(response.json::<SubmitResponse>().await?)
}

/// Poll job status until completed or failed (with timeout)
pub async fn poll_job_status(
    client: &reqwest::Client,
    base_url: &str,
    job_id: Uuid,
    timeout_secs: u64,
) -> Result<JobStatusResponse, Box<dyn std::error::Error>> {
    let max_attempts = timeout_secs * 2; // Poll every 500ms
    let mut last_progress = 0;

    for attempt in 0..max_attempts {
        let response = client
            .get(format!("{}/api/jobs/{}", base_url, job_id))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(format!("Status check failed: {}", error_text).into());
        }

        let status_response = response.json::<JobStatusResponse>().await?;
        if status_response.progress < last_progress {
            return Err(format!(
                "Progress went backwards: {} -> {}",
                last_progress, status_response.progress
            )
            .into());
        }
        last_progress = status_response.progress;

        match status_response.status.as_str() {
            "completed" | "failed" => return Ok(status_response),
            "pending" | "processing" => {
                if attempt % 10 == 0 && attempt > 0 {
                    println!(
                        "  ... still waiting at {}% (attempt {}/{})",
                        status_response.progress, attempt, max_attempts
                    );
                }
                sleep(Duration::from_millis(500)).await;
            }
            _ => {
                return Err(format!("Unknown job status: {}", status_response.status).into());
            }
        }
    }

    Err(format!("Job did not complete within {} seconds", timeout_secs).into())
}
