use s3::creds::Credentials;
use s3::{Bucket, Region};

/// Client for Cloudflare R2 object storage (S3-compatible).
pub struct R2Client {
    bucket: Box<Bucket>,
    public_base_url: String,
}

impl R2Client {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
        public_base_url: &str,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: "auto".to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials =
            Credentials::new(Some(access_key), Some(secret_key), None, None, None)
                .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?
            .with_path_style();

        Ok(Self {
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Upload bytes and return the object's public URL.
    pub async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> Result<String, StorageError> {
        let response = self
            .bucket
            .put_object_with_content_type(key, data, content_type)
            .await
            .map_err(StorageError::S3)?;

        let code = response.status_code();
        if !(200..300).contains(&code) {
            return Err(StorageError::Rejected { key: key.to_string(), code });
        }

        Ok(self.public_url(key))
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    /// Delete an object from R2.
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.bucket.delete_object(key).await.map_err(StorageError::S3)?;
        Ok(())
    }
}

/// Object key for an uploaded video: `{owner_id}/{job_id}/{filename}`.
pub fn video_key(owner_id: &str, job_id: &uuid::Uuid, filename: &str) -> String {
    format!("{}/{}/{}", owner_id, job_id, sanitize_filename(filename))
}

/// Keep a filename safe for object keys and local paths.
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "video".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Content type from the file extension; pose videos are mostly mp4/mov.
pub fn video_content_type(filename: &str) -> &'static str {
    match filename.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("avi") => "video/x-msvideo",
        Some("mkv") => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Upload of {key} rejected with status {code}")]
    Rejected { key: String, code: u16 },

    #[error("Storage configuration error: {0}")]
    Config(String),
}
