use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// R2 bucket name
    pub r2_bucket: String,

    /// R2 access key ID (S3-compatible)
    pub r2_access_key: String,

    /// R2 secret access key (S3-compatible)
    pub r2_secret_key: String,

    /// R2 endpoint URL
    pub r2_endpoint: String,

    /// Public base URL archived videos are served from
    pub r2_public_base_url: String,

    /// Base URL of the pose-estimation sidecar
    pub pose_model_url: String,

    #[serde(default = "default_ffprobe_bin")]
    pub ffprobe_bin: String,

    /// Where uploaded videos wait for their job
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Keypoints reported below this confidence are treated as absent
    #[serde(default)]
    pub keypoint_confidence_threshold: f64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_ffprobe_bin() -> String {
    "ffprobe".to_string()
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

fn default_max_upload_bytes() -> usize {
    200 * 1024 * 1024
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required() -> Vec<(String, String)> {
        [
            ("DATABASE_URL", "postgres://localhost/gait"),
            ("R2_BUCKET", "videos"),
            ("R2_ACCESS_KEY", "key"),
            ("R2_SECRET_KEY", "secret"),
            ("R2_ENDPOINT", "https://r2.example"),
            ("R2_PUBLIC_BASE_URL", "https://cdn.example"),
            ("POSE_MODEL_URL", "http://localhost:9000"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_defaults_applied() {
        let config: AppConfig = envy::from_iter(required()).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.ffprobe_bin, "ffprobe");
        assert_eq!(config.upload_dir, "uploads");
        assert_eq!(config.max_upload_bytes, 200 * 1024 * 1024);
        assert_eq!(config.keypoint_confidence_threshold, 0.0);
    }

    #[test]
    fn test_missing_required_variable() {
        let vars: Vec<_> = required()
            .into_iter()
            .filter(|(k, _)| k != "POSE_MODEL_URL")
            .collect();
        assert!(envy::from_iter::<_, AppConfig>(vars).is_err());
    }

    #[test]
    fn test_overrides_parsed() {
        let mut vars = required();
        vars.push(("MAX_UPLOAD_BYTES".to_string(), "1024".to_string()));
        vars.push(("KEYPOINT_CONFIDENCE_THRESHOLD".to_string(), "0.35".to_string()));
        let config: AppConfig = envy::from_iter(vars).unwrap();
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.keypoint_confidence_threshold, 0.35);
    }
}
