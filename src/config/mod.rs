use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Processing service base URL (e.g., "https://geo.example.com/v1")
    pub api_base_url: String,

    /// Bearer token for the processing service
    pub api_token: String,

    /// Role identifier the service assumes when running and exporting jobs
    pub execution_role: String,

    /// Bucket exports are written to and read back from
    pub s3_bucket: String,

    #[serde(default = "default_s3_region")]
    pub s3_region: String,

    /// Custom S3-compatible endpoint. Unset means the provider's regional endpoint.
    #[serde(default)]
    pub s3_endpoint: Option<String>,

    pub s3_access_key: String,

    pub s3_secret_key: String,

    #[serde(default = "default_job_poll_interval_secs")]
    pub job_poll_interval_secs: u64,

    #[serde(default = "default_export_poll_interval_secs")]
    pub export_poll_interval_secs: u64,

    /// Overall deadline for each polling loop. Unset waits indefinitely.
    #[serde(default)]
    pub poll_timeout_secs: Option<u64>,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Job plan read by the main binary
    #[serde(default = "default_plan_path")]
    pub plan_path: PathBuf,

    /// Prometheus listener address (e.g., "0.0.0.0:9000"). Unset disables the exporter.
    #[serde(default)]
    pub metrics_addr: Option<SocketAddr>,
}

fn default_s3_region() -> String {
    "us-west-2".to_string()
}

fn default_job_poll_interval_secs() -> u64 {
    60
}

fn default_export_poll_interval_secs() -> u64 {
    30
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./renders")
}

fn default_plan_path() -> PathBuf {
    PathBuf::from("plan.json")
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn job_poll_interval(&self) -> Duration {
        Duration::from_secs(self.job_poll_interval_secs)
    }

    pub fn export_poll_interval(&self) -> Duration {
        Duration::from_secs(self.export_poll_interval_secs)
    }

    pub fn poll_timeout(&self) -> Option<Duration> {
        self.poll_timeout_secs.map(Duration::from_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
