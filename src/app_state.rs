use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::services::{
    poller::PollSchedule,
    processing::{HttpProcessingClient, ProcessingService},
    retry::RetryConfig,
    storage::{ObjectStore, S3Store},
};

/// Shared handles passed to every stage of a run.
#[derive(Clone)]
pub struct AppState {
    pub processing: Arc<dyn ProcessingService>,
    pub storage: Arc<dyn ObjectStore>,
    pub cancel: CancellationToken,
}

impl AppState {
    pub fn new(processing: Arc<dyn ProcessingService>, storage: Arc<dyn ObjectStore>) -> Self {
        Self {
            processing,
            storage,
            cancel: CancellationToken::new(),
        }
    }

    /// Build the HTTP and S3 clients described by `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let processing = HttpProcessingClient::new(
            &config.api_base_url,
            &config.api_token,
            &config.execution_role,
            config.http_timeout(),
        )?
        .with_retry_config(RetryConfig::default().with_max_attempts(config.retry_max_attempts));

        let storage = S3Store::new(
            &config.s3_bucket,
            &config.s3_region,
            config.s3_endpoint.as_deref(),
            &config.s3_access_key,
            &config.s3_secret_key,
        )?;

        Ok(Self::new(Arc::new(processing), Arc::new(storage)))
    }

    /// A schedule tied to this run's cancellation token.
    pub fn schedule(&self, interval: Duration, timeout: Option<Duration>) -> PollSchedule {
        let schedule = PollSchedule::new(interval).with_cancellation(self.cancel.clone());
        match timeout {
            Some(timeout) => schedule.with_timeout(timeout),
            None => schedule,
        }
    }
}
