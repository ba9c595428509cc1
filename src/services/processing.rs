//! Client for the managed earth-observation processing service.
//!
//! Every remote operation (job submission, status, export, collection search)
//! goes through [`ProcessingService`]. [`HttpProcessingClient`] speaks the
//! service's JSON API over HTTPS; tests substitute an in-memory fake.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::models::job::{ExportHandle, JobDetails, JobHandle};
use crate::models::request::{ExportDestination, InputSpec, JobConfig};
use crate::models::scene::RasterItem;
use crate::services::retry::{retry_if, RetryConfig, RetryableError};

#[async_trait]
pub trait ProcessingService: Send + Sync {
    /// Submit a job. Validation happens remotely and surfaces as an error here.
    async fn submit(
        &self,
        name: &str,
        config: &JobConfig,
        input: &InputSpec,
    ) -> Result<JobHandle, ServiceError>;

    /// Read-only status query.
    async fn get_status(&self, handle: &JobHandle) -> Result<JobDetails, ServiceError>;

    /// Ask the service to copy a completed job's output to `destination`.
    async fn export(
        &self,
        handle: &JobHandle,
        destination: &ExportDestination,
    ) -> Result<ExportHandle, ServiceError>;

    /// Search the input collection for scenes matching `input`.
    async fn search(&self, input: &InputSpec) -> Result<Vec<RasterItem>, ServiceError>;
}

/// Coarse classification used for retry and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TransientRemote,
    PermanentRemote,
    ProtocolViolation,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response from service: {0}")]
    Protocol(String),

    #[error("Processing client configuration error: {0}")]
    Config(String),
}

fn is_transient_status(status: u16) -> bool {
    status == StatusCode::REQUEST_TIMEOUT.as_u16()
        || status == StatusCode::TOO_MANY_REQUESTS.as_u16()
        || status >= 500
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Transport(e) => {
                if e.is_timeout() || e.is_connect() {
                    ErrorKind::TransientRemote
                } else if let Some(status) = e.status() {
                    if is_transient_status(status.as_u16()) {
                        ErrorKind::TransientRemote
                    } else {
                        ErrorKind::PermanentRemote
                    }
                } else if e.is_decode() {
                    ErrorKind::ProtocolViolation
                } else {
                    ErrorKind::PermanentRemote
                }
            }
            ServiceError::Api { status, .. } => {
                if is_transient_status(*status) {
                    ErrorKind::TransientRemote
                } else {
                    ErrorKind::PermanentRemote
                }
            }
            ServiceError::Protocol(_) => ErrorKind::ProtocolViolation,
            ServiceError::Config(_) => ErrorKind::PermanentRemote,
        }
    }
}

impl ServiceError {
    /// The request provably was not acted on, so sending it again cannot
    /// duplicate a job or an export.
    pub fn is_safe_to_resend(&self) -> bool {
        match self {
            ServiceError::Transport(e) => e.is_connect(),
            ServiceError::Api { status, .. } => *status == StatusCode::TOO_MANY_REQUESTS.as_u16(),
            _ => false,
        }
    }
}

impl RetryableError for ServiceError {
    fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::TransientRemote
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ArnResponse {
    arn: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SearchResponse {
    #[serde(default)]
    items: Vec<WireItem>,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireItem {
    id: String,
    date_time: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    properties: WireProperties,
    #[serde(default)]
    assets: BTreeMap<String, WireAsset>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct WireProperties {
    #[serde(default)]
    eo_cloud_cover: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireAsset {
    href: String,
}

impl From<WireItem> for RasterItem {
    fn from(item: WireItem) -> Self {
        RasterItem {
            id: item.id,
            datetime: item.date_time,
            cloud_cover: item.properties.eo_cloud_cover,
            assets: item
                .assets
                .into_iter()
                .map(|(name, asset)| (name, asset.href))
                .collect(),
        }
    }
}

/// Wire form of the kind-specific configuration.
pub fn job_config_body(config: &JobConfig) -> Value {
    match config {
        JobConfig::CloudRemoval(c) => {
            let mut body = json!({
                "AlgorithmName": c.algorithm,
                "TargetBands": c.target_bands,
            });
            if let Some(value) = &c.interpolation_value {
                body["InterpolationValue"] = json!(value);
            }
            json!({ "CloudRemovalConfig": body })
        }
        JobConfig::Mosaic(c) => json!({
            "GeoMosaicConfig": {
                "AlgorithmName": c.algorithm,
                "TargetBands": c.target_bands,
            }
        }),
        JobConfig::BandMath(c) => {
            let mut body = json!({});
            if !c.predefined_indices.is_empty() {
                body["PredefinedIndices"] = json!(c.predefined_indices);
            }
            if !c.custom_indices.is_empty() {
                let operations: Vec<Value> = c
                    .custom_indices
                    .iter()
                    .map(|i| json!({ "Name": i.name, "Equation": i.equation }))
                    .collect();
                body["CustomIndices"] = json!({ "Operations": operations });
            }
            json!({ "BandMathConfig": body })
        }
    }
}

/// Wire form of the area / time / property query shared by submit and search.
pub fn raster_query_body(input: &InputSpec) -> Value {
    let mut query = json!({
        "AreaOfInterest": {
            "AreaOfInterestGeometry": {
                "PolygonGeometry": { "Coordinates": input.area.rings }
            }
        },
        "TimeRangeFilter": {
            "StartTime": input.time_range.start.to_rfc3339(),
            "EndTime": input.time_range.end.to_rfc3339(),
        },
    });

    if let Some(max) = input.max_cloud_cover {
        query["PropertyFilters"] = json!({
            "Properties": [
                { "Property": { "EoCloudCover": { "LowerBound": 0.0, "UpperBound": max } } }
            ],
            "LogicalOperator": "AND",
        });
    }

    query
}

/// How a failed call may be repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replay {
    /// Reads: any transient failure is retried.
    Idempotent,
    /// Submit and export: retried only when the first attempt was never processed.
    AtMostOnce,
}

/// JSON-over-HTTPS implementation of [`ProcessingService`].
pub struct HttpProcessingClient {
    http: Client,
    base_url: Url,
    api_token: String,
    execution_role: String,
    retry: RetryConfig,
}

impl HttpProcessingClient {
    pub fn new(
        base_url: &str,
        api_token: &str,
        execution_role: &str,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ServiceError::Config(format!("invalid base URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ServiceError::Config(format!(
                "base URL {base_url} cannot carry a path"
            )));
        }

        let http = Client::builder()
            .user_agent(concat!("geoproc-client/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_token: api_token.to_string(),
            execution_role: execution_role.to_string(),
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// `base_url` with each segment appended, percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &Url,
        body: Option<&Value>,
        replay: Replay,
    ) -> Result<T, ServiceError> {
        retry_if(
            &self.retry,
            || {
                let method = method.clone();
                async move { self.send_once(method, url, body).await }
            },
            |err: &ServiceError| match replay {
                Replay::Idempotent => err.is_retryable(),
                Replay::AtMostOnce => err.is_safe_to_resend(),
            },
        )
        .await
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &Url,
        body: Option<&Value>,
    ) -> Result<T, ServiceError> {
        let mut request = self
            .http
            .request(method, url.clone())
            .bearer_auth(&self.api_token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::debug!(status = %status, url = %url, "Service returned error status");
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| ServiceError::Protocol(e.to_string()))
    }
}

#[async_trait]
impl ProcessingService for HttpProcessingClient {
    async fn submit(
        &self,
        name: &str,
        config: &JobConfig,
        input: &InputSpec,
    ) -> Result<JobHandle, ServiceError> {
        let mut query = raster_query_body(input);
        query["RasterDataCollectionArn"] = json!(input.collection);

        let body = json!({
            "Name": name,
            "ExecutionRoleArn": self.execution_role,
            "InputConfig": { "RasterDataCollectionQuery": query },
            "JobConfig": job_config_body(config),
        });

        let url = self.endpoint(&["earth-observation-jobs"]);
        let response: ArnResponse = self
            .call(Method::POST, &url, Some(&body), Replay::AtMostOnce)
            .await?;

        metrics::counter!("geoproc_jobs_submitted_total", "kind" => config.kind().to_string())
            .increment(1);
        tracing::info!(job = %response.arn, name, kind = %config.kind(), "Job submitted");

        Ok(JobHandle::new(response.arn))
    }

    async fn get_status(&self, handle: &JobHandle) -> Result<JobDetails, ServiceError> {
        let url = self.endpoint(&["earth-observation-jobs", handle.as_str()]);
        let details: JobDetails = self
            .call(Method::GET, &url, None, Replay::Idempotent)
            .await?;

        metrics::counter!("geoproc_status_polls_total").increment(1);
        tracing::debug!(
            job = %handle,
            status = %details.status,
            export = %details.export_status,
            "Job status"
        );

        Ok(details)
    }

    async fn export(
        &self,
        handle: &JobHandle,
        destination: &ExportDestination,
    ) -> Result<ExportHandle, ServiceError> {
        let body = json!({
            "Arn": handle.as_str(),
            "ExecutionRoleArn": self.execution_role,
            "OutputConfig": { "S3Data": { "S3Uri": destination.s3_uri() } },
        });

        let url = self.endpoint(&["export-earth-observation-job"]);
        let response: ArnResponse = self
            .call(Method::POST, &url, Some(&body), Replay::AtMostOnce)
            .await?;

        metrics::counter!("geoproc_exports_requested_total").increment(1);
        tracing::info!(job = %handle, destination = %destination.s3_uri(), "Export requested");

        Ok(ExportHandle::new(response.arn))
    }

    async fn search(&self, input: &InputSpec) -> Result<Vec<RasterItem>, ServiceError> {
        let url = self.endpoint(&["search-raster-data-collection"]);
        let mut items = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut body = json!({
                "Arn": input.collection,
                "RasterDataCollectionQuery": raster_query_body(input),
            });
            if let Some(token) = &next_token {
                body["NextToken"] = json!(token);
            }

            // Search is a read despite the POST.
            let page: SearchResponse = self
                .call(Method::POST, &url, Some(&body), Replay::Idempotent)
                .await?;
            items.extend(page.items.into_iter().map(RasterItem::from));

            match page.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        tracing::info!(collection = %input.collection, scenes = items.len(), "Search complete");
        Ok(items)
    }
}
