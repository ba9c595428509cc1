use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Processing kinds the client knows how to configure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingKind {
    CloudRemoval,
    Mosaic,
    BandMath,
}

/// Closed polygon in (longitude, latitude) pairs. The first ring is the outer boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Polygon {
    pub rings: Vec<Vec<[f64; 2]>>,
}

impl Polygon {
    /// Build a single-ring polygon, closing it if the caller left it open.
    pub fn from_ring(mut ring: Vec<[f64; 2]>) -> Self {
        if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
            if first != last {
                ring.push(first);
            }
        }
        Self { rings: vec![ring] }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Area, time window and filter predicates shared by every job in a run.
///
/// Nothing here is validated locally; the service rejects bad input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputSpec {
    pub collection: String,
    pub area: Polygon,
    pub time_range: TimeRange,
    /// Upper bound on scene cloud cover, percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cloud_cover: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CloudRemovalConfig {
    #[serde(default = "default_cloud_removal_algorithm")]
    pub algorithm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpolation_value: Option<String>,
    #[serde(default)]
    pub target_bands: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MosaicConfig {
    #[serde(default = "default_mosaic_algorithm")]
    pub algorithm: String,
    #[serde(default)]
    pub target_bands: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomIndex {
    pub name: String,
    pub equation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BandMathConfig {
    #[serde(default)]
    pub predefined_indices: Vec<String>,
    #[serde(default)]
    pub custom_indices: Vec<CustomIndex>,
}

/// Kind-specific job parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum JobConfig {
    CloudRemoval(CloudRemovalConfig),
    Mosaic(MosaicConfig),
    BandMath(BandMathConfig),
}

impl JobConfig {
    pub fn kind(&self) -> ProcessingKind {
        match self {
            JobConfig::CloudRemoval(_) => ProcessingKind::CloudRemoval,
            JobConfig::Mosaic(_) => ProcessingKind::Mosaic,
            JobConfig::BandMath(_) => ProcessingKind::BandMath,
        }
    }
}

fn default_cloud_removal_algorithm() -> String {
    "INTERPOLATION".to_string()
}

fn default_mosaic_algorithm() -> String {
    "NEAR".to_string()
}

/// Object-store location an export is copied to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportDestination {
    pub bucket: String,
    pub prefix: String,
}

impl ExportDestination {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    pub fn s3_uri(&self) -> String {
        if self.prefix.is_empty() {
            format!("s3://{}/", self.bucket)
        } else {
            format!("s3://{}/{}/", self.bucket, self.prefix)
        }
    }

    /// Object key prefix of the export folder, with its trailing `/`, so a
    /// listing never reaches into a sibling such as `ndvi-2/` for `ndvi`.
    pub fn key_prefix(&self) -> String {
        if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", self.prefix)
        }
    }
}

/// One job of a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannedJob {
    pub name: String,
    pub config: JobConfig,
}

/// Display options applied to every exported job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderPlan {
    pub band: String,
    #[serde(default = "default_max_images")]
    pub max_images: usize,
    #[serde(default = "default_decimation")]
    pub decimation: u32,
}

fn default_max_images() -> usize {
    4
}

fn default_decimation() -> u32 {
    10
}

/// A complete run read from JSON: what to search, submit, export and render.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobPlan {
    pub input: InputSpec,
    pub jobs: Vec<PlannedJob>,
    pub export_prefix: String,
    #[serde(default)]
    pub search_first: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render: Option<RenderPlan>,
}

impl JobPlan {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
