use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One raster scene matched by a collection search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RasterItem {
    pub id: String,
    pub datetime: DateTime<Utc>,
    pub cloud_cover: Option<f64>,
    /// Asset name (band) to object URL.
    pub assets: BTreeMap<String, String>,
}

impl RasterItem {
    pub fn asset(&self, band: &str) -> Option<&str> {
        self.assets.get(band).map(String::as_str)
    }
}
