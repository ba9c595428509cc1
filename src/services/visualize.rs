//! Pull exported rasters back out of the bucket and write preview PNGs.

use image::{ColorType, ImageFormat};
use std::path::{Path, PathBuf};

use crate::models::raster::{is_true_color, Raster, REFLECTANCE_SCALE};
use crate::services::raster::{read_raster, RasterError};
use crate::services::storage::{ObjectStore, StorageError};

const RASTER_EXTENSIONS: &[&str] = &[".tif", ".tiff"];

#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Key prefix the export was written to.
    pub prefix: String,
    /// Substring that selects one band, e.g. `TCI` or `B08`.
    pub band: String,
    pub max_images: usize,
    pub decimation: u32,
    pub scale: f32,
    pub output_dir: PathBuf,
}

impl RenderRequest {
    pub fn new(
        prefix: impl Into<String>,
        band: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            band: band.into(),
            max_images: 4,
            decimation: 10,
            scale: REFLECTANCE_SCALE,
            output_dir: output_dir.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to encode preview: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Preview writer task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Raster keys containing `band`, in listing order, at most `max` of them.
pub fn select_keys(keys: &[String], band: &str, max: usize) -> Vec<String> {
    keys.iter()
        .filter(|key| {
            let lower = key.to_ascii_lowercase();
            RASTER_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
        })
        .filter(|key| key.contains(band))
        .take(max)
        .cloned()
        .collect()
}

fn preview_path(output_dir: &Path, key: &str) -> PathBuf {
    let key = key.trim_start_matches('/');
    let stem = key
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(key)
        .replace('/', "_");
    output_dir.join(format!("{stem}.png"))
}

fn write_preview(raster: &Raster, band: &str, scale: f32, path: &Path) -> Result<(), RenderError> {
    let color = match raster.channels() {
        1 => ColorType::L8,
        3 => ColorType::Rgb8,
        n => {
            return Err(RasterError::UnsupportedLayout(format!("{n} channels")).into());
        }
    };

    let pixels = raster.to_display(band, scale);
    image::save_buffer_with_format(
        path,
        &pixels,
        raster.width(),
        raster.height(),
        color,
        ImageFormat::Png,
    )?;
    Ok(())
}

/// Render up to `max_images` matching rasters under the request prefix.
pub async fn render_outputs(
    store: &dyn ObjectStore,
    request: &RenderRequest,
) -> Result<Vec<PathBuf>, RenderError> {
    let keys = store.list_objects(&request.prefix).await?;
    let selected = select_keys(&keys, &request.band, request.max_images);

    tracing::info!(
        bucket = store.bucket_name(),
        prefix = %request.prefix,
        band = %request.band,
        listed = keys.len(),
        selected = selected.len(),
        rescaled = !is_true_color(&request.band),
        "Rendering exported rasters"
    );

    tokio::fs::create_dir_all(&request.output_dir)
        .await
        .map_err(|source| RenderError::Io {
            path: request.output_dir.clone(),
            source,
        })?;

    let mut written = Vec::with_capacity(selected.len());
    for key in &selected {
        let raster = read_raster(store, key, request.decimation).await?;
        let (width, height) = (raster.width(), raster.height());
        let path = preview_path(&request.output_dir, key);

        // PNG encoding and the file write are blocking.
        let band = request.band.clone();
        let scale = request.scale;
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_preview(&raster, &band, scale, &target))
            .await??;

        metrics::counter!("geoproc_rasters_rendered_total").increment(1);
        tracing::info!(
            key = %key,
            path = %path.display(),
            width,
            height,
            "Wrote preview"
        );
        written.push(path);
    }

    Ok(written)
}
