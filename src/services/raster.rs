use image::{DynamicImage, ImageFormat};

use crate::models::raster::Raster;
use crate::services::storage::{ObjectStore, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Failed to decode raster: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Unsupported raster layout: {0}")]
    UnsupportedLayout(String),

    #[error("Decimation factor must be at least 1")]
    InvalidDecimation,
}

/// Decode a TIFF tile into integer samples.
pub fn decode_raster(bytes: &[u8]) -> Result<Raster, RasterError> {
    let image = image::load_from_memory_with_format(bytes, ImageFormat::Tiff)?;
    let (width, height) = (image.width(), image.height());

    let (channels, samples): (u8, Vec<u16>) = match image {
        DynamicImage::ImageLuma8(buf) => (1, buf.into_raw().into_iter().map(u16::from).collect()),
        DynamicImage::ImageLuma16(buf) => (1, buf.into_raw()),
        DynamicImage::ImageRgb8(buf) => (3, buf.into_raw().into_iter().map(u16::from).collect()),
        DynamicImage::ImageRgb16(buf) => (3, buf.into_raw()),
        // Alpha is dropped.
        DynamicImage::ImageRgba8(buf) => {
            let rgb = DynamicImage::ImageRgba8(buf).to_rgb8();
            (3, rgb.into_raw().into_iter().map(u16::from).collect())
        }
        DynamicImage::ImageRgba16(buf) => (3, DynamicImage::ImageRgba16(buf).to_rgb16().into_raw()),
        other => {
            return Err(RasterError::UnsupportedLayout(format!("{:?}", other.color())));
        }
    };

    Raster::new(width, height, channels, samples)
        .map_err(|e| RasterError::UnsupportedLayout(e.to_string()))
}

/// Fetch `key` and keep every `decimation`-th row and column.
pub async fn read_raster(
    store: &dyn ObjectStore,
    key: &str,
    decimation: u32,
) -> Result<Raster, RasterError> {
    if decimation == 0 {
        return Err(RasterError::InvalidDecimation);
    }

    let bytes = store.get_object(key).await?;
    let raster = decode_raster(&bytes)?;
    tracing::debug!(
        key,
        width = raster.width(),
        height = raster.height(),
        channels = raster.channels(),
        decimation,
        "Decoded raster"
    );

    Ok(raster.decimate(decimation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, Rgb};
    use std::io::Cursor;

    fn encode(image: DynamicImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Tiff).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decodes_16bit_gray() {
        let buf: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_fn(4, 2, |x, y| Luma([(y * 4 + x) as u16 * 1000]));
        let raster = decode_raster(&encode(DynamicImage::ImageLuma16(buf))).unwrap();

        assert_eq!((raster.width(), raster.height(), raster.channels()), (4, 2, 1));
        assert_eq!(raster.samples()[5], 5000);
    }

    #[test]
    fn test_decodes_8bit_rgb() {
        let buf: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(2, 2, Rgb([10, 20, 30]));
        let raster = decode_raster(&encode(DynamicImage::ImageRgb8(buf))).unwrap();

        assert_eq!(raster.channels(), 3);
        assert_eq!(&raster.samples()[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_rejects_non_tiff_bytes() {
        assert!(matches!(
            decode_raster(b"definitely not a tiff"),
            Err(RasterError::Decode(_))
        ));
    }
}
