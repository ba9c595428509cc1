use serde::Serialize;

/// Divisor that turns stored integer samples into surface reflectance.
pub const REFLECTANCE_SCALE: f32 = 10_000.0;

/// Upper clip applied after rescaling.
pub const REFLECTANCE_MAX: f32 = 1.0;

/// Band names that identify the pre-rendered true-colour composite.
const TRUE_COLOR_BANDS: &[&str] = &["tci", "visual"];

/// Sample buffer length does not match the declared dimensions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{width}x{height}x{channels} raster needs {expected} samples, got {actual}")]
pub struct SampleCountError {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub expected: usize,
    pub actual: usize,
}

/// Decoded raster samples, row-major and channel-interleaved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Raster {
    width: u32,
    height: u32,
    channels: u8,
    samples: Vec<u16>,
}

impl Raster {
    pub fn new(
        width: u32,
        height: u32,
        channels: u8,
        samples: Vec<u16>,
    ) -> Result<Self, SampleCountError> {
        let expected = width as usize * height as usize * channels as usize;
        if samples.len() != expected {
            return Err(SampleCountError {
                width,
                height,
                channels,
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            samples,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    /// Keep every `factor`-th row and column. `factor` must be at least 1.
    pub fn decimate(&self, factor: u32) -> Raster {
        if factor <= 1 {
            return self.clone();
        }

        let width = self.width.div_ceil(factor);
        let height = self.height.div_ceil(factor);
        let channels = self.channels as usize;
        let mut samples = Vec::with_capacity(width as usize * height as usize * channels);

        for y in (0..self.height).step_by(factor as usize) {
            for x in (0..self.width).step_by(factor as usize) {
                let offset = (y as usize * self.width as usize + x as usize) * channels;
                samples.extend_from_slice(&self.samples[offset..offset + channels]);
            }
        }

        // Length holds by construction: one pixel per kept (row, column).
        Raster {
            width,
            height,
            channels: self.channels,
            samples,
        }
    }

    /// Rescale every sample to reflectance.
    pub fn to_reflectance(&self, scale: f32) -> Vec<f32> {
        self.samples
            .iter()
            .map(|&v| rescale_reflectance(v, scale))
            .collect()
    }

    /// 8-bit samples for display. Non-composite bands go through reflectance first.
    pub fn to_display(&self, band: &str, scale: f32) -> Vec<u8> {
        if is_true_color(band) {
            let max = self.samples.iter().copied().max().unwrap_or(0);
            if max <= u8::MAX as u16 {
                self.samples.iter().map(|&v| v as u8).collect()
            } else {
                // 16-bit composite: keep the high byte.
                self.samples.iter().map(|&v| (v >> 8) as u8).collect()
            }
        } else {
            self.samples
                .iter()
                .map(|&v| (rescale_reflectance(v, scale) * 255.0).round() as u8)
                .collect()
        }
    }
}

/// Integer sample to reflectance: divide by `scale`, clip at 1.0.
pub fn rescale_reflectance(value: u16, scale: f32) -> f32 {
    (value as f32 / scale).min(REFLECTANCE_MAX)
}

/// Whether `band` names the pre-rendered true-colour composite.
pub fn is_true_color(band: &str) -> bool {
    let band = band.to_ascii_lowercase();
    TRUE_COLOR_BANDS.iter().any(|b| band.contains(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rescale_clips_above_one() {
        assert_eq!(rescale_reflectance(12_000, REFLECTANCE_SCALE), 1.0);
        assert!((rescale_reflectance(4_000, REFLECTANCE_SCALE) - 0.4).abs() < 1e-6);
        assert_eq!(rescale_reflectance(0, REFLECTANCE_SCALE), 0.0);
        assert_eq!(rescale_reflectance(10_000, REFLECTANCE_SCALE), 1.0);
    }

    #[test]
    fn test_decimate_keeps_every_nth_pixel() {
        // 4x3 single-channel raster with sample = y * 10 + x
        let samples = (0..3u16)
            .flat_map(|y| (0..4u16).map(move |x| y * 10 + x))
            .collect();
        let raster = Raster::new(4, 3, 1, samples).unwrap();

        let small = raster.decimate(2);
        assert_eq!(small.width(), 2);
        assert_eq!(small.height(), 2);
        assert_eq!(small.samples(), vec![0, 2, 20, 22]);

        assert_eq!(raster.decimate(1), raster);
    }

    #[test]
    fn test_decimate_multichannel() {
        let samples = vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        let raster = Raster::new(2, 2, 3, samples).unwrap();
        let small = raster.decimate(2);
        assert_eq!(small.width(), 1);
        assert_eq!(small.height(), 1);
        assert_eq!(small.samples(), vec![1, 2, 3]);
    }

    #[test]
    fn test_display_rescales_spectral_bands_only() {
        let raster = Raster::new(3, 1, 1, vec![12_000, 4_000, 0]).unwrap();
        assert_eq!(raster.to_display("B08", REFLECTANCE_SCALE), vec![255, 102, 0]);

        let tci = Raster::new(3, 1, 1, vec![200, 100, 0]).unwrap();
        assert_eq!(tci.to_display("TCI", REFLECTANCE_SCALE), vec![200, 100, 0]);
    }

    #[test]
    fn test_new_rejects_short_sample_buffer() {
        let err = Raster::new(4, 4, 3, vec![0; 10]).unwrap_err();
        assert_eq!(err.expected, 48);
        assert_eq!(err.actual, 10);
        assert!(Raster::new(0, 0, 1, Vec::new()).is_ok());
    }

    #[test]
    fn test_true_color_detection() {
        assert!(is_true_color("TCI"));
        assert!(is_true_color("visual"));
        assert!(!is_true_color("nir"));
        assert!(!is_true_color("ndvi"));
    }
}
