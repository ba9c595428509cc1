//! Sample inputs and synthetic raster tiles.
#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb};
use std::io::Cursor;

use geoproc_client::models::request::{
    BandMathConfig, CloudRemovalConfig, InputSpec, JobConfig, JobPlan, PlannedJob, Polygon,
    RenderPlan, TimeRange,
};

/// Area of interest around Lake Mead, four months of 2022, at most 20 % cloud.
pub fn sample_input() -> InputSpec {
    InputSpec {
        collection: "arn:collection/sentinel-2-l2a".to_string(),
        area: Polygon::from_ring(vec![
            [-114.529, 36.142],
            [-114.373, 36.142],
            [-114.373, 36.411],
            [-114.529, 36.411],
        ]),
        time_range: TimeRange {
            start: Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2022, 5, 1, 0, 0, 0).unwrap(),
        },
        max_cloud_cover: Some(20.0),
    }
}

pub fn cloud_removal() -> JobConfig {
    JobConfig::CloudRemoval(CloudRemovalConfig {
        algorithm: "INTERPOLATION".to_string(),
        interpolation_value: Some("-9999".to_string()),
        target_bands: vec!["red".to_string(), "green".to_string(), "blue".to_string()],
    })
}

pub fn ndvi() -> JobConfig {
    JobConfig::BandMath(BandMathConfig {
        predefined_indices: vec!["NDVI".to_string()],
        custom_indices: vec![],
    })
}

pub fn sample_plan(render: Option<RenderPlan>) -> JobPlan {
    JobPlan {
        input: sample_input(),
        jobs: vec![
            PlannedJob {
                name: "cloud-free".to_string(),
                config: cloud_removal(),
            },
            PlannedJob {
                name: "ndvi".to_string(),
                config: ndvi(),
            },
        ],
        export_prefix: "exports".to_string(),
        search_first: false,
        render,
    }
}

/// 16-bit single-band tile filled with `value`.
pub fn reflectance_tile(width: u32, height: u32, value: u16) -> Vec<u8> {
    let buf: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_pixel(width, height, Luma([value]));
    encode_tiff(DynamicImage::ImageLuma16(buf))
}

/// 8-bit RGB true-colour tile.
pub fn true_color_tile(width: u32, height: u32) -> Vec<u8> {
    let buf: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
    encode_tiff(DynamicImage::ImageRgb8(buf))
}

fn encode_tiff(image: DynamicImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Tiff)
        .expect("encode TIFF fixture");
    out.into_inner()
}
