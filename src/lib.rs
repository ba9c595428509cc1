//! Earth-observation processing client
//!
//! This library drives remote raster-processing jobs (cloud removal, mosaics,
//! band math) through their lifecycle: search the input collection, submit,
//! poll until terminal, export to object storage, and render previews of the
//! exported tiles.

pub mod app_state;
pub mod config;
pub mod models;
pub mod services;
