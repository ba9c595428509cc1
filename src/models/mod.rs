pub mod job;
pub mod raster;
pub mod request;
pub mod scene;
