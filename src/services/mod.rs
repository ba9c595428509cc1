pub mod export;
pub mod poller;
pub mod processing;
pub mod raster;
pub mod retry;
pub mod storage;
pub mod visualize;
pub mod workflow;
