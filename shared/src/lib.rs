pub mod cancellation;
pub mod configuration;
pub mod errors;
pub mod frames;
pub mod jobs;
pub mod logging;
pub mod storage;
pub mod tools;
