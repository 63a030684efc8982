pub mod acquire;
pub mod api;
pub mod config;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod progress;
pub mod scene;
pub mod video;

pub use config::PipelineConfig;
pub use error::{ErrorKind, Result, ServiceError, VideoError};
pub use pipeline::Pipeline;
