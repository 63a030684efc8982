use std::path::PathBuf;
use std::time::Duration;

use crate::acquire::{RetryPolicy, DEFAULT_PROMPT_TEMPLATE};
use crate::scene::{ParseOptions, SCENE_DURATION_SECS};

/// Tunables for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub scene_duration_secs: u32,
    pub parse: ParseOptions,
    pub retry: RetryPolicy,
    /// Pause between successful image requests
    pub scene_delay: Duration,
    pub prompt_template: String,
    /// Frame size for placeholders and the encoded video
    pub frame_width: u32,
    pub frame_height: u32,
    pub font_path: Option<PathBuf>,
    pub codec: String,
    pub pixel_format: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scene_duration_secs: SCENE_DURATION_SECS,
            parse: ParseOptions::default(),
            retry: RetryPolicy::default(),
            scene_delay: Duration::from_secs(2),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            frame_width: 1280,
            frame_height: 720,
            font_path: None,
            codec: "libx264".to_string(),
            pixel_format: "yuv420p".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn frame_size(&self) -> (u32, u32) {
        (self.frame_width, self.frame_height)
    }

    /// Image generation size string understood by the remote service.
    pub fn image_size(&self) -> String {
        format!("{}x{}", self.frame_width, self.frame_height)
    }
}
