use serde::{Deserialize, Serialize};

mod parser;
mod sections;

pub use parser::{parse, parse_with, ParseOptions, TrailingScene, DEFAULT_VISUAL_DESCRIPTION};
pub use sections::{split_sections, GeneratedContent};

/// Every scene is shown for the same fixed time.
pub const SCENE_DURATION_SECS: u32 = 5;

/// One timestamped narration + visual unit of the output video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    /// Position in the video, contiguous from 0
    pub index: usize,
    /// `MM:SS` stamp of the boundary that opened the scene
    pub timestamp: String,
    /// Narration spoken during the scene
    pub text: String,
    /// Prompt used to illustrate the scene
    pub visual_description: String,
    pub duration_secs: u32,
}

impl Scene {
    pub fn new(index: usize, timestamp: String, text: String, visual_description: String) -> Self {
        Self {
            index,
            timestamp,
            text,
            visual_description,
            duration_secs: SCENE_DURATION_SECS,
        }
    }
}
