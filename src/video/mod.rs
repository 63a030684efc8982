mod assembler;
mod engine;

pub use assembler::{Assembler, VideoArtifact};
pub use engine::{EncodeRecipe, EngineSession, FfmpegEngine, TranscodeEngine};
