use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Result, VideoError};

/// Fixed-rate slideshow encoding parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeRecipe {
    /// Input frame rate, e.g. `1/5` for one image every five seconds
    pub framerate: String,
    pub input_pattern: String,
    pub codec: String,
    pub pixel_format: String,
    pub duration_secs: u32,
    pub output: String,
}

impl EncodeRecipe {
    pub const INPUT_PATTERN: &'static str = "scene_%03d.png";
    pub const OUTPUT: &'static str = "output.mp4";

    pub fn slideshow(scene_count: usize, scene_duration_secs: u32) -> Result<Self> {
        if scene_count == 0 || scene_duration_secs == 0 {
            return Err(VideoError::EngineError(format!(
                "Cannot encode {} scenes of {}s",
                scene_count, scene_duration_secs
            )));
        }
        let duration_secs = u32::try_from(scene_count)
            .ok()
            .and_then(|count| count.checked_mul(scene_duration_secs))
            .ok_or_else(|| {
                VideoError::EngineError(format!(
                    "Video too long: {} scenes of {}s",
                    scene_count, scene_duration_secs
                ))
            })?;

        Ok(Self {
            framerate: format!("1/{}", scene_duration_secs),
            input_pattern: Self::INPUT_PATTERN.to_string(),
            codec: "libx264".to_string(),
            pixel_format: "yuv420p".to_string(),
            duration_secs,
            output: Self::OUTPUT.to_string(),
        })
    }

    /// File name for the frame at `index`, matching `INPUT_PATTERN`.
    pub fn frame_name(index: usize) -> String {
        format!("scene_{:03}.png", index)
    }

    pub fn to_args(&self) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-framerate".to_string(),
            self.framerate.clone(),
            "-i".to_string(),
            self.input_pattern.clone(),
            "-c:v".to_string(),
            self.codec.clone(),
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
            "-t".to_string(),
            self.duration_secs.to_string(),
            self.output.clone(),
        ]
    }
}

/// A transcoder that must be loaded before use.
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Initialise an instance. Dropping the session releases it.
    async fn load(&self) -> Result<Box<dyn EngineSession>>;
}

/// A loaded engine with its own working filesystem.
#[async_trait]
pub trait EngineSession: Send {
    async fn write_file(&mut self, name: &str, data: &[u8]) -> Result<()>;

    async fn exec(&mut self, recipe: &EncodeRecipe) -> Result<()>;

    async fn read_file(&mut self, name: &str) -> Result<Vec<u8>>;
}

/// Drives the system `ffmpeg` binary inside a scratch directory.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    binary: PathBuf,
}

impl FfmpegEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    async fn load(&self) -> Result<Box<dyn EngineSession>> {
        let output = Command::new(&self.binary)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                VideoError::EngineError(format!(
                    "Failed to run {}: {}",
                    self.binary.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(VideoError::EngineError(format!(
                "{} -version exited with {}",
                self.binary.display(),
                output.status
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout);
        info!(
            "Loaded {}",
            version.lines().next().unwrap_or("ffmpeg (unknown version)")
        );

        let workdir = tempfile::Builder::new().prefix("auto-video-").tempdir()?;
        debug!("Engine workspace: {}", workdir.path().display());

        Ok(Box::new(FfmpegSession {
            binary: self.binary.clone(),
            workdir,
        }))
    }
}

struct FfmpegSession {
    binary: PathBuf,
    workdir: TempDir,
}

impl FfmpegSession {
    fn path_for(&self, name: &str) -> Result<PathBuf> {
        let plain = Path::new(name)
            .file_name()
            .map(|n| n == name)
            .unwrap_or(false);
        if !plain {
            return Err(VideoError::EngineError(format!(
                "Invalid workspace file name: {}",
                name
            )));
        }
        Ok(self.workdir.path().join(name))
    }
}

#[async_trait]
impl EngineSession for FfmpegSession {
    async fn write_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.path_for(name)?;
        tokio::fs::write(&path, data).await?;
        Ok(())
    }

    async fn exec(&mut self, recipe: &EncodeRecipe) -> Result<()> {
        let args = recipe.to_args();
        debug!("Running {} {}", self.binary.display(), args.join(" "));

        let output = Command::new(&self.binary)
            .args(&args)
            .current_dir(self.workdir.path())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| VideoError::EngineError(format!("Failed to run FFmpeg: {}", e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = error.lines().rev().take(10).collect();
            return Err(VideoError::EngineError(format!(
                "FFmpeg encoding failed ({}): {}",
                output.status,
                tail.into_iter().rev().collect::<Vec<_>>().join("\n")
            )));
        }

        Ok(())
    }

    async fn read_file(&mut self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_for(name)?;
        Ok(tokio::fs::read(&path).await?)
    }
}
