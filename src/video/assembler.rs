use std::io::Cursor;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::imageops::FilterType;
use image::ImageFormat;
use reqwest::Client;
use tracing::info;

use super::engine::{EncodeRecipe, TranscodeEngine};
use crate::acquire::AcquiredImage;
use crate::api::ImagePayload;
use crate::error::{Result, VideoError};
use crate::progress::{ProgressReporter, ENCODE, ENGINE_LOAD, ENGINE_WRITE, FINALIZE};

/// Encoded output handed back to the caller.
#[derive(Debug, Clone)]
pub struct VideoArtifact {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub duration_secs: u32,
}

/// Turns an ordered image set into a fixed-rate slideshow.
pub struct Assembler {
    engine: Arc<dyn TranscodeEngine>,
    http: Client,
    frame_size: (u32, u32),
    codec: String,
    pixel_format: String,
}

impl Assembler {
    pub fn new(engine: Arc<dyn TranscodeEngine>, frame_size: (u32, u32)) -> Self {
        Self {
            engine,
            http: Client::new(),
            frame_size,
            codec: "libx264".to_string(),
            pixel_format: "yuv420p".to_string(),
        }
    }

    pub fn with_codec(mut self, codec: impl Into<String>, pixel_format: impl Into<String>) -> Self {
        self.codec = codec.into();
        self.pixel_format = pixel_format.into();
        self
    }

    pub fn recipe(&self, scene_count: usize, scene_duration_secs: u32) -> Result<EncodeRecipe> {
        Ok(EncodeRecipe {
            codec: self.codec.clone(),
            pixel_format: self.pixel_format.clone(),
            ..EncodeRecipe::slideshow(scene_count, scene_duration_secs)?
        })
    }

    /// Encode `images` as a slideshow, `scene_duration_secs` per image.
    ///
    /// Images must cover scene indices `0..n` exactly once; frame names in the
    /// engine workspace follow the scene index, which fixes playback order.
    pub async fn assemble(
        &self,
        images: &[AcquiredImage],
        scene_duration_secs: u32,
        progress: &ProgressReporter,
    ) -> Result<VideoArtifact> {
        let ordered = ordered_images(images)?;
        let total = ordered.len();
        let recipe = self.recipe(total, scene_duration_secs)?;

        progress
            .report("Loading video engine", ENGINE_LOAD.start)
            .await;
        let mut session = self.engine.load().await?;
        progress.report("Video engine ready", ENGINE_LOAD.end).await;

        for (idx, image) in ordered.iter().enumerate() {
            let raw = self.fetch(&image.payload).await?;
            let frame = normalize_frame(raw, self.frame_size).await?;
            session
                .write_file(&EncodeRecipe::frame_name(image.scene_index), &frame)
                .await?;
            progress
                .report(
                    format!("Prepared frame {}/{}", idx + 1, total),
                    ENGINE_WRITE.at(idx + 1, total),
                )
                .await;
        }

        progress.report("Encoding video", ENCODE.start).await;
        session.exec(&recipe).await?;

        progress.report("Finalizing video", FINALIZE).await;
        let bytes = session.read_file(&recipe.output).await?;
        drop(session);

        if bytes.is_empty() {
            return Err(VideoError::EngineError(
                "Engine produced an empty video".to_string(),
            ));
        }

        info!(
            "Assembled {} scenes into {} bytes ({}s)",
            total,
            bytes.len(),
            recipe.duration_secs
        );
        Ok(VideoArtifact {
            bytes,
            content_type: "video/mp4",
            duration_secs: recipe.duration_secs,
        })
    }

    async fn fetch(&self, payload: &ImagePayload) -> Result<Vec<u8>> {
        match payload {
            ImagePayload::Base64(data) => Ok(STANDARD.decode(strip_data_url(data))?),
            ImagePayload::Url(url) => {
                let response = self.http.get(url).send().await?.error_for_status()?;
                Ok(response.bytes().await?.to_vec())
            }
        }
    }
}

/// Sort by scene index and reject anything but a complete `0..n` set.
fn ordered_images(images: &[AcquiredImage]) -> Result<Vec<&AcquiredImage>> {
    if images.is_empty() {
        return Err(VideoError::IncompleteImages {
            expected: 1,
            actual: 0,
        });
    }

    let mut ordered: Vec<&AcquiredImage> = images.iter().collect();
    ordered.sort_by_key(|image| image.scene_index);

    let contiguous = ordered
        .iter()
        .enumerate()
        .all(|(idx, image)| image.scene_index == idx);
    if !contiguous {
        let expected = ordered
            .last()
            .map(|image| image.scene_index + 1)
            .unwrap_or_default()
            .max(images.len());
        return Err(VideoError::IncompleteImages {
            expected,
            actual: images.len(),
        });
    }

    Ok(ordered)
}

fn strip_data_url(data: &str) -> &str {
    match data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    }
}

/// Decode any supported raster and re-encode it as PNG at the frame size.
async fn normalize_frame(raw: Vec<u8>, (width, height): (u32, u32)) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
        let decoded = image::load_from_memory(&raw)?;
        let frame = if decoded.width() == width && decoded.height() == height {
            decoded
        } else {
            decoded.resize_to_fill(width, height, FilterType::Triangle)
        };

        let mut png = Vec::new();
        frame
            .to_rgb8()
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(png)
    })
    .await
    .map_err(|e| VideoError::EngineError(format!("Frame preparation task failed: {}", e)))?
}
