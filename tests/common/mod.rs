#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use auto_video::api::{ImagePayload, ImageService};
use auto_video::job::{Job, JobStatus, JobStore, JobUpdate, MemoryJobStore};
use auto_video::video::{EncodeRecipe, EngineSession, TranscodeEngine};
use auto_video::{PipelineConfig, Result, ServiceError, VideoError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use uuid::Uuid;

pub const SCRIPT: &str = "\
[00:00] Dawn breaks over the city.
[00:05] Commuters fill the streets.
[00:10] The lights come on at night.
";

pub const VISUALS: &str = "\
*   **Visuals:** A city skyline at dawn, soft orange light
*   **B-roll:** Busy street traffic seen from above
*   **Visuals:** The same skyline at night, glowing windows and neon signs reflecting on the river
";

pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        retry: auto_video::acquire::RetryPolicy::no_delay(3),
        scene_delay: std::time::Duration::ZERO,
        frame_width: 64,
        frame_height: 36,
        font_path: Some("/nonexistent/font.ttf".into()),
        ..PipelineConfig::default()
    }
}

pub fn png_base64() -> String {
    let image = image::RgbImage::from_pixel(8, 8, image::Rgb([10, 120, 200]));
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    STANDARD.encode(png)
}

/// Image service answering from a script of responses, then succeeding.
pub struct FakeImageService {
    responses: Mutex<VecDeque<std::result::Result<ImagePayload, ServiceError>>>,
    pub prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl FakeImageService {
    pub fn new(responses: Vec<std::result::Result<ImagePayload, ServiceError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageService for FakeImageService {
    async fn generate(&self, prompt: &str) -> std::result::Result<ImagePayload, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.responses.lock().unwrap().pop_front() {
            Some(response) => response,
            None => Ok(ImagePayload::Base64(png_base64())),
        }
    }
}

#[derive(Default)]
pub struct EngineLog {
    pub loads: usize,
    pub written: Vec<String>,
    pub recipes: Vec<EncodeRecipe>,
}

/// In-memory transcoder that "encodes" by listing the frames it saw.
#[derive(Clone, Default)]
pub struct FakeEngine {
    pub log: Arc<Mutex<EngineLog>>,
    pub fail_exec: bool,
}

impl FakeEngine {
    pub fn failing() -> Self {
        Self {
            fail_exec: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl TranscodeEngine for FakeEngine {
    async fn load(&self) -> Result<Box<dyn EngineSession>> {
        self.log.lock().unwrap().loads += 1;
        Ok(Box::new(FakeSession {
            log: Arc::clone(&self.log),
            fail_exec: self.fail_exec,
            files: HashMap::new(),
        }))
    }
}

struct FakeSession {
    log: Arc<Mutex<EngineLog>>,
    fail_exec: bool,
    files: HashMap<String, Vec<u8>>,
}

#[async_trait]
impl EngineSession for FakeSession {
    async fn write_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.log.lock().unwrap().written.push(name.to_string());
        self.files.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn exec(&mut self, recipe: &EncodeRecipe) -> Result<()> {
        self.log.lock().unwrap().recipes.push(recipe.clone());
        if self.fail_exec {
            return Err(VideoError::EngineError("encoder crashed".into()));
        }
        let mut frames: Vec<&String> = self.files.keys().collect();
        frames.sort();
        let video = format!("{}s:{:?}", recipe.duration_secs, frames);
        self.files.insert(recipe.output.clone(), video.into_bytes());
        Ok(())
    }

    async fn read_file(&mut self, name: &str) -> Result<Vec<u8>> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| VideoError::EngineError(format!("missing {}", name)))
    }
}

/// Memory store that also remembers every progress value and status it accepted.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryJobStore,
    pub progress: Mutex<Vec<u8>>,
    pub statuses: Mutex<Vec<JobStatus>>,
}

#[async_trait]
impl JobStore for RecordingStore {
    async fn create(&self, total_scenes: usize) -> Result<Job> {
        self.inner.create(total_scenes).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>> {
        self.inner.get(id).await
    }

    async fn update(&self, id: Uuid, update: JobUpdate) -> Result<Job> {
        let job = self.inner.update(id, update).await?;
        self.progress.lock().unwrap().push(job.progress);
        let mut statuses = self.statuses.lock().unwrap();
        if statuses.last() != Some(&job.status) {
            statuses.push(job.status);
        }
        Ok(job)
    }
}
