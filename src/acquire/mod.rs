use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;
use tracing::{info, warn};

use crate::api::{ImagePayload, ImageService};
use crate::error::{Result, VideoError};
use crate::progress::{ProgressReporter, ACQUISITION};
use crate::scene::Scene;

mod placeholder;
mod retry;

pub use placeholder::{truncate, PlaceholderCaption, PlaceholderRenderer, MAX_CAPTION_CHARS};
pub use retry::RetryPolicy;

pub const DEFAULT_PROMPT_TEMPLATE: &str = "Create a high-quality, cinematic still image for a video scene. \
No text, captions or watermarks. Scene: {description}";

/// Where an acquired image came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageOrigin {
    Generated,
    Placeholder { title: String, description: String },
}

/// The image for one scene, ready for assembly.
#[derive(Debug, Clone, Serialize)]
pub struct AcquiredImage {
    pub scene_index: usize,
    pub payload: ImagePayload,
    pub origin: ImageOrigin,
}

/// Obtains one image per scene, remotely when possible.
pub struct Orchestrator {
    service: Option<Arc<dyn ImageService>>,
    placeholder: PlaceholderRenderer,
    retry: RetryPolicy,
    scene_delay: Duration,
    prompt_template: String,
}

impl Orchestrator {
    pub fn new(service: Option<Arc<dyn ImageService>>, placeholder: PlaceholderRenderer) -> Self {
        Self {
            service,
            placeholder,
            retry: RetryPolicy::default(),
            scene_delay: Duration::from_secs(2),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Pause between consecutive successful requests.
    pub fn with_scene_delay(mut self, delay: Duration) -> Self {
        self.scene_delay = delay;
        self
    }

    /// `{description}` in the template is replaced by the scene description.
    pub fn with_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = template.into();
        self
    }

    pub fn prompt_for(&self, scene: &Scene) -> String {
        self.prompt_template
            .replace("{description}", &scene.visual_description)
    }

    /// Acquire exactly one image per scene, in scene order.
    ///
    /// A quota or payment failure from the service switches the whole run to
    /// placeholders. Any other failure left after retries aborts the run.
    pub async fn acquire(
        &self,
        scenes: &[Scene],
        progress: &ProgressReporter,
    ) -> Result<Vec<AcquiredImage>> {
        let Some(service) = &self.service else {
            info!("No image service configured, using placeholders");
            return self.placeholders(scenes, progress).await;
        };

        let total = scenes.len();
        let mut images = Vec::with_capacity(total);

        for (idx, scene) in scenes.iter().enumerate() {
            let prompt = self.prompt_for(scene);
            let label = format!("Image for scene {}", scene.index + 1);

            match self.retry.run(&label, || service.generate(&prompt)).await {
                Ok(payload) => {
                    images.push(AcquiredImage {
                        scene_index: scene.index,
                        payload,
                        origin: ImageOrigin::Generated,
                    });
                    progress
                        .report_scenes(
                            format!("Generated image {}/{}", idx + 1, total),
                            ACQUISITION.at(idx + 1, total),
                            idx + 1,
                        )
                        .await;

                    if idx + 1 < total && !self.scene_delay.is_zero() {
                        tokio::time::sleep(self.scene_delay).await;
                    }
                }
                Err(e) if e.is_quota() => {
                    warn!(
                        "Image service quota exhausted at scene {}: {}; falling back to placeholders",
                        scene.index + 1,
                        e
                    );
                    return self.placeholders(scenes, progress).await;
                }
                Err(e) => {
                    return Err(VideoError::ImageService {
                        scene: scene.index,
                        source: e,
                    });
                }
            }
        }

        Ok(images)
    }

    async fn placeholders(
        &self,
        scenes: &[Scene],
        progress: &ProgressReporter,
    ) -> Result<Vec<AcquiredImage>> {
        let total = scenes.len();
        let mut images = Vec::with_capacity(total);

        for (idx, scene) in scenes.iter().enumerate() {
            let png = self.placeholder.render_png(scene)?;
            let caption = PlaceholderCaption::for_scene(scene);
            images.push(AcquiredImage {
                scene_index: scene.index,
                payload: ImagePayload::Base64(STANDARD.encode(png)),
                origin: ImageOrigin::Placeholder {
                    title: caption.title,
                    description: caption.description,
                },
            });
            progress
                .report_scenes(
                    format!("Created placeholder {}/{}", idx + 1, total),
                    ACQUISITION.at(idx + 1, total),
                    idx + 1,
                )
                .await;
        }

        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;
    use crate::error::ServiceError;
    use crate::job::{JobStore, MemoryJobStore};

    struct ScriptedService {
        responses: Mutex<VecDeque<std::result::Result<ImagePayload, ServiceError>>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedService {
        fn new(responses: Vec<std::result::Result<ImagePayload, ServiceError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ImageService for ScriptedService {
        async fn generate(
            &self,
            _prompt: &str,
        ) -> std::result::Result<ImagePayload, ServiceError> {
            self.calls.lock().unwrap().push(Instant::now());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ImagePayload::Url("https://example.com/a.png".into())))
        }
    }

    fn scenes(count: usize) -> Vec<Scene> {
        (0..count)
            .map(|i| {
                Scene::new(
                    i,
                    format!("00:{:02}", i * 5),
                    "narration".into(),
                    "A wide mountain valley under clouds".into(),
                )
            })
            .collect()
    }

    async fn reporter() -> ProgressReporter {
        let store = Arc::new(MemoryJobStore::new());
        let job = store.create(0).await.unwrap();
        ProgressReporter::new(job.id, store)
    }

    fn orchestrator(service: Arc<ScriptedService>) -> Orchestrator {
        Orchestrator::new(
            Some(service as Arc<dyn ImageService>),
            PlaceholderRenderer::new(16, 9, None),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_between_successful_scenes() {
        let service = ScriptedService::new(vec![]);
        let orchestrator = orchestrator(service.clone());
        let reporter = reporter().await;

        let start = Instant::now();
        let images = orchestrator.acquire(&scenes(3), &reporter).await.unwrap();

        assert_eq!(images.len(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(4));
        let calls = service.calls.lock().unwrap();
        assert_eq!(calls[1] - calls[0], Duration::from_secs(2));
        assert_eq!(calls[2] - calls[1], Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn single_scene_does_not_pause() {
        let service = ScriptedService::new(vec![]);
        let orchestrator = orchestrator(service);
        let reporter = reporter().await;

        let start = Instant::now();
        orchestrator.acquire(&scenes(1), &reporter).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_out_rate_limits_before_retrying() {
        let limited = || Err(ServiceError::from_response(429, "Too Many Requests"));
        let service = ScriptedService::new(vec![limited(), limited()]);
        let orchestrator = orchestrator(service.clone());
        let reporter = reporter().await;

        let start = Instant::now();
        let images = orchestrator.acquire(&scenes(1), &reporter).await.unwrap();

        assert_eq!(images[0].origin, ImageOrigin::Generated);
        let calls = service.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1] - calls[0], Duration::from_secs(5));
        assert_eq!(calls[2] - calls[1], Duration::from_secs(10));
        assert_eq!(start.elapsed(), Duration::from_secs(15));
    }
}
