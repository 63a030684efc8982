use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::acquire::{Orchestrator, PlaceholderRenderer};
use crate::api::ImageService;
use crate::config::PipelineConfig;
use crate::error::{Result, VideoError};
use crate::job::JobStore;
use crate::progress::{ProgressReporter, SETUP};
use crate::scene::{parse_with, GeneratedContent, ParseOptions};
use crate::video::{Assembler, TranscodeEngine, VideoArtifact};

/// Script -> scenes -> images -> video, with progress mirrored to a job record.
pub struct Pipeline {
    orchestrator: Orchestrator,
    assembler: Assembler,
    store: Arc<dyn JobStore>,
    parse: ParseOptions,
    scene_duration_secs: u32,
}

impl Pipeline {
    /// `service` may be `None` to render placeholders only.
    pub fn new(
        config: &PipelineConfig,
        service: Option<Arc<dyn ImageService>>,
        engine: Arc<dyn TranscodeEngine>,
        store: Arc<dyn JobStore>,
    ) -> Self {
        let placeholder = PlaceholderRenderer::new(
            config.frame_width,
            config.frame_height,
            config.font_path.as_deref(),
        );
        let orchestrator = Orchestrator::new(service, placeholder)
            .with_retry(config.retry.clone())
            .with_scene_delay(config.scene_delay)
            .with_prompt_template(config.prompt_template.clone());
        let assembler = Assembler::new(engine, config.frame_size())
            .with_codec(config.codec.clone(), config.pixel_format.clone());

        Self {
            orchestrator,
            assembler,
            store,
            parse: config.parse,
            scene_duration_secs: config.scene_duration_secs,
        }
    }

    pub fn store(&self) -> Arc<dyn JobStore> {
        Arc::clone(&self.store)
    }

    /// Reporter for an existing job. Subscribe to it before calling `run`.
    pub fn reporter(&self, job_id: Uuid) -> ProgressReporter {
        ProgressReporter::new(job_id, self.store())
    }

    pub async fn run_content(
        &self,
        reporter: &ProgressReporter,
        content: &GeneratedContent,
    ) -> Result<VideoArtifact> {
        self.run(reporter, &content.script, &content.visual_scenes)
            .await
    }

    /// Run the whole pipeline for the reporter's job.
    ///
    /// The job always ends up `completed` or `failed`; on failure the error is
    /// both recorded on the job and returned.
    pub async fn run(
        &self,
        reporter: &ProgressReporter,
        script: &str,
        visual_scenes: &str,
    ) -> Result<VideoArtifact> {
        match self.execute(reporter, script, visual_scenes).await {
            Ok(artifact) => {
                reporter.complete().await;
                info!("Job {} completed", reporter.job_id());
                Ok(artifact)
            }
            Err(e) => {
                error!("Job {} failed: {}", reporter.job_id(), e);
                reporter.fail(&e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        reporter: &ProgressReporter,
        script: &str,
        visual_scenes: &str,
    ) -> Result<VideoArtifact> {
        reporter.report("Parsing script", SETUP.start).await;
        let scenes = parse_with(script, visual_scenes, self.parse);
        if scenes.is_empty() {
            return Err(VideoError::NoScenes);
        }

        reporter.start(scenes.len()).await;
        reporter
            .report(format!("Parsed {} scenes", scenes.len()), SETUP.end)
            .await;

        let images = self.orchestrator.acquire(&scenes, reporter).await?;
        if images.len() != scenes.len() {
            return Err(VideoError::IncompleteImages {
                expected: scenes.len(),
                actual: images.len(),
            });
        }

        self.assembler
            .assemble(&images, self.scene_duration_secs, reporter)
            .await
    }
}
