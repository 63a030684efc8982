use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use auto_video::api::{HttpImageClient, ImageService, TextClient, DEFAULT_API_BASE};
use auto_video::job::{FileJobStore, JobStore, MemoryJobStore};
use auto_video::scene::{split_sections, TrailingScene};
use auto_video::video::FfmpegEngine;
use auto_video::{Pipeline, PipelineConfig};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "auto-video")]
#[command(about = "Turn a generated script into a slideshow video", long_about = None)]
struct Args {
    /// Topic to generate a script for
    #[arg(short, long, conflicts_with = "file")]
    topic: Option<String>,

    /// File with pre-generated content (SCRIPT / VISUAL SCENES sections)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Output video file path
    #[arg(short, long, default_value = "output.mp4")]
    output: PathBuf,

    /// Directory for job records; jobs are kept in memory when omitted
    #[arg(long, env = "AUTO_VIDEO_JOB_DIR")]
    job_dir: Option<PathBuf>,

    /// Print a job record from --job-dir and exit
    #[arg(long, requires = "job_dir")]
    show_job: Option<Uuid>,

    /// Skip the image service and render placeholder frames
    #[arg(long)]
    placeholders: bool,

    /// Drop a trailing scene that has no visual description
    #[arg(long)]
    strict_trailing: bool,

    /// Pause between image requests, in milliseconds
    #[arg(long, default_value_t = 2000)]
    scene_delay_ms: u64,

    /// API key for the text and image services
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "AUTO_VIDEO_API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,

    #[arg(long, env = "AUTO_VIDEO_TEXT_MODEL", default_value = "gpt-4o-mini")]
    text_model: String,

    #[arg(long, env = "AUTO_VIDEO_IMAGE_MODEL", default_value = "dall-e-3")]
    image_model: String,

    /// FFmpeg binary
    #[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// TrueType font for placeholder captions
    #[arg(long, env = "AUTO_VIDEO_FONT")]
    font: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    let args = Args::parse();

    let store: Arc<dyn JobStore> = match &args.job_dir {
        Some(dir) => Arc::new(
            FileJobStore::open(dir)
                .await
                .with_context(|| format!("Failed to open job directory {}", dir.display()))?,
        ),
        None => Arc::new(MemoryJobStore::new()),
    };

    if let Some(id) = args.show_job {
        let job = store
            .get(id)
            .await?
            .with_context(|| format!("No job {}", id))?;
        println!("{}", serde_json::to_string_pretty(&job)?);
        return Ok(());
    }

    let config = PipelineConfig {
        scene_delay: Duration::from_millis(args.scene_delay_ms),
        font_path: args.font.clone(),
        parse: auto_video::scene::ParseOptions {
            trailing: if args.strict_trailing {
                TrailingScene::RequireVisual
            } else {
                TrailingScene::Keep
            },
        },
        ..PipelineConfig::default()
    };

    let content = load_content(&args, &config).await?;
    let sections = split_sections(&content);
    if !sections.music_recommendations.is_empty() {
        info!("Music recommendations:\n{}", sections.music_recommendations);
    }
    if !sections.thumbnail_concept.is_empty() {
        info!("Thumbnail concept:\n{}", sections.thumbnail_concept);
    }

    let service: Option<Arc<dyn ImageService>> = match (&args.api_key, args.placeholders) {
        (_, true) => None,
        (Some(key), false) => Some(Arc::new(HttpImageClient::new(
            key.clone(),
            &args.api_base,
            args.image_model.clone(),
            config.image_size(),
        )?)),
        (None, false) => {
            warn!("OPENAI_API_KEY not set; rendering placeholder images");
            None
        }
    };

    let engine = Arc::new(FfmpegEngine::new(&args.ffmpeg));
    let pipeline = Pipeline::new(&config, service, engine, Arc::clone(&store));

    let job = store.create(0).await?;
    info!("Created job {}", job.id);
    let reporter = pipeline.reporter(job.id);

    let artifact = pipeline
        .run_content(&reporter, &sections)
        .await
        .with_context(|| format!("Video generation failed (job {})", job.id))?;

    tokio::fs::write(&args.output, &artifact.bytes)
        .await
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    info!(
        "Wrote {} ({} bytes, {}s, {})",
        args.output.display(),
        artifact.bytes.len(),
        artifact.duration_secs,
        artifact.content_type
    );
    println!("{}", job.id);
    Ok(())
}

async fn load_content(args: &Args, config: &PipelineConfig) -> anyhow::Result<String> {
    if let Some(path) = &args.file {
        return tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read file: {}", path.display()));
    }

    let Some(topic) = &args.topic else {
        bail!("Either --topic or --file must be provided");
    };
    let Some(api_key) = &args.api_key else {
        bail!("OPENAI_API_KEY is required to generate a script from --topic");
    };

    let client = TextClient::new(
        api_key.clone(),
        &args.api_base,
        args.text_model.clone(),
        config.retry.clone(),
    )?;
    Ok(client.generate_content(topic, 60).await?)
}
