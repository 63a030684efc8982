mod common;

use std::sync::Arc;

use auto_video::acquire::{AcquiredImage, ImageOrigin};
use auto_video::api::ImagePayload;
use auto_video::job::{FileJobStore, JobStatus, JobStore, MemoryJobStore};
use auto_video::progress::ProgressReporter;
use auto_video::scene::split_sections;
use auto_video::video::Assembler;
use auto_video::{Pipeline, VideoError};
use common::*;

fn images(count: usize) -> Vec<AcquiredImage> {
    (0..count)
        .map(|scene_index| AcquiredImage {
            scene_index,
            payload: ImagePayload::Base64(png_base64()),
            origin: ImageOrigin::Generated,
        })
        .collect()
}

#[tokio::test]
async fn reassembling_the_same_images_is_stable() {
    let engine = FakeEngine::default();
    let assembler = Assembler::new(Arc::new(engine.clone()), (64, 36));
    let store = Arc::new(MemoryJobStore::new());
    let job = store.create(4).await.unwrap();
    let reporter = ProgressReporter::new(job.id, store);

    let mut set = images(4);
    set.reverse();

    let first = assembler.assemble(&set, 5, &reporter).await.unwrap();
    let second = assembler.assemble(&set, 5, &reporter).await.unwrap();

    assert_eq!(first.duration_secs, 20);
    assert_eq!(first.bytes, second.bytes);

    let log = engine.log.lock().unwrap();
    assert_eq!(log.loads, 2);
    assert_eq!(log.recipes[0], log.recipes[1]);
    assert_eq!(log.recipes[0].duration_secs, 4 * 5);
    // frames are registered in scene order even when handed over reversed
    assert_eq!(
        &log.written[..4],
        ["scene_000.png", "scene_001.png", "scene_002.png", "scene_003.png"]
    );
}

#[tokio::test]
async fn partial_image_sets_are_rejected_before_loading() {
    let engine = FakeEngine::default();
    let assembler = Assembler::new(Arc::new(engine.clone()), (64, 36));
    let store = Arc::new(MemoryJobStore::new());
    let job = store.create(3).await.unwrap();
    let reporter = ProgressReporter::new(job.id, store);

    let mut set = images(3);
    set.remove(1);

    let err = assembler.assemble(&set, 5, &reporter).await.unwrap_err();
    assert!(matches!(
        err,
        VideoError::IncompleteImages {
            expected: 3,
            actual: 2
        }
    ));
    assert_eq!(engine.log.lock().unwrap().loads, 0);
}

#[tokio::test]
async fn zero_scene_duration_is_rejected_before_loading() {
    let engine = FakeEngine::default();
    let assembler = Assembler::new(Arc::new(engine.clone()), (64, 36));
    let store = Arc::new(MemoryJobStore::new());
    let job = store.create(2).await.unwrap();
    let reporter = ProgressReporter::new(job.id, store);

    let err = assembler
        .assemble(&images(2), 0, &reporter)
        .await
        .unwrap_err();
    assert!(matches!(err, VideoError::EngineError(_)));
    assert_eq!(engine.log.lock().unwrap().loads, 0);
}

#[tokio::test]
async fn undecodable_payload_fails_assembly() {
    let engine = FakeEngine::default();
    let assembler = Assembler::new(Arc::new(engine), (64, 36));
    let store = Arc::new(MemoryJobStore::new());
    let job = store.create(1).await.unwrap();
    let reporter = ProgressReporter::new(job.id, store);

    let set = vec![AcquiredImage {
        scene_index: 0,
        payload: ImagePayload::Base64("not base64!".into()),
        origin: ImageOrigin::Generated,
    }];

    let err = assembler.assemble(&set, 5, &reporter).await.unwrap_err();
    assert!(matches!(err, VideoError::Base64Error(_)));
}

#[tokio::test]
async fn generated_content_runs_against_a_file_job_store() {
    let content = format!(
        "Here is your video.\n\n## SCRIPT\n{}\n## VISUAL SCENES\n{}\n## MUSIC RECOMMENDATIONS\nAmbient synths\n\n## THUMBNAIL CONCEPT\nA skyline\n",
        SCRIPT, VISUALS
    );
    let sections = split_sections(&content);

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileJobStore::open(dir.path()).await.unwrap());
    let pipeline = Pipeline::new(
        &test_config(),
        None,
        Arc::new(FakeEngine::default()),
        store.clone(),
    );

    let job = store.create(0).await.unwrap();
    let reporter = pipeline.reporter(job.id);
    let artifact = pipeline.run_content(&reporter, &sections).await.unwrap();
    assert_eq!(artifact.duration_secs, 15);

    // another reader of the same directory sees the terminal record
    let observer = FileJobStore::open(dir.path()).await.unwrap();
    let stored = observer.get(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.progress, 100);
    assert_eq!(stored.current_step, "Complete");
    assert!(stored.error_message.is_none());
}
