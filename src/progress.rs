use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use crate::job::{JobStatus, JobStore, JobUpdate};

/// A contiguous slice of the 0-100 progress range owned by one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressBand {
    pub start: u8,
    pub end: u8,
}

impl ProgressBand {
    pub const fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    /// Percentage after `done` of `total` units of this stage.
    pub fn at(&self, done: usize, total: usize) -> u8 {
        if total == 0 {
            return self.end;
        }
        let done = done.min(total);
        let span = (self.end - self.start) as usize;
        self.start + (span * done / total) as u8
    }
}

pub const SETUP: ProgressBand = ProgressBand::new(0, 10);
pub const ACQUISITION: ProgressBand = ProgressBand::new(10, 55);
pub const ENGINE_LOAD: ProgressBand = ProgressBand::new(55, 65);
pub const ENGINE_WRITE: ProgressBand = ProgressBand::new(65, 80);
pub const ENCODE: ProgressBand = ProgressBand::new(80, 100);
/// Encoder finished; reading the container back out of the engine.
pub const FINALIZE: u8 = ENCODE.end - 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub step: String,
    pub percent: u8,
}

/// Publishes progress to in-process watchers and mirrors it to the job record.
///
/// Percentages never go backwards: a lower value keeps the current one and only
/// the step label changes. Job store failures are logged and swallowed.
pub struct ProgressReporter {
    job_id: Uuid,
    store: Arc<dyn JobStore>,
    sender: watch::Sender<Progress>,
}

impl ProgressReporter {
    pub fn new(job_id: Uuid, store: Arc<dyn JobStore>) -> Self {
        let (sender, _) = watch::channel(Progress::default());
        Self {
            job_id,
            store,
            sender,
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> Progress {
        self.sender.borrow().clone()
    }

    pub async fn report(&self, step: impl Into<String>, percent: u8) {
        self.publish(step.into(), percent, JobUpdate::default()).await;
    }

    /// Same as [`report`](Self::report), also recording finished scenes.
    pub async fn report_scenes(&self, step: impl Into<String>, percent: u8, completed: usize) {
        let update = JobUpdate {
            completed_scenes: Some(completed),
            ..Default::default()
        };
        self.publish(step.into(), percent, update).await;
    }

    pub(crate) async fn start(&self, total_scenes: usize) {
        let update = JobUpdate {
            status: Some(JobStatus::Processing),
            total_scenes: Some(total_scenes),
            ..Default::default()
        };
        self.publish("Starting".to_string(), SETUP.start, update).await;
    }

    pub(crate) async fn complete(&self) {
        let update = JobUpdate {
            status: Some(JobStatus::Completed),
            ..Default::default()
        };
        self.publish("Complete".to_string(), 100, update).await;
    }

    pub(crate) async fn fail(&self, message: &str) {
        let current = self.current();
        let update = JobUpdate {
            status: Some(JobStatus::Failed),
            error_message: Some(message.to_string()),
            ..Default::default()
        };
        self.publish(format!("Failed: {}", current.step), current.percent, update)
            .await;
    }

    async fn publish(&self, step: String, percent: u8, mut update: JobUpdate) {
        let percent = percent.min(100).max(self.sender.borrow().percent);
        info!("[{:>3}%] {}", percent, step);

        self.sender.send_replace(Progress {
            step: step.clone(),
            percent,
        });

        update.progress = Some(percent);
        update.current_step = Some(step);
        if let Err(e) = self.store.update(self.job_id, update).await {
            warn!("Failed to update job {}: {}", self.job_id, e);
        }
    }
}
