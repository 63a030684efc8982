use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, VideoError};

mod store;

pub use store::{FileJobStore, MemoryJobStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Status only moves forward: pending -> processing -> completed | failed.
    /// A pending job may also fail directly.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (a, b) if a == b => !a.is_terminal(),
            (Pending, Processing | Failed) => true,
            (Processing, Completed | Failed) => true,
            _ => false,
        }
    }
}

/// Durable, externally observable record of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub progress: u8,
    pub current_step: String,
    pub total_scenes: usize,
    pub completed_scenes: usize,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub current_step: Option<String>,
    pub total_scenes: Option<usize>,
    pub completed_scenes: Option<usize>,
    pub error_message: Option<String>,
}

impl Job {
    pub fn new(total_scenes: usize) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            progress: 0,
            current_step: "Queued".to_string(),
            total_scenes,
            completed_scenes: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update, enforcing the status state machine.
    ///
    /// Progress below the stored value is ignored rather than rejected, so
    /// late or duplicate reports are harmless.
    pub fn apply(&mut self, update: JobUpdate) -> Result<()> {
        if let Some(next) = update.status {
            if !self.status.can_transition_to(next) {
                return Err(VideoError::JobError(format!(
                    "Job {} cannot move from {:?} to {:?}",
                    self.id, self.status, next
                )));
            }
        } else if self.status.is_terminal() {
            return Err(VideoError::JobError(format!(
                "Job {} is already {:?}",
                self.id, self.status
            )));
        }

        if update.error_message.is_some() && update.status != Some(JobStatus::Failed) {
            return Err(VideoError::JobError(
                "An error message may only be set when failing a job".to_string(),
            ));
        }

        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(progress) = update.progress {
            self.progress = self.progress.max(progress.min(100));
        }
        if let Some(step) = update.current_step {
            self.current_step = step;
        }
        if let Some(total) = update.total_scenes {
            self.total_scenes = total;
        }
        if let Some(completed) = update.completed_scenes {
            self.completed_scenes = self.completed_scenes.max(completed);
        }
        if update.error_message.is_some() {
            self.error_message = update.error_message;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Storage for job records shared with asynchronous observers.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, total_scenes: usize) -> Result<Job>;

    async fn get(&self, id: Uuid) -> Result<Option<Job>>;

    async fn update(&self, id: Uuid, update: JobUpdate) -> Result<Job>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: JobStatus) -> JobUpdate {
        JobUpdate {
            status: Some(status),
            ..Default::default()
        }
    }

    #[test]
    fn moves_forward_only() {
        let mut job = Job::new(3);
        job.apply(status(JobStatus::Processing)).unwrap();
        assert!(job.apply(status(JobStatus::Pending)).is_err());
        job.apply(status(JobStatus::Completed)).unwrap();
        assert!(job.apply(status(JobStatus::Failed)).is_err());
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn terminal_jobs_reject_progress() {
        let mut job = Job::new(1);
        job.apply(JobUpdate {
            status: Some(JobStatus::Failed),
            error_message: Some("boom".into()),
            ..Default::default()
        })
        .unwrap();

        let late = JobUpdate {
            progress: Some(50),
            ..Default::default()
        };
        assert!(job.apply(late).is_err());
        assert_eq!(job.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn progress_is_monotonic() {
        let mut job = Job::new(1);
        for value in [20, 10, 35] {
            job.apply(JobUpdate {
                progress: Some(value),
                ..Default::default()
            })
            .unwrap();
        }
        assert_eq!(job.progress, 35);
    }

    #[test]
    fn error_message_requires_failure() {
        let mut job = Job::new(1);
        let update = JobUpdate {
            error_message: Some("oops".into()),
            ..Default::default()
        };
        assert!(job.apply(update).is_err());
        assert!(job.error_message.is_none());
    }
}
