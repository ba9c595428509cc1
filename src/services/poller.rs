//! Fixed-interval polling of remote job state.
//!
//! A [`PollSchedule`] replaces the bare sleep between rounds: it can be
//! bounded by a deadline and interrupted through a [`CancellationToken`].
//! With neither set it waits forever, one interval at a time.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::models::job::{JobDetails, JobHandle};
use crate::services::processing::{ProcessingService, ServiceError};

pub const DEFAULT_JOB_POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_EXPORT_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Gave up after waiting {waited:?}")]
    Timeout { waited: Duration },

    #[error("Polling cancelled")]
    Cancelled,

    #[error("Job {handle} failed: {reason}")]
    JobFailed { handle: JobHandle, reason: String },

    #[error("Export of job {handle} failed: {reason}")]
    ExportFailed { handle: JobHandle, reason: String },
}

#[derive(Debug, Clone)]
pub struct PollSchedule {
    interval: Duration,
    started: Instant,
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl PollSchedule {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            started: Instant::now(),
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Give up `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.started = Instant::now();
        self.deadline = Some(self.started + timeout);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fail fast if the schedule is already spent, before any remote call.
    pub fn check(&self) -> Result<(), PollError> {
        if self.cancel.is_cancelled() {
            return Err(PollError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(PollError::Timeout {
                waited: self.started.elapsed(),
            }),
            _ => Ok(()),
        }
    }

    /// Sleep one interval, or less if the deadline comes first.
    pub async fn wait(&self) -> Result<(), PollError> {
        self.check()?;

        let mut wake = Instant::now() + self.interval;
        let mut hits_deadline = false;
        if let Some(deadline) = self.deadline {
            if deadline <= wake {
                wake = deadline;
                hits_deadline = true;
            }
        }

        tokio::select! {
            _ = self.cancel.cancelled() => Err(PollError::Cancelled),
            _ = tokio::time::sleep_until(wake) => {
                if hits_deadline {
                    Err(PollError::Timeout { waited: self.started.elapsed() })
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Poll `handle` until it reaches `COMPLETED` or `FAILED`.
///
/// Returns the terminal snapshot either way; a failed job is not an error here.
pub async fn wait_for_completion(
    service: &dyn ProcessingService,
    handle: &JobHandle,
    schedule: &PollSchedule,
) -> Result<JobDetails, PollError> {
    let started = Instant::now();

    loop {
        schedule.check()?;
        let details = service.get_status(handle).await?;

        if details.status.is_terminal() {
            let waited = started.elapsed();
            metrics::histogram!("geoproc_job_wait_seconds").record(waited.as_secs_f64());
            tracing::info!(
                job = %handle,
                status = %details.status,
                waited_secs = waited.as_secs(),
                "Job reached terminal state"
            );
            return Ok(details);
        }

        tracing::info!(
            job = %handle,
            status = %details.status,
            next_poll_secs = schedule.interval().as_secs(),
            "Job not finished"
        );
        schedule.wait().await?;
    }
}
