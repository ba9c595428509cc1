//! Round-robin export of several jobs from one control loop.
//!
//! Each round queries every unfinished job once, in tracking order, and
//! requests export for jobs that have newly completed. The loop ends when
//! every job reports export `SUCCEEDED`.

use serde::Serialize;
use std::sync::Arc;

use crate::models::job::{ExportHandle, ExportState, JobHandle, JobStatus};
use crate::models::request::ExportDestination;
use crate::services::poller::{PollError, PollSchedule};
use crate::services::processing::ProcessingService;

/// Per-job progress line recorded each round.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JobProgress {
    pub handle: JobHandle,
    pub status: Option<JobStatus>,
    pub export: ExportState,
    pub export_handle: Option<ExportHandle>,
    pub note: String,
}

struct TrackedJob {
    handle: JobHandle,
    destination: ExportDestination,
    status: Option<JobStatus>,
    export: ExportState,
    /// Set once this client has issued (or observed) an export request.
    export_requested: bool,
    export_handle: Option<ExportHandle>,
    note: String,
}

impl TrackedJob {
    fn progress(&self) -> JobProgress {
        JobProgress {
            handle: self.handle.clone(),
            status: self.status,
            export: self.export,
            export_handle: self.export_handle.clone(),
            note: self.note.clone(),
        }
    }
}

pub struct ExportTracker {
    service: Arc<dyn ProcessingService>,
    jobs: Vec<TrackedJob>,
    rounds: u64,
}

impl ExportTracker {
    pub fn new(service: Arc<dyn ProcessingService>) -> Self {
        Self {
            service,
            jobs: Vec::new(),
            rounds: 0,
        }
    }

    pub fn track(&mut self, handle: JobHandle, destination: ExportDestination) {
        self.jobs.push(TrackedJob {
            handle,
            destination,
            status: None,
            export: ExportState::NotRequested,
            export_requested: false,
            export_handle: None,
            note: "not yet polled".to_string(),
        });
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    pub fn is_finished(&self) -> bool {
        self.jobs.iter().all(|j| j.export == ExportState::Succeeded)
    }

    pub fn progress(&self) -> Vec<JobProgress> {
        self.jobs.iter().map(TrackedJob::progress).collect()
    }

    /// One pass over every unfinished job. Returns `true` once all exports succeeded.
    pub async fn scan_round(&mut self) -> Result<bool, PollError> {
        self.rounds += 1;

        for job in self.jobs.iter_mut() {
            if job.export == ExportState::Succeeded {
                continue;
            }

            let details = self.service.get_status(&job.handle).await?;
            job.status = Some(details.status);
            job.export = details.export_status;
            if details.export_status != ExportState::NotRequested {
                job.export_requested = true;
            }

            job.note = match (details.status, details.export_status) {
                (JobStatus::Failed, _) => {
                    return Err(PollError::JobFailed {
                        handle: job.handle.clone(),
                        reason: details.failure_reason(),
                    });
                }
                (JobStatus::Completed, ExportState::Failed) => {
                    return Err(PollError::ExportFailed {
                        handle: job.handle.clone(),
                        reason: details.failure_reason(),
                    });
                }
                (JobStatus::Completed, ExportState::NotRequested) if !job.export_requested => {
                    let export_handle = self.service.export(&job.handle, &job.destination).await?;
                    job.export_requested = true;
                    job.export = ExportState::InProgress;
                    job.export_handle = Some(export_handle);
                    format!("export requested to {}", job.destination.s3_uri())
                }
                (JobStatus::Completed, ExportState::NotRequested) => {
                    "export requested, not yet reported".to_string()
                }
                (JobStatus::Completed, ExportState::InProgress) => "export in progress".to_string(),
                (JobStatus::Completed, ExportState::Succeeded) => {
                    format!("exported to {}", job.destination.s3_uri())
                }
                (status, _) => format!("job {status}"),
            };
        }

        for job in &self.jobs {
            tracing::info!(
                round = self.rounds,
                job = %job.handle,
                status = ?job.status,
                export = %job.export,
                note = %job.note,
                "Export progress"
            );
        }

        Ok(self.is_finished())
    }

    /// Scan until every job is exported, sleeping the schedule's interval between rounds.
    pub async fn run(&mut self, schedule: &PollSchedule) -> Result<Vec<JobProgress>, PollError> {
        loop {
            schedule.check()?;
            if self.scan_round().await? {
                tracing::info!(
                    jobs = self.jobs.len(),
                    rounds = self.rounds,
                    "All exports succeeded"
                );
                return Ok(self.progress());
            }
            schedule.wait().await?;
        }
    }
}
