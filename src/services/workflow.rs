//! One run of a [`JobPlan`]: search, submit, wait, export, render.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::app_state::AppState;
use crate::models::job::{JobHandle, JobStatus};
use crate::models::request::{ExportDestination, JobPlan};
use crate::services::export::{ExportTracker, JobProgress};
use crate::services::poller::{self, PollError};
use crate::services::processing::ServiceError;
use crate::services::visualize::{self, RenderError, RenderRequest};

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub bucket: String,
    pub job_poll_interval: Duration,
    pub export_poll_interval: Duration,
    pub poll_timeout: Option<Duration>,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Scenes matched by the optional pre-submit search.
    pub scenes_found: Option<usize>,
    pub jobs: Vec<JobProgress>,
    pub previews: Vec<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Remote call failed: {0}")]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error("Rendering failed: {0}")]
    Render(#[from] RenderError),
}

/// Export location for one job of the plan.
pub fn destination_for(bucket: &str, export_prefix: &str, job_name: &str) -> ExportDestination {
    let prefix = export_prefix.trim_matches('/');
    if prefix.is_empty() {
        ExportDestination::new(bucket, job_name)
    } else {
        ExportDestination::new(bucket, format!("{prefix}/{job_name}"))
    }
}

pub async fn run_plan(
    state: &AppState,
    plan: &JobPlan,
    settings: &RunSettings,
) -> Result<RunReport, WorkflowError> {
    let scenes_found = if plan.search_first {
        let scenes = state.processing.search(&plan.input).await?;
        for scene in &scenes {
            tracing::info!(
                scene = %scene.id,
                datetime = %scene.datetime,
                cloud_cover = ?scene.cloud_cover,
                "Matched scene"
            );
        }
        Some(scenes.len())
    } else {
        None
    };

    let mut submitted: Vec<(JobHandle, ExportDestination)> = Vec::with_capacity(plan.jobs.len());
    for job in &plan.jobs {
        let handle = state
            .processing
            .submit(&job.name, &job.config, &plan.input)
            .await?;
        let destination = destination_for(&settings.bucket, &plan.export_prefix, &job.name);
        submitted.push((handle, destination));
    }

    let job_schedule = state.schedule(settings.job_poll_interval, settings.poll_timeout);
    for (handle, _) in &submitted {
        let details =
            poller::wait_for_completion(state.processing.as_ref(), handle, &job_schedule).await?;
        if details.status == JobStatus::Failed {
            return Err(PollError::JobFailed {
                handle: handle.clone(),
                reason: details.failure_reason(),
            }
            .into());
        }
    }

    let mut tracker = ExportTracker::new(state.processing.clone());
    for (handle, destination) in &submitted {
        tracker.track(handle.clone(), destination.clone());
    }
    let export_schedule = state.schedule(settings.export_poll_interval, settings.poll_timeout);
    let jobs = tracker.run(&export_schedule).await?;

    let mut previews = Vec::new();
    if let Some(render) = &plan.render {
        for (_, destination) in &submitted {
            let request = RenderRequest {
                prefix: destination.key_prefix(),
                band: render.band.clone(),
                max_images: render.max_images,
                decimation: render.decimation,
                ..RenderRequest::new("", "", settings.output_dir.clone())
            };
            previews.extend(visualize::render_outputs(state.storage.as_ref(), &request).await?);
        }
    }

    Ok(RunReport {
        scenes_found,
        jobs,
        previews,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_for_joins_prefix() {
        let dest = destination_for("bucket", "/exports/", "ndvi");
        assert_eq!(dest.prefix, "exports/ndvi");
        assert_eq!(destination_for("bucket", "", "ndvi").prefix, "ndvi");
    }
}
