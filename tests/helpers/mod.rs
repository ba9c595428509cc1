//! In-memory stand-ins for the processing service and object store.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use geoproc_client::{
    models::{
        job::{ExportHandle, JobDetails, JobHandle},
        request::{ExportDestination, InputSpec, JobConfig},
        scene::RasterItem,
    },
    services::{
        processing::{ProcessingService, ServiceError},
        storage::{ObjectStore, StorageError},
    },
};

/// Scripted behaviour of one remote job.
#[derive(Debug, Clone)]
pub struct ScriptedJob {
    /// Wire status per poll; the last entry repeats forever.
    pub statuses: VecDeque<String>,
    /// Polls after the export request that still report no export status.
    pub export_lag_polls: u32,
    /// Polls reporting `IN_PROGRESS` before the export settles.
    pub export_polls_until_done: u32,
    pub export_fails: bool,
}

impl ScriptedJob {
    pub fn new(statuses: &[&str]) -> Self {
        Self {
            statuses: statuses.iter().map(|s| s.to_string()).collect(),
            export_lag_polls: 0,
            export_polls_until_done: 1,
            export_fails: false,
        }
    }

    pub fn completed() -> Self {
        Self::new(&["COMPLETED"])
    }

    pub fn with_export_polls(mut self, polls: u32) -> Self {
        self.export_polls_until_done = polls;
        self
    }

    pub fn with_export_lag(mut self, polls: u32) -> Self {
        self.export_lag_polls = polls;
        self
    }

    pub fn with_failed_export(mut self) -> Self {
        self.export_fails = true;
        self
    }
}

#[derive(Debug)]
struct JobState {
    script: ScriptedJob,
    current: String,
    export_requested: bool,
    polls_since_export: u32,
}

#[derive(Debug, Default)]
struct Inner {
    jobs: HashMap<String, JobState>,
    next_id: u32,
    status_calls: Vec<JobHandle>,
    export_calls: Vec<(JobHandle, ExportDestination)>,
    submitted: Vec<(String, JobConfig)>,
    scripts_for_submit: VecDeque<ScriptedJob>,
}

/// Fake service that renders scripted statuses as wire JSON and decodes them
/// the same way the HTTP client does.
#[derive(Debug, Default)]
pub struct FakeProcessingService {
    inner: Mutex<Inner>,
    scenes: Vec<RasterItem>,
}

impl FakeProcessingService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scenes(mut self, scenes: Vec<RasterItem>) -> Self {
        self.scenes = scenes;
        self
    }

    /// Register a job that already exists remotely.
    pub fn add_job(&self, handle: &str, script: ScriptedJob) -> JobHandle {
        let mut inner = self.inner.lock().unwrap();
        let current = script.statuses.front().cloned().unwrap_or_default();
        inner.jobs.insert(
            handle.to_string(),
            JobState {
                script,
                current,
                export_requested: false,
                polls_since_export: 0,
            },
        );
        JobHandle::new(handle)
    }

    /// Scripts handed out, in order, to jobs created through `submit`.
    pub fn queue_submit_script(&self, script: ScriptedJob) {
        self.inner.lock().unwrap().scripts_for_submit.push_back(script);
    }

    pub fn export_calls(&self) -> Vec<JobHandle> {
        self.inner
            .lock()
            .unwrap()
            .export_calls
            .iter()
            .map(|(h, _)| h.clone())
            .collect()
    }

    pub fn export_destinations(&self) -> Vec<ExportDestination> {
        self.inner
            .lock()
            .unwrap()
            .export_calls
            .iter()
            .map(|(_, d)| d.clone())
            .collect()
    }

    pub fn status_calls(&self) -> Vec<JobHandle> {
        self.inner.lock().unwrap().status_calls.clone()
    }

    pub fn submitted_names(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .submitted
            .iter()
            .map(|(n, _)| n.clone())
            .collect()
    }
}

#[async_trait]
impl ProcessingService for FakeProcessingService {
    async fn submit(
        &self,
        name: &str,
        config: &JobConfig,
        _input: &InputSpec,
    ) -> Result<JobHandle, ServiceError> {
        let script = {
            let mut inner = self.inner.lock().unwrap();
            inner.next_id += 1;
            inner.submitted.push((name.to_string(), config.clone()));
            inner
                .scripts_for_submit
                .pop_front()
                .unwrap_or_else(ScriptedJob::completed)
        };
        let id = {
            let inner = self.inner.lock().unwrap();
            format!("arn:job/{}-{}", name, inner.next_id)
        };
        Ok(self.add_job(&id, script))
    }

    async fn get_status(&self, handle: &JobHandle) -> Result<JobDetails, ServiceError> {
        let mut inner = self.inner.lock().unwrap();
        inner.status_calls.push(handle.clone());

        let job = inner
            .jobs
            .get_mut(handle.as_str())
            .ok_or_else(|| ServiceError::Api {
                status: 404,
                message: format!("ResourceNotFoundException: {handle}"),
            })?;

        if let Some(status) = job.script.statuses.pop_front() {
            job.current = status;
        }
        if job.script.statuses.is_empty() {
            job.script.statuses.push_back(job.current.clone());
        }

        let export = if job.export_requested {
            job.polls_since_export += 1;
            if job.polls_since_export <= job.script.export_lag_polls {
                None
            } else if job.polls_since_export
                < job.script.export_lag_polls + job.script.export_polls_until_done
            {
                Some("IN_PROGRESS")
            } else if job.script.export_fails {
                Some("FAILED")
            } else {
                Some("SUCCEEDED")
            }
        } else {
            None
        };

        let mut body = serde_json::json!({
            "Arn": handle.as_str(),
            "Status": job.current,
        });
        if let Some(export) = export {
            body["ExportStatus"] = serde_json::json!(export);
        }
        if job.script.export_fails && export == Some("FAILED") {
            body["ExportErrorDetails"] =
                serde_json::json!({ "Type": "CLIENT_ERROR", "Message": "access denied" });
        }
        if job.current == "FAILED" {
            body["ErrorDetails"] =
                serde_json::json!({ "Type": "SERVER_ERROR", "Message": "processing error" });
        }

        serde_json::from_value(body).map_err(|e| ServiceError::Protocol(e.to_string()))
    }

    async fn export(
        &self,
        handle: &JobHandle,
        destination: &ExportDestination,
    ) -> Result<ExportHandle, ServiceError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .export_calls
            .push((handle.clone(), destination.clone()));

        let job = inner
            .jobs
            .get_mut(handle.as_str())
            .ok_or_else(|| ServiceError::Api {
                status: 404,
                message: format!("ResourceNotFoundException: {handle}"),
            })?;

        if job.current != "COMPLETED" {
            return Err(ServiceError::Api {
                status: 400,
                message: format!("ValidationException: job is {}", job.current),
            });
        }

        job.export_requested = true;
        job.polls_since_export = 0;
        Ok(ExportHandle::new(format!("{handle}/export")))
    }

    async fn search(&self, _input: &InputSpec) -> Result<Vec<RasterItem>, ServiceError> {
        Ok(self.scenes.clone())
    }
}

/// Object store backed by a map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: &str, bytes: Vec<u8>) {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::Status {
                key: key.to_string(),
                status: 404,
            })
    }

    fn bucket_name(&self) -> &str {
        "memory"
    }
}
