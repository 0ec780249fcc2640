//! Waiting on a long-running task that executes on the parent.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use nodemirror_types::MirrorConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifecycle state reported by the remote task service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    #[serde(alias = "waiting")]
    Queued,
    Running,
    #[serde(alias = "finished")]
    Succeeded,
    #[serde(alias = "error")]
    Failed,
    #[serde(alias = "canceled")]
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Cancelled
        )
    }
}

/// One observation of a remote task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: String,
    pub state: TaskState,
    #[serde(default, alias = "progress_report")]
    pub progress: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub exception: Option<Value>,
    #[serde(default)]
    pub traceback: Option<Value>,
}

/// Reports the status of remote tasks.
#[async_trait]
pub trait TaskSource: Send + Sync {
    async fn task_status(&self, task_id: &str) -> SyncResult<TaskStatus>;
}

#[async_trait]
impl<T: TaskSource + ?Sized> TaskSource for Arc<T> {
    async fn task_status(&self, task_id: &str) -> SyncResult<TaskStatus> {
        (**self).task_status(task_id).await
    }
}

/// Task status over the parent's REST API: `GET {base_url}/tasks/{id}/`.
pub struct HttpTaskSource {
    client: Client,
    base_url: String,
}

impl HttpTaskSource {
    pub fn new(base_url: impl Into<String>) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SyncError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TaskSource for HttpTaskSource {
    async fn task_status(&self, task_id: &str) -> SyncResult<TaskStatus> {
        let url = format!("{}/tasks/{}/", self.base_url, task_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SyncError::PollFailed(format!("GET {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(SyncError::PollFailed(format!(
                "GET {url} returned HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| SyncError::PollFailed(format!("malformed task status from {url}: {e}")))
    }
}

/// Polls a [`TaskSource`] until a task reaches a terminal state.
pub struct TaskPoller<S> {
    source: S,
    delay: Duration,
}

impl<S: TaskSource> TaskPoller<S> {
    pub fn new(source: S, delay: Duration) -> Self {
        Self { source, delay }
    }

    /// Uses `poll_delay_seconds` from the configuration.
    pub fn from_config(source: S, config: &MirrorConfig) -> Self {
        Self::new(source, config.poll_delay())
    }

    /// Waits for `task_id` to finish.
    ///
    /// Each iteration checks `is_cancelled`, sleeps for the poll delay, then
    /// fetches the status. `progress` is called only when the reported
    /// progress differs from the last one delivered. Returns the task result
    /// (or `Null`) on success.
    pub async fn join<P, C>(&self, task_id: &str, mut progress: P, is_cancelled: C) -> SyncResult<Value>
    where
        P: FnMut(&Value),
        C: Fn() -> bool,
    {
        let mut last_progress: Option<Value> = None;
        let mut polls = 0u64;

        loop {
            if is_cancelled() {
                info!("Stopped waiting for task {} after {} polls", task_id, polls);
                return Err(SyncError::Cancelled);
            }
            tokio::time::sleep(self.delay).await;

            let status = self
                .source
                .task_status(task_id)
                .await
                .map_err(|e| match e {
                    SyncError::PollFailed(_) => e,
                    other => SyncError::PollFailed(other.to_string()),
                })?;
            polls += 1;

            if let Some(report) = status.progress.as_ref()
                && last_progress.as_ref() != Some(report)
            {
                progress(report);
                last_progress = Some(report.clone());
            }

            match status.state {
                TaskState::Succeeded => {
                    debug!("Task {} succeeded after {} polls", task_id, polls);
                    return Ok(status.result.unwrap_or(Value::Null));
                }
                TaskState::Failed => {
                    warn!("Task {} failed", task_id);
                    return Err(SyncError::TaskFailed {
                        task_id: task_id.to_string(),
                        exception: status.exception.unwrap_or(Value::Null),
                        traceback: status.traceback.unwrap_or(Value::Null),
                    });
                }
                TaskState::Cancelled => {
                    return Err(SyncError::TaskCancelled(task_id.to_string()));
                }
                TaskState::Queued | TaskState::Running => {}
            }
        }
    }
}
