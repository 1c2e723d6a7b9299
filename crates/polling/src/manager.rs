//! Multi-job tracking manager.
//!
//! [`JobTracker`] owns one [`PollingHandle`] per job id. Tracking a job
//! that is already tracked replaces (and cancels) the older handle, so a
//! job is never polled twice. Events from every job are forwarded onto a
//! single broadcast channel; call [`JobTracker::subscribe`] to receive
//! them. Use [`PollEvent::tracker_id`] to tell a replaced tracker's final
//! `cancelled` event from the tracker that replaced it.
//!
//! Finished handles are kept so [`JobTracker::view`] can report how a job
//! ended. They are dropped on the next [`JobTracker::track`] call, or by
//! [`JobTracker::cancel`] / [`JobTracker::shutdown`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dubai_core::error::CoreError;
use dubai_core::job::{JobKind, JobOutcome};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::controller::{PollingController, PollingHandle};
use crate::events::PollEvent;
use crate::tracker::TrackerView;

/// Broadcast channel capacity for aggregated events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long [`JobTracker::shutdown`] waits for each task to exit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Tracks many jobs against one controller.
///
/// Created via [`JobTracker::new`]; the returned `Arc` can be cloned into
/// whatever owns the job screens or request handlers.
pub struct JobTracker {
    controller: PollingController,
    /// Active handles indexed by job id.
    handles: RwLock<HashMap<String, PollingHandle>>,
    event_tx: broadcast::Sender<PollEvent>,
}

impl JobTracker {
    pub fn new(controller: PollingController) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            controller,
            handles: RwLock::new(HashMap::new()),
            event_tx,
        })
    }

    /// Subscribe to events from every tracked job.
    pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        self.event_tx.subscribe()
    }

    /// Start tracking a job, replacing any existing tracker for the same id.
    ///
    /// Returns the new tracker id, which appears on all of its events.
    pub async fn track<F>(
        &self,
        job_id: &str,
        kind: JobKind,
        on_finish: F,
    ) -> Result<Uuid, CoreError>
    where
        F: FnOnce(JobOutcome) + Send + 'static,
    {
        let mut handle = self.controller.start(job_id, kind, on_finish)?;
        let tracker_id = handle.tracker_id();

        if let Some(mut events) = handle.take_events() {
            let event_tx = self.event_tx.clone();
            tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(event) => {
                            let is_final = event.is_final();
                            let _ = event_tx.send(event);
                            if is_final {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Event forwarder lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            });
        }

        let mut handles = self.handles.write().await;
        handles.retain(|_, existing| !existing.is_finished());
        if let Some(previous) = handles.insert(job_id.to_string(), handle) {
            tracing::info!(
                job_id,
                previous_tracker_id = %previous.tracker_id(),
                "Replacing existing tracker",
            );
            previous.cancel();
        }

        tracing::info!(
            job_id,
            kind = %kind,
            tracker_id = %tracker_id,
            tracked = handles.len(),
            "Tracking job",
        );
        Ok(tracker_id)
    }

    /// Stop tracking a job. Returns `false` if it was not tracked.
    pub async fn cancel(&self, job_id: &str) -> bool {
        match self.handles.write().await.remove(job_id) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Ids of jobs still being polled.
    pub async fn active_jobs(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .handles
            .read()
            .await
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Latest view of a tracked job. A finished job stays visible until the
    /// next `track` call prunes it.
    pub async fn view(&self, job_id: &str) -> Option<TrackerView> {
        self.handles.read().await.get(job_id).map(PollingHandle::view)
    }

    /// Cancel every tracker and wait up to 5 seconds per task for a clean
    /// exit.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down job tracker");

        let drained: Vec<(String, PollingHandle)> = self.handles.write().await.drain().collect();
        for (job_id, handle) in drained {
            tracing::info!(job_id = %job_id, "Stopping tracker");
            handle.cancel();
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle.join()).await.is_err() {
                tracing::warn!(job_id = %job_id, "Tracker did not stop in time");
            }
        }

        tracing::info!("Job tracker shut down complete");
    }
}
