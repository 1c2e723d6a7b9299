//! Polling controller and its scoped handle.
//!
//! [`PollingController::start`] spawns one task per job. The task checks
//! status immediately, then on a fixed interval, until the job reaches a
//! terminal state, the configured maximum duration elapses, or the
//! [`PollingHandle`] is cancelled or dropped.
//!
//! Cancellation always wins: a response that resolves after cancellation
//! is discarded and no outcome is delivered. If the task panics, awaiting
//! the handle delivers a failure outcome instead.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dubai_core::error::CoreError;
use dubai_core::job::{Job, JobKind, JobOutcome};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::PollingConfig;
use crate::events::PollEvent;
use crate::handoff::ResultHandoff;
use crate::source::StatusSource;
use crate::tracker::{Observation, PollState, PollTracker, Step, StopReason, TrackerView};

/// Broadcast channel capacity for per-job events.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Failure message prefix when the polling task panicked.
pub const TASK_ABORTED_ERROR: &str = "Polling task aborted";

type SharedHandoff = Arc<Mutex<ResultHandoff>>;

/// Starts polling tasks against one status source.
///
/// Cheap to clone; every clone shares the same source.
#[derive(Clone)]
pub struct PollingController {
    source: Arc<dyn StatusSource>,
    config: PollingConfig,
}

/// How a polling task ended.
#[derive(Debug, Clone)]
pub struct PollExit {
    pub reason: StopReason,
    /// The delivered outcome. `None` when cancelled.
    pub outcome: Option<JobOutcome>,
    /// Displayed progress when polling stopped.
    pub progress: f64,
}

impl PollingController {
    pub fn new(source: Arc<dyn StatusSource>, config: PollingConfig) -> Self {
        Self { source, config }
    }

    /// Start tracking a job. `on_finish` runs exactly once on success or
    /// failure, and never after cancellation.
    ///
    /// Fails with [`CoreError::Validation`] for a job id that cannot be
    /// polled or a zero polling interval. Must be called from within a
    /// Tokio runtime.
    pub fn start<F>(
        &self,
        job_id: impl Into<String>,
        kind: JobKind,
        on_finish: F,
    ) -> Result<PollingHandle, CoreError>
    where
        F: FnOnce(JobOutcome) + Send + 'static,
    {
        if self.config.interval.is_zero() {
            return Err(CoreError::Validation(
                "Polling interval must be greater than zero".to_string(),
            ));
        }
        let job = Job::new(job_id, kind)?;
        let tracker_id = Uuid::now_v7();
        let tracker = PollTracker::new(job.clone(), &self.config);

        let (view_tx, view_rx) = watch::channel(tracker.view());
        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let handoff = Arc::new(Mutex::new(ResultHandoff::new(job.id.clone(), on_finish)));

        let task = PollTask {
            tracker_id,
            source: Arc::clone(&self.source),
            config: self.config.clone(),
            tracker,
            handoff: Arc::clone(&handoff),
            cancel: cancel.clone(),
            view_tx,
            event_tx: event_tx.clone(),
        };
        let task_handle = tokio::spawn(task.run());

        Ok(PollingHandle {
            tracker_id,
            job_id: job.id,
            kind,
            cancel,
            view_rx,
            event_tx,
            initial_events: Some(event_rx),
            handoff,
            task: Some(task_handle),
        })
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Owner of one polling task. Cancelling or dropping it stops the task.
pub struct PollingHandle {
    tracker_id: Uuid,
    job_id: String,
    kind: JobKind,
    cancel: CancellationToken,
    view_rx: watch::Receiver<TrackerView>,
    event_tx: broadcast::Sender<PollEvent>,
    /// Receiver created before the task started, so it sees every event.
    initial_events: Option<broadcast::Receiver<PollEvent>>,
    handoff: SharedHandoff,
    task: Option<JoinHandle<PollExit>>,
}

impl PollingHandle {
    /// Unique id of this tracking session, used in logs.
    pub fn tracker_id(&self) -> Uuid {
        self.tracker_id
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Stop polling. No outcome is delivered after this returns.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!(job_id = %self.job_id, tracker_id = %self.tracker_id, "Cancelling polling");
        }
        self.cancel.cancel();
    }

    /// A clone of the cancellation token, e.g. for a signal handler.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the polling task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    /// Latest published view.
    pub fn view(&self) -> TrackerView {
        self.view_rx.borrow().clone()
    }

    /// Watch the view as it changes.
    pub fn watch(&self) -> watch::Receiver<TrackerView> {
        self.view_rx.clone()
    }

    /// The receiver subscribed before polling started. Returns `None` after
    /// the first call.
    pub fn take_events(&mut self) -> Option<broadcast::Receiver<PollEvent>> {
        self.initial_events.take()
    }

    /// Subscribe to events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        self.event_tx.subscribe()
    }

    /// Wait for the polling task to exit.
    ///
    /// Dropping the returned future before it completes cancels polling.
    pub async fn join(mut self) -> PollExit {
        let progress = self.view_rx.borrow().progress;
        match self.task.take() {
            Some(task) => match task.await {
                Ok(exit) => exit,
                Err(e) => {
                    tracing::error!(job_id = %self.job_id, error = %e, "Polling task aborted");
                    let outcome = JobOutcome::Failed {
                        error: format!("{TASK_ABORTED_ERROR}: {e}"),
                    };
                    deliver(&self.handoff, outcome.clone());
                    PollExit {
                        reason: StopReason::Failed,
                        outcome: Some(outcome),
                        progress,
                    }
                }
            },
            None => PollExit {
                reason: StopReason::Cancelled,
                outcome: None,
                progress,
            },
        }
    }
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for PollingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingHandle")
            .field("tracker_id", &self.tracker_id)
            .field("job_id", &self.job_id)
            .field("kind", &self.kind)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// State owned by the spawned polling task.
struct PollTask {
    tracker_id: Uuid,
    source: Arc<dyn StatusSource>,
    config: PollingConfig,
    tracker: PollTracker,
    handoff: SharedHandoff,
    cancel: CancellationToken,
    view_tx: watch::Sender<TrackerView>,
    event_tx: broadcast::Sender<PollEvent>,
}

impl PollTask {
    async fn run(mut self) -> PollExit {
        let job_id = self.tracker.job().id.clone();
        let kind = self.tracker.job().kind;
        let source = Arc::clone(&self.source);
        let cancel = self.cancel.clone();

        self.tracker.start();
        let deadline = self.config.max_duration.map(|d| Instant::now() + d);

        tracing::info!(
            tracker_id = %self.tracker_id,
            job_id = %job_id,
            kind = %kind,
            interval_ms = self.config.interval.as_millis() as u64,
            max_duration_secs = self.config.max_duration.map(|d| d.as_secs()),
            "Polling started",
        );
        self.publish_view();
        self.publish(PollEvent::Started {
            tracker_id: self.tracker_id,
            job_id: job_id.clone(),
            kind,
        });

        // First tick completes immediately.
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.cancelled(),
                _ = wait_until(deadline) => return self.timed_out(),
                _ = ticker.tick() => {}
            }

            if !self.tracker.begin_request() {
                tracing::debug!(job_id = %job_id, "Status request still in flight, skipping tick");
                continue;
            }

            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.cancelled(),
                _ = wait_until(deadline) => return self.timed_out(),
                fetched = source.fetch_status(&job_id, kind) => fetched,
            };

            // A response racing a cancel must not be applied.
            if cancel.is_cancelled() {
                return self.cancelled();
            }

            if let Err(e) = &fetched {
                tracing::warn!(
                    job_id = %job_id,
                    kind = %kind,
                    error = %e,
                    "Status check failed, retrying on next tick",
                );
            }

            match self.tracker.finish_request(Observation::from(fetched)) {
                Step::Progressed { status, percent } => {
                    tracing::debug!(job_id = %job_id, status = %status, percent, "Job progress");
                    self.publish_view();
                    self.publish(PollEvent::Progress {
                        tracker_id: self.tracker_id,
                        job_id: job_id.clone(),
                        status,
                        percent,
                    });
                }
                Step::Unchanged => self.publish_view(),
                Step::Ignored => {}
                Step::Finished(outcome) => return self.finished(outcome),
            }
        }
    }

    fn finished(mut self, outcome: JobOutcome) -> PollExit {
        let reason = match self.tracker.state() {
            PollState::Stopped(reason) => reason,
            _ => StopReason::Failed,
        };
        let job_id = self.tracker.job().id.clone();

        tracing::info!(
            tracker_id = %self.tracker_id,
            job_id = %job_id,
            ?reason,
            requests = self.tracker.requests(),
            "Polling stopped",
        );

        self.publish_view();
        self.publish(match &outcome {
            JobOutcome::Succeeded { url } => PollEvent::Completed {
                tracker_id: self.tracker_id,
                job_id,
                url: url.clone(),
            },
            JobOutcome::Failed { error } => PollEvent::Failed {
                tracker_id: self.tracker_id,
                job_id,
                error: error.clone(),
                timed_out: reason == StopReason::TimedOut,
            },
        });
        deliver(&self.handoff, outcome.clone());

        PollExit {
            reason,
            outcome: Some(outcome),
            progress: self.tracker.progress(),
        }
    }

    fn cancelled(mut self) -> PollExit {
        self.tracker.cancel();
        let job_id = self.tracker.job().id.clone();
        tracing::info!(tracker_id = %self.tracker_id, job_id = %job_id, "Polling cancelled");

        self.publish_view();
        self.publish(PollEvent::Cancelled {
            tracker_id: self.tracker_id,
            job_id,
        });

        PollExit {
            reason: StopReason::Cancelled,
            outcome: None,
            progress: self.tracker.progress(),
        }
    }

    fn timed_out(mut self) -> PollExit {
        let waited = self.config.max_duration.unwrap_or(Duration::ZERO);
        tracing::warn!(
            tracker_id = %self.tracker_id,
            job_id = %self.tracker.job().id,
            waited_secs = waited.as_secs(),
            "Polling timed out",
        );
        match self.tracker.time_out(waited) {
            Some(outcome) => self.finished(outcome),
            None => self.cancelled(),
        }
    }

    fn publish_view(&self) {
        self.view_tx.send_replace(self.tracker.view());
    }

    fn publish(&self, event: PollEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }
}

/// Deliver through the shared handoff. A poisoned lock only means a
/// callback panicked; the handoff had already marked itself delivered.
fn deliver(handoff: &SharedHandoff, outcome: JobOutcome) -> bool {
    handoff
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .deliver(outcome)
}

/// Sleep until `deadline`, or forever when there is none.
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
