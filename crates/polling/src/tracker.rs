//! Polling state machine for one job.
//!
//! [`PollTracker`] holds no timers and performs no I/O: the controller
//! feeds it observations and acts on the returned [`Step`]. Every
//! transition first checks the tracker is still polling, so a late or
//! duplicate response can never produce a second outcome or revive a
//! cancelled tracker.
//!
//! ```text
//! Idle -> Polling -> Stopped(Succeeded | Failed | Cancelled | TimedOut)
//! ```

use std::time::Duration;

use dubai_core::job::{Job, JobOutcome, JobSnapshot, JobStatus};
use dubai_core::progress::ProgressEstimator;
use dubai_core::types::Timestamp;
use serde::Serialize;

use crate::api::JobStatusError;
use crate::config::PollingConfig;

/// Failure message when the backend reports success without a URL.
pub const MISSING_RESULT_ERROR: &str = "Job reported success without a result URL";
/// Failure message when the backend reports failure without a message.
pub const DEFAULT_FAILURE_ERROR: &str = "Job failed";

/// Why polling stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Succeeded,
    Failed,
    Cancelled,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum PollState {
    Idle,
    Polling,
    Stopped(StopReason),
}

impl PollState {
    pub fn is_stopped(self) -> bool {
        matches!(self, PollState::Stopped(_))
    }
}

/// The result of one status check, as seen by the tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Snapshot(JobSnapshot),
    /// The response carried no recognizable status.
    NoStatus,
    /// The request failed; polling continues.
    Transient(String),
}

impl From<Result<Option<JobSnapshot>, JobStatusError>> for Observation {
    fn from(result: Result<Option<JobSnapshot>, JobStatusError>) -> Self {
        match result {
            Ok(Some(snapshot)) => Observation::Snapshot(snapshot),
            Ok(None) => Observation::NoStatus,
            Err(e) => Observation::Transient(e.to_string()),
        }
    }
}

/// What an observation did to the tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// The tracker is not polling; the observation was discarded.
    Ignored,
    /// Nothing new; previous state retained.
    Unchanged,
    /// Non-terminal status recorded.
    Progressed { status: JobStatus, percent: f64 },
    /// The job reached a terminal outcome. Returned at most once.
    Finished(JobOutcome),
}

/// Read-only view of a tracker, published after every transition.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerView {
    pub state: PollState,
    pub job: Job,
    /// Displayed progress (0-100).
    pub progress: f64,
    /// Status requests issued so far.
    pub requests: u64,
    pub last_polled_at: Option<Timestamp>,
}

/// State machine tracking exactly one job.
#[derive(Debug)]
pub struct PollTracker {
    job: Job,
    state: PollState,
    estimator: ProgressEstimator,
    in_flight: bool,
    requests: u64,
    last_polled_at: Option<Timestamp>,
}

impl PollTracker {
    pub fn new(job: Job, config: &PollingConfig) -> Self {
        Self {
            job,
            state: PollState::Idle,
            estimator: ProgressEstimator::new(config.ramp_step, config.reset_progress_on_failure),
            in_flight: false,
            requests: 0,
            last_polled_at: None,
        }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn progress(&self) -> f64 {
        self.estimator.current()
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn requests(&self) -> u64 {
        self.requests
    }

    pub fn view(&self) -> TrackerView {
        TrackerView {
            state: self.state,
            job: self.job.clone(),
            progress: self.progress(),
            requests: self.requests,
            last_polled_at: self.last_polled_at,
        }
    }

    /// `Idle -> Polling`. Returns `false` if already started or stopped.
    pub fn start(&mut self) -> bool {
        if self.state != PollState::Idle {
            return false;
        }
        self.state = PollState::Polling;
        true
    }

    /// Claim the in-flight slot for a new status request.
    ///
    /// Returns `false` when not polling or a request is still outstanding;
    /// the caller must skip this tick.
    pub fn begin_request(&mut self) -> bool {
        if self.state != PollState::Polling || self.in_flight {
            return false;
        }
        self.in_flight = true;
        self.requests += 1;
        true
    }

    /// Release the in-flight slot and apply the response.
    pub fn finish_request(&mut self, observation: Observation) -> Step {
        self.in_flight = false;
        self.last_polled_at = Some(chrono::Utc::now());
        self.observe(observation)
    }

    /// Apply one observation, guarded on the tracker still polling.
    pub fn observe(&mut self, observation: Observation) -> Step {
        if self.state != PollState::Polling {
            return Step::Ignored;
        }

        let snapshot = match observation {
            Observation::Snapshot(snapshot) => snapshot,
            Observation::NoStatus | Observation::Transient(_) => return Step::Unchanged,
        };

        match snapshot.status {
            JobStatus::Succeeded => match snapshot.result_url {
                Some(url) if !url.trim().is_empty() => self.succeed(url),
                _ => self.fail(MISSING_RESULT_ERROR.to_string(), StopReason::Failed),
            },
            JobStatus::Failed => {
                let error = snapshot
                    .error
                    .unwrap_or_else(|| DEFAULT_FAILURE_ERROR.to_string());
                self.fail(error, StopReason::Failed)
            }
            status @ (JobStatus::Pending | JobStatus::Processing) => {
                if let Err(e) = self.job.observe(status, snapshot.progress) {
                    tracing::warn!(job_id = %self.job.id, error = %e, "Discarding observation");
                    return Step::Ignored;
                }
                let percent = self.estimator.observe(status, snapshot.progress);
                Step::Progressed { status, percent }
            }
        }
    }

    /// `Polling -> Stopped(Cancelled)`. No outcome is produced.
    pub fn cancel(&mut self) -> bool {
        if self.state.is_stopped() {
            return false;
        }
        self.state = PollState::Stopped(StopReason::Cancelled);
        self.in_flight = false;
        true
    }

    /// `Polling -> Stopped(TimedOut)`, producing a failure outcome.
    pub fn time_out(&mut self, waited: Duration) -> Option<JobOutcome> {
        if self.state != PollState::Polling {
            return None;
        }
        let error = format!(
            "Job did not finish within {}s of polling",
            waited.as_secs()
        );
        match self.fail(error, StopReason::TimedOut) {
            Step::Finished(outcome) => Some(outcome),
            _ => None,
        }
    }

    // ---- private helpers ----

    fn succeed(&mut self, url: String) -> Step {
        if let Err(e) = self.job.succeed(url.clone()) {
            tracing::warn!(job_id = %self.job.id, error = %e, "Discarding success");
            return Step::Ignored;
        }
        self.estimator.complete();
        self.stop(StopReason::Succeeded);
        Step::Finished(JobOutcome::Succeeded { url })
    }

    fn fail(&mut self, error: String, reason: StopReason) -> Step {
        if let Err(e) = self.job.fail(error.clone()) {
            tracing::warn!(job_id = %self.job.id, error = %e, "Discarding failure");
            return Step::Ignored;
        }
        self.estimator.fail();
        self.stop(reason);
        Step::Finished(JobOutcome::Failed { error })
    }

    fn stop(&mut self, reason: StopReason) {
        self.state = PollState::Stopped(reason);
        self.in_flight = false;
    }
}
