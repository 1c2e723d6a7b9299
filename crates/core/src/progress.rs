//! Displayable progress estimation.
//!
//! Backends only sometimes report a numeric progress. When they do, it is
//! shown as-is (clamped). When they don't, the estimate is derived from the
//! status: a fixed value while pending, then a slow synthetic ramp while
//! processing that stops short of 100 so the bar never claims completion
//! before the job actually finishes.

use crate::job::JobStatus;

/// Displayed while the job is pending and no progress is reported.
pub const PENDING_PROGRESS: f64 = 10.0;
/// Floor applied on the first synthetic `processing` observation.
pub const PROCESSING_FLOOR: f64 = 50.0;
/// The synthetic ramp never goes above this.
pub const SYNTHETIC_CAP: f64 = 90.0;
/// Default increment per `processing` observation.
pub const DEFAULT_RAMP_STEP: f64 = 5.0;
/// Displayed once the job succeeded.
pub const COMPLETE_PROGRESS: f64 = 100.0;

/// Produces a single 0-100 progress value for one tracked job.
#[derive(Debug, Clone)]
pub struct ProgressEstimator {
    step: f64,
    reset_on_failure: bool,
    current: f64,
    /// The previous observation advanced the synthetic ramp.
    ramping: bool,
}

impl Default for ProgressEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_RAMP_STEP, true)
    }
}

impl ProgressEstimator {
    /// Create an estimator starting at 0.
    ///
    /// A negative or non-finite `step` falls back to [`DEFAULT_RAMP_STEP`].
    pub fn new(step: f64, reset_on_failure: bool) -> Self {
        let step = if step.is_finite() && step >= 0.0 {
            step
        } else {
            DEFAULT_RAMP_STEP
        };
        Self {
            step,
            reset_on_failure,
            current: 0.0,
            ramping: false,
        }
    }

    /// The current estimate.
    pub fn current(&self) -> f64 {
        self.current
    }

    /// Fold in one non-terminal observation and return the new estimate.
    ///
    /// Terminal statuses leave the value untouched; use
    /// [`complete`](Self::complete) and [`fail`](Self::fail) instead.
    pub fn observe(&mut self, status: JobStatus, server_progress: Option<f64>) -> f64 {
        if let Some(progress) = server_progress.filter(|p| p.is_finite()) {
            self.current = progress.clamp(0.0, COMPLETE_PROGRESS);
            self.ramping = false;
            return self.current;
        }

        match status {
            JobStatus::Pending => {
                self.current = self.current.max(PENDING_PROGRESS);
                self.ramping = false;
            }
            JobStatus::Processing => {
                let floored = self.current.max(PROCESSING_FLOOR);
                self.current = if self.ramping && floored < SYNTHETIC_CAP {
                    (floored + self.step).min(SYNTHETIC_CAP)
                } else {
                    floored
                };
                self.ramping = true;
            }
            JobStatus::Succeeded | JobStatus::Failed => {}
        }
        self.current
    }

    /// Force the estimate to 100.
    pub fn complete(&mut self) -> f64 {
        self.current = COMPLETE_PROGRESS;
        self.ramping = false;
        self.current
    }

    /// Apply the failure policy: reset to 0, or keep the last value.
    pub fn fail(&mut self) -> f64 {
        if self.reset_on_failure {
            self.current = 0.0;
        }
        self.ramping = false;
        self.current
    }
}
