//! Single-use delivery of a job's final outcome.
//!
//! What happens after a job finishes (navigate to a preview, show an
//! error) belongs to the caller. [`ResultHandoff`] only guarantees the
//! caller's callback runs at most once.

use dubai_core::job::JobOutcome;

type Callback = Box<dyn FnOnce(JobOutcome) + Send + 'static>;

/// Holds the caller's completion callback until the first delivery.
pub struct ResultHandoff {
    job_id: String,
    callback: Option<Callback>,
}

impl ResultHandoff {
    pub fn new<F>(job_id: impl Into<String>, callback: F) -> Self
    where
        F: FnOnce(JobOutcome) + Send + 'static,
    {
        Self {
            job_id: job_id.into(),
            callback: Some(Box::new(callback)),
        }
    }

    /// Invoke the callback with `outcome`.
    ///
    /// Returns `false` without calling anything if an outcome was already
    /// delivered.
    pub fn deliver(&mut self, outcome: JobOutcome) -> bool {
        match self.callback.take() {
            Some(callback) => {
                tracing::info!(
                    job_id = %self.job_id,
                    success = outcome.is_success(),
                    "Delivering job outcome",
                );
                callback(outcome);
                true
            }
            None => {
                tracing::warn!(
                    job_id = %self.job_id,
                    ?outcome,
                    "Dropping duplicate job outcome",
                );
                false
            }
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.callback.is_none()
    }
}

impl std::fmt::Debug for ResultHandoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultHandoff")
            .field("job_id", &self.job_id)
            .field("delivered", &self.is_delivered())
            .finish()
    }
}
