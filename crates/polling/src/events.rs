//! Events emitted while a job is being polled.
//!
//! Produced by the controller task and broadcast to every subscriber of a
//! [`PollingHandle`](crate::controller::PollingHandle) or of the
//! [`JobTracker`](crate::manager::JobTracker).
//!
//! Every event carries the `tracker_id` of the session that produced it,
//! so a replaced tracker's final event can be told apart from the one
//! that replaced it.

use dubai_core::job::{JobKind, JobStatus};
use serde::Serialize;
use uuid::Uuid;

/// A lifecycle or progress change for one tracked job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PollEvent {
    /// Polling began.
    Started {
        tracker_id: Uuid,
        job_id: String,
        kind: JobKind,
    },

    /// A non-terminal status was observed.
    Progress {
        tracker_id: Uuid,
        job_id: String,
        status: JobStatus,
        /// Displayed progress (0-100).
        percent: f64,
    },

    /// The job finished with a result URL.
    Completed {
        tracker_id: Uuid,
        job_id: String,
        url: String,
    },

    /// The job failed, or polling timed out waiting for it.
    Failed {
        tracker_id: Uuid,
        job_id: String,
        error: String,
        timed_out: bool,
    },

    /// Polling was cancelled by the caller.
    Cancelled { tracker_id: Uuid, job_id: String },
}

impl PollEvent {
    pub fn job_id(&self) -> &str {
        match self {
            PollEvent::Started { job_id, .. }
            | PollEvent::Progress { job_id, .. }
            | PollEvent::Completed { job_id, .. }
            | PollEvent::Failed { job_id, .. }
            | PollEvent::Cancelled { job_id, .. } => job_id,
        }
    }

    pub fn tracker_id(&self) -> Uuid {
        match self {
            PollEvent::Started { tracker_id, .. }
            | PollEvent::Progress { tracker_id, .. }
            | PollEvent::Completed { tracker_id, .. }
            | PollEvent::Failed { tracker_id, .. }
            | PollEvent::Cancelled { tracker_id, .. } => *tracker_id,
        }
    }

    /// Whether this is the last event for its job.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            PollEvent::Completed { .. } | PollEvent::Failed { .. } | PollEvent::Cancelled { .. }
        )
    }
}
