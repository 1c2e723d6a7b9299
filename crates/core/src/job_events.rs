//! Message type constants for job tracking events.
//!
//! Used by the tracker binary when it writes one JSON line per event.

/// Status or progress update while the job is still running.
pub const MSG_TYPE_JOB_PROGRESS: &str = "job_progress";

/// Polling started for a job.
pub const MSG_TYPE_JOB_STARTED: &str = "job_started";

/// Job completed successfully and a result URL is available.
pub const MSG_TYPE_JOB_COMPLETED: &str = "job_completed";

/// Job failed, or polling gave up waiting for it.
pub const MSG_TYPE_JOB_FAILED: &str = "job_failed";

/// Tracking was cancelled by the caller.
pub const MSG_TYPE_JOB_CANCELLED: &str = "job_cancelled";

/// Final outcome line printed when tracking ends.
pub const MSG_TYPE_JOB_OUTCOME: &str = "job_outcome";
