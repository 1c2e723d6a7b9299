//! JSON-lines report written to stdout.
//!
//! Every polling event becomes one line tagged with a `type` from
//! [`dubai_core::job_events`]. A final `job_outcome` line carries the
//! handed-off result, if any, and how tracking ended.

use chrono::Utc;
use serde::Serialize;

use dubai_core::job::{JobKind, JobOutcome};
use dubai_core::job_events::{
    MSG_TYPE_JOB_CANCELLED, MSG_TYPE_JOB_COMPLETED, MSG_TYPE_JOB_FAILED, MSG_TYPE_JOB_OUTCOME,
    MSG_TYPE_JOB_PROGRESS, MSG_TYPE_JOB_STARTED,
};
use dubai_polling::events::PollEvent;
use dubai_polling::tracker::StopReason;

/// Process exit code for a successful job.
pub const EXIT_SUCCEEDED: i32 = 0;
/// Process exit code when the job failed or polling timed out.
pub const EXIT_FAILED: i32 = 1;
/// Process exit code for an invalid configuration.
pub const EXIT_CONFIG: i32 = 2;
/// Process exit code after an interrupt (128 + SIGINT).
pub const EXIT_CANCELLED: i32 = 130;

#[derive(Debug, Serialize)]
struct EventPayload<'a> {
    r#type: &'static str,
    #[serde(flatten)]
    event: &'a PollEvent,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct OutcomePayload<'a> {
    r#type: &'static str,
    job_id: &'a str,
    kind: JobKind,
    reason: StopReason,
    #[serde(flatten)]
    outcome: Option<&'a JobOutcome>,
    progress: f64,
    timestamp: String,
}

/// Message type for an event line.
pub fn msg_type(event: &PollEvent) -> &'static str {
    match event {
        PollEvent::Started { .. } => MSG_TYPE_JOB_STARTED,
        PollEvent::Progress { .. } => MSG_TYPE_JOB_PROGRESS,
        PollEvent::Completed { .. } => MSG_TYPE_JOB_COMPLETED,
        PollEvent::Failed { .. } => MSG_TYPE_JOB_FAILED,
        PollEvent::Cancelled { .. } => MSG_TYPE_JOB_CANCELLED,
    }
}

/// Serialize one event as a JSON line (without the trailing newline).
pub fn event_line(event: &PollEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(&EventPayload {
        r#type: msg_type(event),
        event,
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Serialize the final outcome line. `outcome` is `None` after cancellation.
pub fn outcome_line(
    job_id: &str,
    kind: JobKind,
    reason: StopReason,
    outcome: Option<&JobOutcome>,
    progress: f64,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&OutcomePayload {
        r#type: MSG_TYPE_JOB_OUTCOME,
        job_id,
        kind,
        reason,
        outcome,
        progress,
        timestamp: Utc::now().to_rfc3339(),
    })
}

pub fn exit_code(reason: StopReason) -> i32 {
    match reason {
        StopReason::Succeeded => EXIT_SUCCEEDED,
        StopReason::Failed | StopReason::TimedOut => EXIT_FAILED,
        StopReason::Cancelled => EXIT_CANCELLED,
    }
}

/// Print a line to stdout, logging instead if it cannot be serialized.
pub fn emit(line: Result<String, serde_json::Error>) {
    match line {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::error!(error = %e, "Failed to serialize report line"),
    }
}
