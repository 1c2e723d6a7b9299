//! Job model shared by the status client and the polling controller.
//!
//! [`JobSnapshot`] is what one status fetch observed, already mapped onto
//! the normalized [`JobStatus`] set. [`Job`] is the tracked record: its
//! transition methods keep `result` and `error` consistent with `status`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Job kind
// ---------------------------------------------------------------------------

/// The kind of remote operation, which selects the status endpoint and
/// the response field mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Avatar video generation.
    VideoGeneration,
    /// Character photo generation.
    PhotoGeneration,
    /// Video translation.
    Translation,
    /// Voice-clone dubbing.
    CloneDub,
}

impl JobKind {
    /// Every kind, in declaration order.
    pub const ALL: [JobKind; 4] = [
        JobKind::VideoGeneration,
        JobKind::PhotoGeneration,
        JobKind::Translation,
        JobKind::CloneDub,
    ];

    /// The snake_case name used in configuration and serialized output.
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::VideoGeneration => "video_generation",
            JobKind::PhotoGeneration => "photo_generation",
            JobKind::Translation => "translation",
            JobKind::CloneDub => "clone_dub",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = CoreError;

    /// Accepts the snake_case name, case-insensitively, with `-` allowed in
    /// place of `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| CoreError::UnknownJobKind(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Normalized status
// ---------------------------------------------------------------------------

/// The shared four-state status every backend vocabulary maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Snapshot and tracked job
// ---------------------------------------------------------------------------

/// Result artifact of a successful job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub url: String,
}

/// One normalized status observation.
///
/// Unlike [`Job`], a snapshot may report `Succeeded` without a URL; the
/// controller decides what that means.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub status: JobStatus,
    /// Server-reported progress, not yet clamped.
    pub progress: Option<f64>,
    pub result_url: Option<String>,
    pub error: Option<String>,
}

impl JobSnapshot {
    /// Snapshot carrying only a status.
    pub fn with_status(status: JobStatus) -> Self {
        Self {
            status,
            progress: None,
            result_url: None,
            error: None,
        }
    }

    pub fn progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn result_url(mut self, url: impl Into<String>) -> Self {
        self.result_url = Some(url.into());
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// A job being tracked by one controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    /// Latest server-reported progress, clamped to `[0, 100]`.
    pub progress: Option<f64>,
    pub result: Option<JobResult>,
    pub error: Option<String>,
    pub updated_at: Option<Timestamp>,
}

/// Job ids are opaque but must be a single, non-empty URL path segment.
pub fn validate_job_id(id: &str) -> Result<(), CoreError> {
    if id.trim().is_empty() {
        return Err(CoreError::Validation("Job id must not be empty".to_string()));
    }
    if let Some(c) = id
        .chars()
        .find(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '%'))
    {
        return Err(CoreError::Validation(format!(
            "Job id '{id}' contains {c:?}, which cannot appear in a status URL"
        )));
    }
    Ok(())
}

impl Job {
    /// Create a pending job. See [`validate_job_id`] for the id rules.
    pub fn new(id: impl Into<JobId>, kind: JobKind) -> Result<Self, CoreError> {
        let id = id.into();
        validate_job_id(&id)?;
        Ok(Self {
            id,
            kind,
            status: JobStatus::Pending,
            progress: None,
            result: None,
            error: None,
            updated_at: None,
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Record a non-terminal observation.
    ///
    /// Terminal snapshots must go through [`succeed`](Self::succeed) or
    /// [`fail`](Self::fail) instead.
    pub fn observe(&mut self, status: JobStatus, progress: Option<f64>) -> Result<(), CoreError> {
        if status.is_terminal() {
            return Err(self.transition_error(status));
        }
        self.ensure_open(status)?;
        self.status = status;
        if let Some(progress) = progress.filter(|p| p.is_finite()) {
            self.progress = Some(progress.clamp(0.0, 100.0));
        }
        self.touch();
        Ok(())
    }

    pub fn succeed(&mut self, url: impl Into<String>) -> Result<(), CoreError> {
        self.ensure_open(JobStatus::Succeeded)?;
        self.status = JobStatus::Succeeded;
        self.progress = Some(100.0);
        self.result = Some(JobResult { url: url.into() });
        self.error = None;
        self.touch();
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), CoreError> {
        self.ensure_open(JobStatus::Failed)?;
        self.status = JobStatus::Failed;
        self.result = None;
        self.error = Some(error.into());
        self.touch();
        Ok(())
    }

    fn ensure_open(&self, requested: JobStatus) -> Result<(), CoreError> {
        if self.is_terminal() {
            Err(self.transition_error(requested))
        } else {
            Ok(())
        }
    }

    fn transition_error(&self, requested: JobStatus) -> CoreError {
        CoreError::InvalidTransition {
            job_id: self.id.clone(),
            current: self.status,
            requested,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Some(chrono::Utc::now());
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What the caller receives exactly once when tracking finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded { url: String },
    Failed { error: String },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            JobOutcome::Succeeded { url } => Some(url),
            JobOutcome::Failed { .. } => None,
        }
    }
}
