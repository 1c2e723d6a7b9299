//! The seam between the polling controller and wherever status comes from.

use async_trait::async_trait;
use dubai_core::job::{JobKind, JobSnapshot};

use crate::api::{JobStatusApi, JobStatusError};

/// Performs one status lookup for a job.
///
/// `Ok(None)` means the lookup succeeded but carried no new information.
/// Errors are treated as transient by the controller.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(
        &self,
        job_id: &str,
        kind: JobKind,
    ) -> Result<Option<JobSnapshot>, JobStatusError>;
}

#[async_trait]
impl StatusSource for JobStatusApi {
    async fn fetch_status(
        &self,
        job_id: &str,
        kind: JobKind,
    ) -> Result<Option<JobSnapshot>, JobStatusError> {
        JobStatusApi::fetch_status(self, job_id, kind).await
    }
}
