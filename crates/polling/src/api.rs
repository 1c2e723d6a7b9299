//! HTTP client for backend job status endpoints.
//!
//! Wraps one `GET` per status check using [`reqwest`]. Requests carry the
//! bearer credential, no-cache headers and a strictly increasing `_t`
//! query parameter so no intermediate cache can serve stale job state.

use std::sync::atomic::{AtomicI64, Ordering};

use dubai_core::envelope::parse_status_body;
use dubai_core::job::{self, JobKind, JobSnapshot};
use reqwest::header::{CACHE_CONTROL, EXPIRES, PRAGMA};

use crate::config::{ApiConfig, EndpointTemplates};

/// Query parameter carrying the cache-busting timestamp.
pub const CACHE_BUSTER_PARAM: &str = "_t";

/// HTTP client for one backend.
pub struct JobStatusApi {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
    endpoints: EndpointTemplates,
    /// Last cache-buster value handed out, in unix milliseconds.
    last_cache_buster: AtomicI64,
}

/// Errors from a single status fetch. All of them are transient from the
/// polling loop's point of view.
#[derive(Debug, thiserror::Error)]
pub enum JobStatusError {
    /// The job id cannot be placed in a URL path.
    #[error("Invalid job id '{0}'")]
    InvalidJobId(String),

    /// The HTTP request itself failed (network, DNS, TLS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Status API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The body was not valid JSON.
    #[error("Malformed status response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl JobStatusApi {
    /// Build a client with its own connection pool and the configured
    /// timeouts.
    pub fn new(config: ApiConfig) -> Result<Self, JobStatusError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Create a client reusing an existing [`reqwest::Client`]. The
    /// timeouts in `config` are ignored in favour of the client's own.
    pub fn with_client(client: reqwest::Client, config: ApiConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token,
            endpoints: config.endpoints,
            last_cache_buster: AtomicI64::new(0),
        }
    }

    /// Full status URL for a job, without the cache-busting query.
    pub fn status_url(&self, job_id: &str, kind: JobKind) -> Result<String, JobStatusError> {
        validate_job_id(job_id)?;
        Ok(format!(
            "{}/{}",
            self.base_url,
            self.endpoints.path_for(kind, job_id)
        ))
    }

    /// Fetch and normalize the current status of a job.
    ///
    /// Returns `Ok(None)` when the response parsed but carried no
    /// recognizable status.
    pub async fn fetch_status(
        &self,
        job_id: &str,
        kind: JobKind,
    ) -> Result<Option<JobSnapshot>, JobStatusError> {
        let url = self.status_url(job_id, kind)?;

        let mut request = self
            .client
            .get(&url)
            .query(&[(CACHE_BUSTER_PARAM, self.next_cache_buster())])
            .header(CACHE_CONTROL, "no-cache, no-store, must-revalidate")
            .header(PRAGMA, "no-cache")
            .header(EXPIRES, "0");
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = Self::ensure_success(request.send().await?).await?;
        let bytes = response.bytes().await?;
        let body: serde_json::Value = serde_json::from_slice(&bytes)?;

        let snapshot = parse_status_body(kind, &body);
        if snapshot.is_none() {
            tracing::debug!(job_id, kind = %kind, "Status response without recognizable status");
        }
        Ok(snapshot)
    }

    /// Next cache-buster value: the current time in milliseconds, bumped
    /// past the previous value when the clock has not moved.
    pub fn next_cache_buster(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let previous = self
            .last_cache_buster
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }

    // ---- private helpers ----

    /// Return the response unchanged on a success status, or an
    /// [`JobStatusError::ApiError`] with the status and body otherwise.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, JobStatusError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(JobStatusError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

fn validate_job_id(job_id: &str) -> Result<(), JobStatusError> {
    job::validate_job_id(job_id).map_err(|_| JobStatusError::InvalidJobId(job_id.to_string()))
}
