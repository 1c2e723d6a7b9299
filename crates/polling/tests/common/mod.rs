#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dubai_core::envelope::parse_status_body;
use dubai_core::job::{JobKind, JobOutcome, JobSnapshot};
use dubai_polling::api::JobStatusError;
use dubai_polling::source::StatusSource;
use tokio::sync::Notify;

/// Parse a backend body the same way the HTTP client does.
pub fn snapshot(kind: JobKind, body: serde_json::Value) -> JobSnapshot {
    parse_status_body(kind, &body).expect("body should carry a recognizable status")
}

/// Lets a test hold a status request open until it says otherwise.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

/// One scripted reply.
#[derive(Clone)]
pub enum Reply {
    Status(JobSnapshot),
    NoStatus,
    ServerError(u16),
    /// Signal `entered`, wait for `release`, then reply with the snapshot.
    Gated(Arc<Gate>, JobSnapshot),
    /// Panic inside the request.
    Panic,
}

/// A status source that replays a fixed script, then repeats a fallback
/// reply forever.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    seen: Mutex<Vec<(String, JobKind)>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Reply>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Reply::NoStatus,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `reply` once the script runs out.
    pub fn then_forever(mut self, reply: Reply) -> Self {
        self.fallback = reply;
        self
    }

    /// Sleep this long inside every request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<(String, JobKind)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusSource for ScriptedSource {
    async fn fetch_status(
        &self,
        job_id: &str,
        kind: JobKind,
    ) -> Result<Option<JobSnapshot>, JobStatusError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push((job_id.to_string(), kind));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = match reply {
            Reply::Status(snapshot) => Ok(Some(snapshot)),
            Reply::NoStatus => Ok(None),
            Reply::ServerError(status) => Err(JobStatusError::ApiError {
                status,
                body: "scripted failure".to_string(),
            }),
            Reply::Gated(gate, snapshot) => {
                gate.entered.notify_one();
                gate.release.notified().await;
                Ok(Some(snapshot))
            }
            Reply::Panic => panic!("status source blew up"),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Records every outcome handed to a completion callback.
#[derive(Clone, Default)]
pub struct OutcomeLog(Arc<Mutex<Vec<JobOutcome>>>);

impl OutcomeLog {
    pub fn callback(&self) -> impl FnOnce(JobOutcome) + Send + 'static {
        let log = Arc::clone(&self.0);
        move |outcome| log.lock().unwrap().push(outcome)
    }

    pub fn outcomes(&self) -> Vec<JobOutcome> {
        self.0.lock().unwrap().clone()
    }
}
