//! Domain types and pure logic for tracking long-running Dub AI jobs.
//!
//! Everything here is synchronous and free of I/O: the job model, the
//! backend status vocabulary, response-envelope normalization, and the
//! progress estimator. The polling runtime lives in `dubai-polling`.

pub mod envelope;
pub mod error;
pub mod job;
pub mod job_events;
pub mod progress;
pub mod types;
pub mod vocabulary;
