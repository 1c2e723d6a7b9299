//! Polling runtime for long-running Dub AI backend jobs.
//!
//! Provides the HTTP status client, a single-job polling controller with
//! a scoped handle, the exactly-once result handoff, progress events, and
//! a manager that tracks many jobs at once.

pub mod api;
pub mod config;
pub mod controller;
pub mod events;
pub mod handoff;
pub mod manager;
pub mod source;
pub mod tracker;
