//! Status response envelope normalization.
//!
//! Status endpoints answer with `{"data": {...}}`. The payload always
//! carries a `status` word, and, depending on the job kind, the result
//! under a different field name. This module turns that JSON into a
//! [`JobSnapshot`].

use serde_json::Value;

use crate::job::{JobKind, JobSnapshot, JobStatus};
use crate::vocabulary::normalize_status;

/// Where the result artifact lives in the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultField {
    /// A string field holding the URL.
    Url(&'static str),
    /// An array of strings; the first non-empty entry is the URL.
    FirstOf(&'static str),
}

/// Fields inspected, in order, for a failure message.
const ERROR_FIELDS: &[&str] = &["error", "message", "error_message"];

/// The result field used by each kind.
pub fn result_field(kind: JobKind) -> ResultField {
    match kind {
        JobKind::VideoGeneration => ResultField::Url("video_url"),
        JobKind::PhotoGeneration => ResultField::FirstOf("image_url_list"),
        JobKind::Translation => ResultField::Url("url"),
        JobKind::CloneDub => ResultField::Url("dubbedVideoPath"),
    }
}

/// Normalize a decoded status response.
///
/// Looks inside `data` when it is an object, otherwise at the root. Returns
/// `None` when no recognizable `status` is present.
pub fn parse_status_body(kind: JobKind, body: &Value) -> Option<JobSnapshot> {
    let payload = match body.get("data") {
        Some(data) if data.is_object() => data,
        _ => body,
    };

    let status = payload
        .get("status")
        .and_then(Value::as_str)
        .and_then(|raw| normalize_status(kind, raw))?;

    Some(JobSnapshot {
        status,
        progress: payload.get("progress").and_then(parse_progress),
        result_url: extract_result_url(kind, payload),
        error: if status == JobStatus::Failed {
            extract_error(payload)
        } else {
            None
        },
    })
}

fn parse_progress(value: &Value) -> Option<f64> {
    let progress = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }?;
    progress.is_finite().then_some(progress)
}

fn extract_result_url(kind: JobKind, payload: &Value) -> Option<String> {
    let url = match result_field(kind) {
        ResultField::Url(field) => payload.get(field).and_then(Value::as_str),
        ResultField::FirstOf(field) => payload
            .get(field)
            .and_then(Value::as_array)
            .and_then(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .find(|s| !s.trim().is_empty())
            }),
    }?;
    let url = url.trim();
    (!url.is_empty()).then(|| url.to_string())
}

fn extract_error(payload: &Value) -> Option<String> {
    ERROR_FIELDS.iter().find_map(|field| {
        let message = match payload.get(*field)? {
            Value::String(s) => s.trim().to_string(),
            Value::Object(obj) => obj.get("message")?.as_str()?.trim().to_string(),
            _ => return None,
        };
        (!message.is_empty()).then_some(message)
    })
}
