//! Integration tests for the JSON-lines report.

use dubai_core::job::{JobKind, JobOutcome, JobStatus};
use dubai_polling::events::PollEvent;
use dubai_polling::tracker::StopReason;
use dubai_tracker::report::{self, event_line, outcome_line};
use uuid::Uuid;

fn parse(line: Result<String, serde_json::Error>) -> serde_json::Value {
    serde_json::from_str(&line.expect("line should serialize")).expect("line should be JSON")
}

#[test]
fn progress_event_line_has_type_and_fields() {
    let tracker_id = Uuid::now_v7();
    let event = PollEvent::Progress {
        tracker_id,
        job_id: "abc123".into(),
        status: JobStatus::Processing,
        percent: 55.0,
    };

    let parsed = parse(event_line(&event));

    assert_eq!(parsed["type"], "job_progress");
    assert_eq!(parsed["event"], "progress");
    assert_eq!(parsed["job_id"], "abc123");
    assert_eq!(parsed["tracker_id"], tracker_id.to_string());
    assert_eq!(parsed["status"], "processing");
    assert_eq!(parsed["percent"], 55.0);
    assert!(parsed["timestamp"].is_string());
}

#[test]
fn every_event_maps_to_a_message_type() {
    let job_id = || "abc123".to_string();
    let cases = [
        (
            PollEvent::Started {
                tracker_id: Uuid::nil(),
                job_id: job_id(),
                kind: JobKind::Translation,
            },
            "job_started",
        ),
        (
            PollEvent::Completed {
                tracker_id: Uuid::nil(),
                job_id: job_id(),
                url: "https://x".into(),
            },
            "job_completed",
        ),
        (
            PollEvent::Failed {
                tracker_id: Uuid::nil(),
                job_id: job_id(),
                error: "boom".into(),
                timed_out: false,
            },
            "job_failed",
        ),
        (
            PollEvent::Cancelled {
                tracker_id: Uuid::nil(),
                job_id: job_id(),
            },
            "job_cancelled",
        ),
    ];

    for (event, expected) in cases {
        assert_eq!(report::msg_type(&event), expected);
        assert_eq!(parse(event_line(&event))["type"], expected);
    }
}

#[test]
fn outcome_line_includes_delivered_result() {
    let outcome = JobOutcome::Succeeded {
        url: "https://cdn/abc123.mp4".into(),
    };

    let parsed = parse(outcome_line(
        "abc123",
        JobKind::VideoGeneration,
        StopReason::Succeeded,
        Some(&outcome),
        100.0,
    ));

    assert_eq!(parsed["type"], "job_outcome");
    assert_eq!(parsed["kind"], "video_generation");
    assert_eq!(parsed["reason"], "succeeded");
    assert_eq!(parsed["outcome"], "succeeded");
    assert_eq!(parsed["url"], "https://cdn/abc123.mp4");
    assert_eq!(parsed["progress"], 100.0);
}

#[test]
fn cancelled_outcome_line_has_no_result() {
    let parsed = parse(outcome_line(
        "abc123",
        JobKind::Translation,
        StopReason::Cancelled,
        None,
        55.0,
    ));

    assert_eq!(parsed["reason"], "cancelled");
    assert!(parsed.get("outcome").is_none());
    assert!(parsed.get("url").is_none());
}

#[test]
fn exit_codes_follow_reason() {
    assert_eq!(report::exit_code(StopReason::Succeeded), 0);
    assert_eq!(report::exit_code(StopReason::Failed), 1);
    assert_eq!(report::exit_code(StopReason::TimedOut), 1);
    assert_eq!(report::exit_code(StopReason::Cancelled), 130);
}
