//! `dubai-tracker` -- track one backend job until it finishes.
//!
//! Polls the job's status endpoint, writes one JSON line per event to
//! stdout, then a final `job_outcome` line. Logs go to stderr.
//!
//! # Environment variables
//!
//! | Variable                    | Required | Default | Description                        |
//! |-----------------------------|----------|---------|------------------------------------|
//! | `JOB_ID`                    | yes      | --      | Backend job id                     |
//! | `JOB_KIND`                  | yes      | --      | `video_generation`, `photo_generation`, `translation` or `clone_dub` |
//! | `DUBAI_API_URL`             | yes      | --      | Backend base URL                   |
//! | `DUBAI_AUTH_TOKEN`          | no       | --      | Bearer credential                  |
//! | `POLL_INTERVAL_MS`          | no       | `4000`  | Milliseconds between status checks |
//! | `POLL_TIMEOUT_SECS`         | no       | `1200`  | Give up after this long (`0` never)|
//! | `PROGRESS_RAMP_STEP`        | no       | `5`     | Synthetic progress per check       |
//! | `RESET_PROGRESS_ON_FAILURE` | no       | `true`  | Show 0% after a failure            |
//! | `REQUEST_TIMEOUT_SECS`      | no       | `30`    | Per-request HTTP timeout           |
//!
//! Exit codes: `0` succeeded, `1` failed or timed out, `2` bad
//! configuration, `130` interrupted.

use std::sync::Arc;

use tokio::sync::{broadcast, oneshot};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dubai_polling::api::JobStatusApi;
use dubai_polling::controller::PollingController;
use dubai_tracker::report;
use dubai_tracker::settings::TrackerSettings;

const DEFAULT_LOG_FILTER: &str = "dubai_tracker=info,dubai_polling=info";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = TrackerSettings::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(report::EXIT_CONFIG);
    });

    let api = JobStatusApi::new(settings.api.clone()).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build HTTP client");
        std::process::exit(report::EXIT_CONFIG);
    });

    tracing::info!(
        job_id = %settings.job_id,
        kind = %settings.kind,
        api_url = %settings.api.base_url,
        interval_ms = settings.polling.interval.as_millis() as u64,
        "Starting dubai-tracker",
    );

    let controller = PollingController::new(Arc::new(api), settings.polling.clone());
    let (outcome_tx, outcome_rx) = oneshot::channel();

    let mut handle = controller
        .start(settings.job_id.clone(), settings.kind, move |outcome| {
            let _ = outcome_tx.send(outcome);
        })
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Cannot track job");
            std::process::exit(report::EXIT_CONFIG);
        });

    let printer = handle.take_events().map(|mut events| {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        report::emit(report::event_line(&event));
                        if event.is_final() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Report writer lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    });

    let cancel = handle.cancel_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        cancel.cancel();
    });

    let exit = handle.join().await;
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    let outcome = outcome_rx.await.ok();
    report::emit(report::outcome_line(
        &settings.job_id,
        settings.kind,
        exit.reason,
        outcome.as_ref(),
        exit.progress,
    ));

    std::process::exit(report::exit_code(exit.reason));
}

/// Wait for Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT (Ctrl-C), cancelling"),
        () = terminate => tracing::info!("Received SIGTERM, cancelling"),
    }
}
