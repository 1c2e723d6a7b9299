//! Polling and status-client configuration.
//!
//! Both configs have defaults suitable for the production backend and can
//! be loaded from environment variables. Loading goes through a lookup
//! function so tests can supply variables without touching the process
//! environment.

use std::str::FromStr;
use std::time::Duration;

use dubai_core::job::JobKind;
use dubai_core::progress::DEFAULT_RAMP_STEP;

/// Default period between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(4000);
/// Default upper bound on how long a job is polled before giving up.
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(20 * 60);
/// Default per-request timeout for status fetches.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Default TCP connect timeout for status fetches.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Placeholder substituted with the job id in endpoint templates.
pub const JOB_ID_PLACEHOLDER: &str = "{job_id}";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{var}='{value}' is invalid: {reason}")]
    Invalid {
        var: String,
        value: String,
        reason: String,
    },

    #[error("Endpoint template for {kind} must contain '{{job_id}}': '{template}'")]
    InvalidTemplate { kind: JobKind, template: String },
}

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

/// Timing and progress policy for one polling controller.
#[derive(Debug, Clone, PartialEq)]
pub struct PollingConfig {
    /// Period between status checks. The first check fires immediately.
    pub interval: Duration,
    /// Give up and report failure after this long. `None` polls forever.
    pub max_duration: Option<Duration>,
    /// Synthetic ramp increment per `processing` observation.
    pub ramp_step: f64,
    /// Force displayed progress to 0 when the job fails.
    pub reset_progress_on_failure: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_duration: Some(DEFAULT_MAX_DURATION),
            ramp_step: DEFAULT_RAMP_STEP,
            reset_progress_on_failure: true,
        }
    }
}

impl PollingConfig {
    /// Load from environment variables with defaults.
    ///
    /// | Env Var                     | Default |
    /// |-----------------------------|---------|
    /// | `POLL_INTERVAL_MS`          | `4000`  |
    /// | `POLL_TIMEOUT_SECS`         | `1200` (`0` disables) |
    /// | `PROGRESS_RAMP_STEP`        | `5`     |
    /// | `RESET_PROGRESS_ON_FAILURE` | `true`  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let interval_ms: u64 = parse_var(
            &lookup,
            "POLL_INTERVAL_MS",
            defaults.interval.as_millis() as u64,
        )?;
        if interval_ms == 0 {
            return Err(invalid("POLL_INTERVAL_MS", "0", "must be greater than zero"));
        }

        let timeout_secs: u64 = parse_var(
            &lookup,
            "POLL_TIMEOUT_SECS",
            DEFAULT_MAX_DURATION.as_secs(),
        )?;

        let ramp_step: f64 = parse_var(&lookup, "PROGRESS_RAMP_STEP", defaults.ramp_step)?;
        if !ramp_step.is_finite() || ramp_step < 0.0 {
            return Err(invalid(
                "PROGRESS_RAMP_STEP",
                &ramp_step.to_string(),
                "must be a non-negative number",
            ));
        }

        let reset_progress_on_failure = match lookup("RESET_PROGRESS_ON_FAILURE") {
            Some(raw) => parse_bool("RESET_PROGRESS_ON_FAILURE", &raw)?,
            None => defaults.reset_progress_on_failure,
        };

        Ok(Self {
            interval: Duration::from_millis(interval_ms),
            max_duration: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            ramp_step,
            reset_progress_on_failure,
        })
    }
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// Status endpoint path template per job kind, relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTemplates {
    video_generation: String,
    photo_generation: String,
    translation: String,
    clone_dub: String,
}

impl Default for EndpointTemplates {
    fn default() -> Self {
        Self {
            video_generation: "video/status/{job_id}".into(),
            photo_generation: "character/photo/status/{job_id}".into(),
            translation: "translation/status/{job_id}".into(),
            clone_dub: "dubbing/clone/status/{job_id}".into(),
        }
    }
}

impl EndpointTemplates {
    pub fn template(&self, kind: JobKind) -> &str {
        match kind {
            JobKind::VideoGeneration => &self.video_generation,
            JobKind::PhotoGeneration => &self.photo_generation,
            JobKind::Translation => &self.translation,
            JobKind::CloneDub => &self.clone_dub,
        }
    }

    /// Replace the template for `kind`. It must contain [`JOB_ID_PLACEHOLDER`].
    pub fn set(&mut self, kind: JobKind, template: impl Into<String>) -> Result<(), ConfigError> {
        let template = template.into();
        if !template.contains(JOB_ID_PLACEHOLDER) {
            return Err(ConfigError::InvalidTemplate { kind, template });
        }
        let slot = match kind {
            JobKind::VideoGeneration => &mut self.video_generation,
            JobKind::PhotoGeneration => &mut self.photo_generation,
            JobKind::Translation => &mut self.translation,
            JobKind::CloneDub => &mut self.clone_dub,
        };
        *slot = template;
        Ok(())
    }

    /// The path for one job, without a leading slash.
    pub fn path_for(&self, kind: JobKind, job_id: &str) -> String {
        self.template(kind)
            .trim_start_matches('/')
            .replace(JOB_ID_PLACEHOLDER, job_id)
    }
}

// ---------------------------------------------------------------------------
// Status client
// ---------------------------------------------------------------------------

/// Connection settings for [`JobStatusApi`](crate::api::JobStatusApi).
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Backend base URL, e.g. `https://api.dub.ai/v1`.
    pub base_url: String,
    /// Bearer credential sent with every status request.
    pub auth_token: Option<String>,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub endpoints: EndpointTemplates,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            endpoints: EndpointTemplates::default(),
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Load from environment variables.
    ///
    /// | Env Var                 | Default              |
    /// |-------------------------|----------------------|
    /// | `DUBAI_API_URL`         | required             |
    /// | `DUBAI_AUTH_TOKEN`      | unset                |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                 |
    /// | `STATUS_PATH_<KIND>`    | built-in template    |
    ///
    /// `<KIND>` is the upper-cased kind name, e.g. `STATUS_PATH_CLONE_DUB`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup("DUBAI_API_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("DUBAI_API_URL"))?;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(invalid(
                "DUBAI_API_URL",
                &base_url,
                "must start with http:// or https://",
            ));
        }

        let auth_token = lookup("DUBAI_AUTH_TOKEN")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let request_timeout_secs: u64 = parse_var(
            &lookup,
            "REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT.as_secs(),
        )?;
        if request_timeout_secs == 0 {
            return Err(invalid("REQUEST_TIMEOUT_SECS", "0", "must be greater than zero"));
        }

        let mut endpoints = EndpointTemplates::default();
        for kind in JobKind::ALL {
            let var = format!("STATUS_PATH_{}", kind.as_str().to_ascii_uppercase());
            if let Some(template) = lookup(var.as_str()) {
                endpoints.set(kind, template.trim())?;
            }
        }

        Ok(Self {
            base_url,
            auth_token,
            request_timeout: Duration::from_secs(request_timeout_secs),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            endpoints,
        })
    }
}

// ---- private helpers ----

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(var, &raw, &e.to_string())),
        None => Ok(default),
    }
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(var, raw, "expected true or false")),
    }
}

fn invalid(var: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var: var.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
