//! Settings for a single tracking run, loaded from the environment.

use dubai_core::job::JobKind;
use dubai_polling::config::{ApiConfig, ConfigError, PollingConfig};

/// Everything the binary needs to track one job.
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub job_id: String,
    pub kind: JobKind,
    pub api: ApiConfig,
    pub polling: PollingConfig,
}

impl TrackerSettings {
    /// Load from environment variables.
    ///
    /// `JOB_ID` and `JOB_KIND` are required in addition to the variables
    /// read by [`ApiConfig::from_env`] and [`PollingConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let job_id = lookup("JOB_ID")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("JOB_ID"))?;

        let raw_kind = lookup("JOB_KIND").ok_or(ConfigError::Missing("JOB_KIND"))?;
        let kind: JobKind = raw_kind.parse().map_err(|_| ConfigError::Invalid {
            var: "JOB_KIND".to_string(),
            value: raw_kind.clone(),
            reason: format!(
                "expected one of {}",
                JobKind::ALL.map(JobKind::as_str).join(", ")
            ),
        })?;

        Ok(Self {
            job_id,
            kind,
            api: ApiConfig::from_lookup(&lookup)?,
            polling: PollingConfig::from_lookup(&lookup)?,
        })
    }
}
