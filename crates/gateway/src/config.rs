use std::time::Duration;

/// Default per-request timeout for both services.
pub const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Service endpoints loaded from environment variables.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the generation service, without a trailing slash.
    pub generation_api_url: String,
    /// Base URL of the analysis service. Zone views skip analysis when unset.
    pub analysis_api_url: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                | Default     |
    /// |------------------------|-------------|
    /// | `GENERATION_API_URL`   | required    |
    /// | `ANALYSIS_API_URL`     | unset       |
    /// | `GATEWAY_TIMEOUT_SECS` | `120`       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let generation_api_url = lookup("GENERATION_API_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("GENERATION_API_URL"))?;

        let analysis_api_url = lookup("ANALYSIS_API_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty());

        let timeout_secs = match lookup("GATEWAY_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Invalid {
                    var: "GATEWAY_TIMEOUT_SECS",
                    value: raw,
                })?,
            None => DEFAULT_GATEWAY_TIMEOUT_SECS,
        };

        Ok(Self {
            generation_api_url,
            analysis_api_url,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}
