use std::time::Duration;

use serde::Deserialize;

/// Failure classes of the external services.
///
/// None of these are retried automatically; callers decide whether to try
/// again.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Rate limited by the generation service")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Generation quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Request rejected by the generation service: {0}")]
    ValidationRejected(String),

    #[error("Generation service unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    /// Stable machine-readable code, matching the service's own `code` field.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::RateLimited { .. } => "RATE_LIMITED",
            GatewayError::QuotaExceeded(_) => "QUOTA_EXCEEDED",
            GatewayError::ValidationRejected(_) => "VALIDATION_ERROR",
            GatewayError::Unavailable(_) => "UNAVAILABLE",
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Unavailable(err.to_string())
    }
}

/// Error body shape the services use: `{"code": "...", "message": "..."}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

/// Classify a non-success HTTP response.
///
/// A recognised `code` in a JSON body wins over the status code. Otherwise
/// 429 is rate limiting, 402 is quota, 400/422 are validation rejections and
/// everything else counts as unavailable.
pub fn classify_response(status: u16, retry_after: Option<&str>, body: &str) -> GatewayError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|b| b.message.clone().or_else(|| b.error.clone()))
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("HTTP {status}")
            } else {
                body.trim().to_string()
            }
        });
    let retry_after = retry_after.and_then(parse_retry_after);

    let by_code = parsed
        .as_ref()
        .and_then(|b| b.code.as_deref())
        .and_then(|code| match code {
            "RATE_LIMITED" => Some(GatewayError::RateLimited { retry_after }),
            "QUOTA_EXCEEDED" => Some(GatewayError::QuotaExceeded(message.clone())),
            "VALIDATION_ERROR" => Some(GatewayError::ValidationRejected(message.clone())),
            _ => None,
        });
    if let Some(err) = by_code {
        return err;
    }

    match status {
        429 => GatewayError::RateLimited { retry_after },
        402 => GatewayError::QuotaExceeded(message),
        400 | 422 => GatewayError::ValidationRejected(message),
        _ => GatewayError::Unavailable(message),
    }
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
