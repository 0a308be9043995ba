use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;

use crate::errors::{AppError, Result};

const BODY_SNIPPET_LIMIT: usize = 200;

/// Builds the HTTP client shared by every remote service of a run.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("photobackup/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Maps a non-success HTTP status to the error taxonomy.
/// A 403 that reports a rate limit is transient, not a credential problem.
pub fn status_error(service: &str, status: StatusCode, body: &str) -> AppError {
    let snippet: String = body.chars().take(BODY_SNIPPET_LIMIT).collect();
    match status {
        StatusCode::FORBIDDEN if is_rate_limited(body) => {
            AppError::network(service, format!("HTTP {} (rate limited): {}", status, snippet))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AppError::auth(service, format!("HTTP {}: {}", status, snippet))
        }
        _ => AppError::network(service, format!("HTTP {}: {}", status, snippet)),
    }
}

/// Google-style error bodies: `{"error": {"errors": [{"reason": "..."}]}}`.
fn is_rate_limited(body: &str) -> bool {
    let Ok(parsed) = serde_json::from_str::<Value>(body) else {
        return false;
    };
    parsed
        .pointer("/error/errors")
        .and_then(Value::as_array)
        .is_some_and(|errors| {
            errors.iter().any(|e| {
                matches!(
                    e.get("reason").and_then(Value::as_str),
                    Some("rateLimitExceeded" | "userRateLimitExceeded")
                )
            })
        })
}

/// Passes successful responses through and turns the rest into errors.
pub async fn ensure_success(service: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(service, status, &body))
}
