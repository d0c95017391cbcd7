use std::time::Duration;

use tracing::warn;

use crate::error::AppError;

const TRANSIENT_STATUSES: [u16; 5] = [429, 500, 502, 503, 529];
const BODY_PREVIEW_CHARS: usize = 200;

fn is_transient(status: reqwest::StatusCode) -> bool {
    TRANSIENT_STATUSES.contains(&status.as_u16())
}

/// 1s, 2s, 4s, ... capped at 16s.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.min(4))
}

/// Send an HTTP request, retrying transient statuses with exponential backoff.
///
/// `build_request` is called fresh on each attempt because `RequestBuilder` is
/// not cloneable. Connection-level failures are returned immediately.
pub async fn send_with_retry(
    build_request: impl Fn() -> reqwest::RequestBuilder,
    endpoint_name: &str,
    max_retries: u32,
) -> Result<reqwest::Response, AppError> {
    let mut last_error = None;

    for attempt in 0..=max_retries {
        let response = build_request().send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::ModelInvocation(format!("{} request timed out: {}", endpoint_name, e))
            } else {
                AppError::ModelInvocation(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "could not read body".into());
        let message = format!("{} API error ({}): {}", endpoint_name, status, body);

        if is_transient(status) && attempt < max_retries {
            let delay = backoff_delay(attempt);
            warn!(
                endpoint = endpoint_name,
                %status,
                attempt = attempt + 1,
                max_attempts = max_retries + 1,
                ?delay,
                body = %body.chars().take(BODY_PREVIEW_CHARS).collect::<String>(),
                "transient HTTP error, retrying"
            );
            last_error = Some(message);
            tokio::time::sleep(delay).await;
            continue;
        }

        return Err(AppError::ModelInvocation(message));
    }

    Err(AppError::ModelInvocation(last_error.unwrap_or_else(|| {
        format!("{}: all retries exhausted", endpoint_name)
    })))
}
