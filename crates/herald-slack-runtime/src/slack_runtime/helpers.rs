//! Retry and error-shaping helpers for the Slack Web API client.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;

pub(super) fn retry_after_seconds(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    value.trim().parse().ok()
}

/// Server hint wins outright; otherwise the base delay doubles per attempt,
/// capped at six doublings.
pub(super) fn backoff_delay(attempt: usize, base: Duration, server_hint: Option<u64>) -> Duration {
    match server_hint {
        Some(seconds) => Duration::from_secs(seconds),
        None => {
            let doublings = attempt.saturating_sub(1).min(6) as u32;
            base.saturating_mul(1_u32 << doublings)
        }
    }
}

pub(super) fn should_retry_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

pub(super) fn should_retry_transport(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout() || error.is_request() || error.is_body()
}

/// Clips a response body for an error message without splitting a char.
pub(super) fn clip_for_log(value: &str, limit: usize) -> String {
    match value.char_indices().nth(limit) {
        None => value.to_string(),
        Some((byte_end, _)) => format!("{}...", &value[..byte_end]),
    }
}

#[cfg(test)]
mod tests {
    use super::{backoff_delay, clip_for_log, retry_after_seconds, should_retry_status};
    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
    use reqwest::StatusCode;
    use std::time::Duration;

    #[test]
    fn unit_retry_after_seconds_requires_a_numeric_header() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("30"));
        assert_eq!(retry_after_seconds(&headers), Some(30));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(retry_after_seconds(&headers), None);
        assert_eq!(retry_after_seconds(&HeaderMap::new()), None);
    }

    #[test]
    fn unit_backoff_delay_doubles_until_the_server_hints() {
        let base = Duration::from_millis(250);
        assert_eq!(backoff_delay(1, base, None), Duration::from_millis(250));
        assert_eq!(backoff_delay(2, base, None), Duration::from_millis(500));
        assert_eq!(backoff_delay(4, base, None), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(4, base, Some(7)), Duration::from_secs(7));
    }

    #[test]
    fn unit_should_retry_status_covers_rate_limits_and_server_faults() {
        assert!(should_retry_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(should_retry_status(StatusCode::BAD_GATEWAY));
        assert!(!should_retry_status(StatusCode::FORBIDDEN));
        assert!(!should_retry_status(StatusCode::NOT_FOUND));
    }

    #[test]
    fn regression_clip_for_log_never_splits_multibyte_chars() {
        assert_eq!(clip_for_log("short", 10), "short");
        assert_eq!(clip_for_log("wéird channel", 2), "wé...");
        assert_eq!(clip_for_log("anything", 0), "...");
    }
}
