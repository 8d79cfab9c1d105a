//! HTTP helpers shared by the provider adapters.

use deliberation_application::{BackendError, FragmentStream};
use deliberation_domain::GenerationFragment;
use futures::StreamExt;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::debug;

/// Send `request`, mapping transport failures and error statuses
pub async fn send(request: RequestBuilder, display_name: &str) -> Result<Response, BackendError> {
    let response = request.send().await.map_err(|err| {
        BackendError::Provider(format!("Error from {}: request failed: {}", display_name, err))
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable error body>".to_string());
    debug!("{} returned HTTP {}: {}", display_name, status, body);
    Err(map_http_error(status, &body, display_name))
}

/// Classify an error response.
///
/// 429 and bodies talking about rate limits or quota become
/// [`BackendError::RateLimited`]; 401/403 become
/// [`BackendError::MissingCredential`].
pub fn map_http_error(status: StatusCode, body: &str, display_name: &str) -> BackendError {
    let message = error_message(body);
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            BackendError::RateLimited(format!("Rate limit exceeded for {}: {}", display_name, message))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::MissingCredential(format!(
            "{} rejected the API key: {}",
            display_name, message
        )),
        _ if mentions_rate_limit(&message) => {
            BackendError::RateLimited(format!("Rate limit exceeded for {}: {}", display_name, message))
        }
        _ => BackendError::Provider(format!(
            "Error from {}: HTTP {}: {}",
            display_name,
            status.as_u16(),
            message
        )),
    }
}

/// `error.message` of the usual JSON error envelope, or the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

fn mentions_rate_limit(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["rate limit", "rate_limit", "quota", "too many requests"]
        .iter()
        .any(|term| lower.contains(term))
}

/// Read a whole JSON body
pub async fn json_body(response: Response, display_name: &str) -> Result<Value, BackendError> {
    response.json::<Value>().await.map_err(|err| {
        BackendError::Provider(format!("Failed to parse response from {}: {}", display_name, err))
    })
}

/// A one-item stream for non-streaming calls
pub fn single(fragment: GenerationFragment) -> FragmentStream {
    futures::stream::iter([Ok(fragment)]).boxed()
}

/// Trim a trailing slash so paths can be appended
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_429_is_rate_limited() {
        let err = map_http_error(StatusCode::TOO_MANY_REQUESTS, "slow down", "GPT");
        assert!(matches!(err, BackendError::RateLimited(_)));
        assert!(err.is_rate_limit());
    }

    #[test]
    fn test_auth_statuses_are_credential_errors() {
        let body = r#"{"error":{"message":"invalid x-api-key"}}"#;
        let err = map_http_error(StatusCode::UNAUTHORIZED, body, "Claude");
        assert_eq!(
            err,
            BackendError::MissingCredential("Claude rejected the API key: invalid x-api-key".into())
        );
        assert!(!err.is_retryable());
        assert!(matches!(
            map_http_error(StatusCode::FORBIDDEN, "", "Claude"),
            BackendError::MissingCredential(_)
        ));
    }

    #[test]
    fn test_quota_body_is_rate_limited() {
        let body = r#"{"error":{"code":400,"message":"Resource has been exhausted (e.g. check quota)."}}"#;
        let err = map_http_error(StatusCode::BAD_REQUEST, body, "Gemini");
        assert!(matches!(err, BackendError::RateLimited(_)));
    }

    #[test]
    fn test_other_errors_are_provider_errors() {
        let err = map_http_error(StatusCode::INTERNAL_SERVER_ERROR, "boom", "Grok");
        assert_eq!(err, BackendError::Provider("Error from Grok: HTTP 500: boom".into()));
    }

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://api.x.ai/v1/", "/chat/completions"),
            "https://api.x.ai/v1/chat/completions"
        );
    }
}
