//! Shared HTTP plumbing for the provider clients

use reqwest::StatusCode;
use sleuth_core::{ErrorContext, SleuthError, SleuthResult};
use std::time::Duration;

pub(crate) const USER_AGENT: &str = concat!("sleuth/", env!("CARGO_PKG_VERSION"));

/// Build a client with the crate user agent and a request timeout
pub(crate) fn create_http_client(
    timeout_seconds: u64,
    component: &str,
) -> SleuthResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| SleuthError::Internal {
            message: format!("Failed to create HTTP client: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new(component).with_operation("create_client"),
        })
}

/// Map a transport failure; timeouts and connection problems are transient
pub(crate) fn request_error(err: reqwest::Error, component: &str, operation: &str) -> SleuthError {
    if err.is_timeout() {
        return SleuthError::Timeout {
            operation: operation.to_string(),
            duration_ms: 0,
            context: ErrorContext::new(component).with_operation(operation),
        };
    }
    SleuthError::Network {
        message: format!("Request failed: {}", err),
        source: Some(Box::new(err)),
        context: ErrorContext::new(component).with_operation(operation),
    }
}

/// Map a non-success status and its body onto an error
pub(crate) fn status_error(status: StatusCode, body: &str, component: &str) -> SleuthError {
    let body = body.chars().take(500).collect::<String>();
    let message = format!("HTTP {}: {}", status, body);
    let context = ErrorContext::new(component).with_metadata("status", status.as_str());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SleuthError::Config {
            message,
            source: None,
            context: context.with_suggestion("Check that the API key is set and valid"),
        },
        StatusCode::NOT_FOUND => SleuthError::NotFound {
            resource: message,
            context,
        },
        s if s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error() => SleuthError::Network {
            message,
            source: None,
            context: context.with_suggestion("The service is busy; retry later"),
        },
        _ => SleuthError::Internal {
            message,
            source: None,
            context,
        },
    }
}

/// Read the body of a failed response into an error
pub(crate) async fn handle_response_error(
    response: reqwest::Response,
    component: &str,
) -> SleuthError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    status_error(status, &body, component)
}

/// Errors worth another attempt
pub(crate) fn is_transient(err: &SleuthError) -> bool {
    matches!(err, SleuthError::Network { .. } | SleuthError::Timeout { .. })
}
