//! HTTP helpers for the trading backend's JSON API with consistent timeouts and
//! error mapping. Feature clients build on these so every call reports errors
//! the same way. The helpers attach bearer tokens handed to them by callers and
//! never log them.

pub mod auth;
pub mod client;

use crate::{errors::AppError, session::types::ApiErrorBody, APP_USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Maximum number of error body characters surfaced to the user.
const MAX_ERROR_CHARS: usize = 200;

/// Builds the shared HTTP client with the crate user agent and a request timeout.
///
/// # Errors
/// Returns `AppError::Config` if the TLS backend cannot be initialised.
pub fn http_client(timeout: Duration) -> Result<Client, AppError> {
    Client::builder()
        .user_agent(APP_USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|err| AppError::Config(format!("Failed to build HTTP client: {err}")))
}

/// Joins the configured base URL and an endpoint path with exactly one slash.
#[must_use]
pub fn build_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim();

    if base.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}

/// Maps transport errors into `AppError` variants with timeout detection.
#[must_use]
pub fn map_request_error(err: &reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Timeout("Request timed out. Please try again.".to_string())
    } else if err.is_builder() {
        AppError::Serialization(format!("Failed to build request: {err}"))
    } else {
        AppError::Network(format!("Unable to reach the server: {err}"))
    }
}

/// Decodes a successful JSON body or converts the failure into an `AppError`.
///
/// # Errors
/// Returns `AppError::Unauthorized` on 401, `AppError::Http` on other error
/// statuses and `AppError::Parse` when the body does not match `T`.
pub async fn handle_json_response<T: DeserializeOwned>(response: Response) -> Result<T, AppError> {
    let status = response.status();
    if status.is_success() {
        response
            .json::<T>()
            .await
            .map_err(|err| AppError::Parse(format!("Failed to decode response: {err}")))
    } else {
        Err(error_from_response(response).await)
    }
}

/// Accepts any success status and discards the body.
///
/// # Errors
/// Same status mapping as [`handle_json_response`].
pub async fn handle_empty_response(response: Response) -> Result<(), AppError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(error_from_response(response).await)
    }
}

async fn error_from_response(response: Response) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);

    debug!("request failed with status {}", status);

    if status == StatusCode::UNAUTHORIZED {
        AppError::Unauthorized(message)
    } else {
        AppError::Http {
            status: status.as_u16(),
            message,
        }
    }
}

/// Extracts `message` from a `{code, message, details}` body (optionally nested
/// under `error`), falling back to the sanitized raw body.
#[must_use]
pub fn error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            let candidate = value.get("error").cloned().unwrap_or(value);
            serde_json::from_value::<ApiErrorBody>(candidate).ok()
        })
        .and_then(|error| error.message)
        .map(|message| message.trim().to_string())
        .filter(|message| !message.is_empty());

    parsed.unwrap_or_else(|| sanitize_body(body))
}

/// Sanitizes error bodies for user-facing messages by trimming and truncating.
#[must_use]
pub fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}
