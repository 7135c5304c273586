//! Middleware for logging requests and responses.

use axum::{
    body::HttpBody,
    extract::Request,
    http::{HeaderMap, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::Error;

/// The largest request or response body, in bytes, that is buffered for logging.
pub const MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

/// The fields of a JSON request body that are never written to the logs.
const REDACTED_FIELDS: [&str; 1] = ["password"];

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If the body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it is
/// truncated and the full body is logged at the `debug` level.
/// Passwords in JSON request bodies are replaced with asterisks.
/// Requests with bodies over [MAX_BODY_SIZE] bytes are rejected with
/// [Error::PayloadTooLarge].
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body_text) = match extract_request_parts_and_body_text(request).await {
        Ok(extracted) => extracted,
        Err(error) => return error.into_response(),
    };

    if is_json(&parts.headers) {
        log_request(&parts, &redact_passwords(&body_text));
    } else {
        log_request(&parts, &body_text);
    }

    let request = Request::from_parts(parts, body_text.into());
    let response = next.run(request).await;

    let (parts, body_text) = match extract_response_parts_and_body_text(response).await {
        Ok(extracted) => extracted,
        Err(error) => return error.into_response(),
    };
    log_response(&parts, &body_text);

    Response::from_parts(parts, body_text.into())
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|content_type| content_type.to_str().ok())
        .is_some_and(|content_type| content_type.starts_with("application/json"))
}

/// Replace the value of every [REDACTED_FIELDS] member of a JSON object.
///
/// Bodies that are not valid JSON are returned unchanged.
fn redact_passwords(body_text: &str) -> String {
    let Ok(mut body) = serde_json::from_str::<Value>(body_text) else {
        return body_text.to_owned();
    };

    if let Some(object) = body.as_object_mut() {
        for field in REDACTED_FIELDS {
            if let Some(value) = object.get_mut(field) {
                *value = Value::String("********".to_owned());
            }
        }
    }

    body.to_string()
}

async fn extract_request_parts_and_body_text(
    request: Request,
) -> Result<(axum::http::request::Parts, String), Error> {
    let (parts, body) = request.into_parts();
    if body.size_hint().lower() > MAX_BODY_SIZE as u64 {
        tracing::warn!("rejecting request body over {MAX_BODY_SIZE} bytes");
        return Err(Error::PayloadTooLarge(MAX_BODY_SIZE));
    }

    let body_bytes = axum::body::to_bytes(body, MAX_BODY_SIZE)
        .await
        .map_err(|error| {
            tracing::error!("could not read request body: {error}");
            Error::BodyReadError(error.to_string())
        })?;

    Ok((parts, String::from_utf8_lossy(&body_bytes).to_string()))
}

async fn extract_response_parts_and_body_text(
    response: Response,
) -> Result<(axum::http::response::Parts, String), Error> {
    let (parts, body) = response.into_parts();
    let body_bytes = axum::body::to_bytes(body, MAX_BODY_SIZE)
        .await
        .map_err(|error| {
            tracing::error!("could not read response body: {error}");
            Error::BodyReadError(error.to_string())
        })?;

    Ok((parts, String::from_utf8_lossy(&body_bytes).to_string()))
}

/// Bodies longer than this many bytes are truncated in `info` logs.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

fn truncate(body: &str) -> &str {
    let mut end = LOG_BODY_LENGTH_LIMIT.min(body.len());
    while !body.is_char_boundary(end) {
        end -= 1;
    }

    &body[..end]
}

fn log_request(parts: &axum::http::request::Parts, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Received request: {} {}\nbody: {}...",
            parts.method,
            parts.uri,
            truncate(body)
        );
        tracing::debug!("Full request body: {body:?}");
    } else {
        tracing::info!(
            "Received request: {} {}\nbody: {body:?}",
            parts.method,
            parts.uri
        );
    }
}

fn log_response(parts: &axum::http::response::Parts, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Sending response: {}\nbody: {}...",
            parts.status,
            truncate(body)
        );
        tracing::debug!("Full response body: {body:?}");
    } else {
        tracing::info!("Sending response: {}\nbody: {body:?}", parts.status);
    }
}
