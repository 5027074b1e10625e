//! Human-readable messages from server errors.
//!
//! YouTrack and Hub report errors in several shapes (OAuth errors,
//! validation errors with children, plain messages). [`ErrorPayload`] covers
//! all of them; [`extract_error_message`] joins whatever is present.

use serde::Deserialize;
use serde_json::{Map, Value};
use ytm_auth::AuthError;

use crate::error::{ClientError, FailedResponse};

/// Shown when an error carries nothing readable.
pub const DEFAULT_ERROR_MESSAGE: &str = "Something went wrong";

/// A nested validation error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorChild {
    #[serde(default)]
    pub error: Option<String>,
}

/// Union of the error shapes servers send.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub error_description: Option<String>,

    #[serde(default)]
    pub error_children: Vec<ErrorChild>,

    #[serde(default)]
    pub error_message: Option<String>,

    /// HTTP status, number or string depending on the source.
    #[serde(default)]
    pub status: Option<Value>,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub body: Option<String>,

    #[serde(default, rename = "bodyText")]
    pub body_text: Option<String>,
}

impl ErrorPayload {
    /// Payload carrying only a message.
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Parse an error body.
    ///
    /// Fields are read one by one; a field of an unexpected type is skipped
    /// without losing the others. Bodies that are not a JSON object fall back
    /// to the status and the raw body text.
    pub fn from_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => Self::from_object(&map),
            _ => Self {
                status: Some(Value::from(status)),
                body_text: Some(body.to_string()).filter(|b| !b.is_empty()),
                ..Default::default()
            },
        }
    }

    fn from_object(map: &Map<String, Value>) -> Self {
        let text = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);

        let error_children = map
            .get("error_children")
            .and_then(Value::as_array)
            .map(|children| {
                children
                    .iter()
                    .map(|child| ErrorChild {
                        error: child.get("error").and_then(Value::as_str).map(str::to_string),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            error_description: text("error_description"),
            error_children,
            error_message: text("error_message"),
            status: map.get("status").cloned(),
            message: text("message"),
            body: text("body"),
            body_text: text("bodyText"),
        }
    }

    /// Payload of a failed response.
    pub fn from_failed(response: &FailedResponse) -> Self {
        Self::from_body(response.status, &response.body)
    }
}

fn status_text(status: &Value) -> Option<String> {
    match status {
        Value::Number(n) if n.as_u64() != Some(0) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Join the readable parts of an error with `". "`.
///
/// Order: description, child errors, then (unless `description_only`)
/// message, status, message, body, body text. Empty parts are skipped.
pub fn extract_error_message(payload: Option<&ErrorPayload>, description_only: bool) -> String {
    let Some(payload) = payload else {
        return DEFAULT_ERROR_MESSAGE.to_string();
    };

    let children: Vec<&str> = payload
        .error_children
        .iter()
        .filter_map(|c| c.error.as_deref())
        .filter(|e| !e.is_empty())
        .collect();

    let mut fields = vec![
        payload.error_description.clone(),
        Some(children.join(", ")),
    ];
    if !description_only {
        fields.extend([
            payload.error_message.clone(),
            payload.status.as_ref().and_then(status_text),
            payload.message.clone(),
            payload.body.clone(),
            payload.body_text.clone(),
        ]);
    }

    let text = fields
        .into_iter()
        .flatten()
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join(". ");

    if text.is_empty() {
        DEFAULT_ERROR_MESSAGE.to_string()
    } else {
        text
    }
}

/// Message for any client error.
pub fn resolve_error_message(error: &ClientError, description_only: bool) -> String {
    let payload = match error {
        ClientError::HttpStatus(response) => ErrorPayload::from_failed(response),
        ClientError::Auth(AuthError::Rejected { status, body }) => {
            ErrorPayload::from_body(*status, body)
        }
        other => ErrorPayload::from_message(other.to_string()),
    };
    extract_error_message(Some(&payload), description_only)
}
