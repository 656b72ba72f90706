use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Success envelope: `{status: "success", results?, data?, message?}`
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: Option<T>,
    pub results: Option<usize>,
    pub message: Option<String>,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            results: None,
            message: None,
            status_code: None,
        }
    }

    /// A list payload; `results` is the number of items in this page.
    pub fn list(data: T, results: usize) -> Self {
        Self {
            results: Some(results),
            ..Self::success(data)
        }
    }

    /// Create a 201 Created response
    pub fn created(data: T) -> Self {
        Self {
            status_code: Some(StatusCode::CREATED),
            ..Self::success(data)
        }
    }
}

impl ApiResponse<()> {
    /// Envelope with a message and no data.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            data: None,
            results: None,
            message: Some(message.into()),
            status_code: None,
        }
    }

    /// Create a 204 No Content response
    pub fn no_content() -> Self {
        Self {
            data: None,
            results: None,
            message: None,
            status_code: Some(StatusCode::NO_CONTENT),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        // For 204 No Content, return empty response
        if status == StatusCode::NO_CONTENT {
            return status.into_response();
        }

        let mut envelope = Map::new();
        envelope.insert("status".into(), json!("success"));
        if let Some(results) = self.results {
            envelope.insert("results".into(), json!(results));
        }
        if let Some(data) = self.data {
            match serde_json::to_value(&data) {
                Ok(value) => {
                    envelope.insert("data".into(), value);
                }
                Err(e) => {
                    tracing::error!("Failed to serialize response data: {}", e);
                    return crate::error::ApiError::internal(e).into_response();
                }
            }
        }
        if let Some(message) = self.message {
            envelope.insert("message".into(), json!(message));
        }

        (status, Json(Value::Object(envelope))).into_response()
    }
}
