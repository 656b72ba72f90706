use axum::extract::State;
use serde::Deserialize;

use crate::error::ApiError;
use crate::mail::MailMessage;
use crate::middleware::{ApiResponse, JsonBody};
use crate::services::validation::{normalize_email, required, validate_email_format, validate_name};
use crate::state::AppState;

pub const MIN_MESSAGE_LEN: usize = 10;
pub const MAX_MESSAGE_LEN: usize = 5000;

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

/// POST /api/v1/contact
pub async fn submit(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ContactRequest>,
) -> Result<ApiResponse<()>, ApiError> {
    let name = required("name", body.name.as_deref())?;
    validate_name(name)?;
    let email = normalize_email(required("email", body.email.as_deref())?);
    validate_email_format(&email)?;
    let message = required("message", body.message.as_deref())?;

    let len = message.chars().count();
    if !(MIN_MESSAGE_LEN..=MAX_MESSAGE_LEN).contains(&len) {
        return Err(ApiError::field(
            "message",
            format!("Message must be between {} and {} characters", MIN_MESSAGE_LEN, MAX_MESSAGE_LEN),
        ));
    }

    let subject = body
        .subject
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("Contact form submission");

    let mail = &state.config.mail;
    let outgoing = MailMessage {
        to: mail.support_email.clone(),
        from: mail.from_email.clone(),
        reply_to: Some(email.clone()),
        subject: format!("[Contact] {}", subject),
        body: format!("From: {} <{}>\n\n{}", name, email, message),
    };

    state.mailer.send(outgoing).await.map_err(|e| {
        tracing::error!("Contact form delivery failed: {}", e);
        ApiError::internal_server_error("There was an error sending your message. Try again later!")
    })?;

    Ok(ApiResponse::message(
        "Thank you for your message. We will get back to you soon.",
    ))
}
