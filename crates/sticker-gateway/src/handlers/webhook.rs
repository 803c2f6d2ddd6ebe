//! Chat platform webhook: verification handshake and inbound messages.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use metrics::counter;
use serde::Deserialize;
use tracing::{debug, info};

use sticker_chat::WebhookPayload;
use sticker_worker::IntakeRequest;

use crate::error::{GatewayError, GatewayResult};
use crate::state::AppState;
use crate::trigger::intake_request;

/// Query of the platform's subscription handshake.
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Echo the challenge when the verify token matches.
pub async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> GatewayResult<String> {
    if params.mode.as_deref() != Some("subscribe") {
        return Err(GatewayError::bad_request("hub.mode must be subscribe"));
    }
    let expected = state
        .config
        .verify_token
        .as_deref()
        .ok_or_else(|| GatewayError::forbidden("webhook verification is not configured"))?;
    if params.verify_token.as_deref() != Some(expected) {
        return Err(GatewayError::forbidden("verify token mismatch"));
    }
    let challenge = params
        .challenge
        .ok_or_else(|| GatewayError::bad_request("missing hub.challenge"))?;

    info!("Webhook verified");
    Ok(challenge)
}

/// Accept a notification and hand every triggered message to intake.
///
/// The platform only needs a fast 200; intake runs as tracked background
/// jobs whose errors are logged and counted when they are reaped.
pub async fn receive_webhook(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> StatusCode {
    for request in dispatch(&state, &payload) {
        state.jobs.spawn(Arc::clone(&state.intake), request);
    }
    StatusCode::OK
}

/// Remember media for later replies and build the intake requests the
/// notification asks for.
pub fn dispatch(state: &AppState, payload: &WebhookPayload) -> Vec<IntakeRequest> {
    let mut recent = state.recent.lock().unwrap_or_else(|e| e.into_inner());
    let mut requests = Vec::new();

    for (_, message) in payload.messages() {
        if let Some(media) = message.media() {
            recent.remember(&message.id, media);
        }

        match state.triggers.select(message, &recent) {
            Ok(media) => {
                counter!("stickerize_webhook_messages_total", "decision" => "stickerize")
                    .increment(1);
                requests.push(intake_request(message, media));
            }
            Err(skip) => {
                counter!("stickerize_webhook_messages_total", "decision" => skip.as_str())
                    .increment(1);
                debug!(message_id = %message.id, reason = skip.as_str(), "Message skipped");
            }
        }
    }

    requests
}
