//! Webhook routes.
//!
//! Both routes run the alert on its own task and answer once it is over:
//! `200 "OK"` on success, `500 "Error"` when the sequence failed. The incident
//! route answers `403 "Nope"` to unsigned or badly signed requests before
//! touching the speaker.

use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{RawQuery, State},
    http::{HeaderMap, StatusCode},
    routing::post,
};
use saconfig::WebhookConfig;
use sacontrol::AlertController;
use tracing::{debug, error, info, warn};

use crate::signature::{AuthError, SIGNATURE_HEADER, parse_form, verify_signature};

pub const DOORBELL_PATH: &str = "/doorbellpress";
pub const INCIDENT_PATH: &str = "/";

type Reply = (StatusCode, &'static str);

#[derive(Clone)]
pub struct IncidentState {
    pub controller: Arc<AlertController>,
    pub webhook: Arc<WebhookConfig>,
}

/// `POST /doorbellpress`, no authentication.
pub fn doorbell_router(controller: Arc<AlertController>) -> Router {
    Router::new()
        .route(DOORBELL_PATH, post(doorbell_press))
        .with_state(controller)
}

/// `POST /`, signed form body.
pub fn incident_router(controller: Arc<AlertController>, webhook: WebhookConfig) -> Router {
    let state = IncidentState {
        controller,
        webhook: Arc::new(webhook),
    };
    Router::new()
        .route(INCIDENT_PATH, post(incident_alert))
        .with_state(state)
}

pub async fn doorbell_press(
    State(controller): State<Arc<AlertController>>,
    RawQuery(query): RawQuery,
) -> Reply {
    debug!(query = query.as_deref().unwrap_or(""), "Doorbell pressed");
    run_alert(&controller).await
}

pub async fn incident_alert(
    State(state): State<IncidentState>,
    headers: HeaderMap,
    body: Bytes,
) -> Reply {
    let params = parse_form(&body);
    let header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match verify_signature(
        &state.webhook.auth_key,
        &state.webhook.url_root,
        &params,
        header,
    ) {
        Ok(()) => {}
        Err(AuthError::MissingHeader) => {
            warn!("Rejecting webhook without {} header", SIGNATURE_HEADER);
            return (StatusCode::FORBIDDEN, "Nope");
        }
        Err(AuthError::Mismatch) => {
            warn!("Rejecting webhook with bad signature");
            return (StatusCode::FORBIDDEN, "Nope");
        }
        Err(e) => {
            error!("Cannot check webhook signature: {}", e);
            return (StatusCode::FORBIDDEN, "Nope");
        }
    }

    info!(
        message_type = params.get("message_type").map(String::as_str).unwrap_or("?"),
        entity = params.get("entity_display_name").map(String::as_str).unwrap_or("?"),
        "Incident webhook accepted"
    );
    run_alert(&state.controller).await
}

async fn run_alert(controller: &Arc<AlertController>) -> Reply {
    match controller.trigger().await {
        Ok(Ok(())) => (StatusCode::OK, "OK"),
        Ok(Err(e)) => {
            error!("Alert sequence failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Error")
        }
        Err(e) => {
            error!("Alert task aborted: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Error")
        }
    }
}
