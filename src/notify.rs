//! Out-of-band notification pushes.
//!
//! Notifications are not persisted; they reach whoever is connected when the
//! push happens. Durable unread state lives with messages, not here.

use std::collections::HashMap;

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::json;

use crate::api::{self, ApiResponse};
use crate::auth::middleware::Claims;
use crate::events::ServerEvent;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub user_ids: Vec<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub translations: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
pub struct SystemEventRequest {
    pub user_id: Option<String>,
    pub device_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub reference_id: Option<String>,
}

/// POST /api/notifications/broadcast — push a translated notification to a
/// set of registered users. Offline users simply miss it.
pub async fn broadcast(
    State(state): State<AppState>,
    claims: Claims,
    Json(body): Json<BroadcastRequest>,
) -> Result<Json<ApiResponse>, StatusCode> {
    if !claims.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }
    if body.user_ids.is_empty() {
        return Ok(api::fail("user_ids must not be empty"));
    }

    let event = ServerEvent::Notification {
        kind: body.kind,
        reference_id: None,
        translations: body.translations,
    };
    let delivered = state.registry.send_to_users(&body.user_ids, &event);

    Ok(api::ok(json!({ "delivered": delivered })))
}

/// POST /api/notifications/system — push a reference-carrying event (order
/// updates and the like) to exactly one user or device.
pub async fn system_event(
    State(state): State<AppState>,
    claims: Claims,
    Json(body): Json<SystemEventRequest>,
) -> Result<Json<ApiResponse>, StatusCode> {
    if !claims.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }

    let event = ServerEvent::Notification {
        kind: body.kind,
        reference_id: body.reference_id,
        translations: None,
    };

    let delivered = match (body.user_id, body.device_id) {
        (Some(user_id), None) => state
            .registry
            .send_to_users(std::slice::from_ref(&user_id), &event),
        (None, Some(device_id)) => state
            .registry
            .send_to_guests(std::slice::from_ref(&device_id), &event),
        _ => return Ok(api::fail("Provide exactly one of user_id or device_id")),
    };

    Ok(api::ok(json!({ "delivered": delivered })))
}
