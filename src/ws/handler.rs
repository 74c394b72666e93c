//! WebSocket upgrade and participant resolution.
//!
//! The handshake classifies the caller in priority order: authorization
//! credential, then anonymous device id, then web-guest flag (with optional
//! guest-session id). Anything else is terminated. Resolving a web guest
//! without a reusable session id writes a fresh guest record as a side
//! effect — the id must exist before any message can reference it.

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::timeout;

use crate::auth::jwt;
use crate::chat::owner::Owner;
use crate::db::models::is_admin_role;
use crate::state::AppState;
use crate::ws::{actor, Participant};

/// WebSocket close codes:
/// 4000 = no identifiable participant / handshake timeout
/// 4001 = token expired
/// 4002 = token invalid
/// 4003 = account no longer exists
const CLOSE_NO_IDENTITY: u16 = 4000;
const CLOSE_TOKEN_EXPIRED: u16 = 4001;
const CLOSE_TOKEN_INVALID: u16 = 4002;
const CLOSE_ACCOUNT_GONE: u16 = 4003;

/// A connection that has not finished resolution by now is dropped, so a
/// slow or malicious client cannot hold a half-authenticated socket open.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Handshake parameters. Auth is via query params on the upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsConnectQuery {
    pub token: Option<String>,
    pub device_id: Option<String>,
    #[serde(default)]
    pub web_guest: bool,
    pub guest_id: Option<String>,
}

/// GET /ws?token=JWT | ?device_id=... | ?web_guest=true[&guest_id=...]
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsConnectQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params))
}

async fn handle_socket(socket: WebSocket, state: AppState, params: WsConnectQuery) {
    match timeout(HANDSHAKE_TIMEOUT, resolve_participant(&state, params)).await {
        Ok(Ok((participant, fresh_guest))) => {
            actor::run_connection(socket, state, participant, fresh_guest).await;
        }
        Ok(Err((code, reason))) => close_with(socket, code, reason).await,
        Err(_) => close_with(socket, CLOSE_NO_IDENTITY, "Handshake timed out").await,
    }
}

async fn close_with(mut socket: WebSocket, code: u16, reason: &'static str) {
    tracing::warn!(close_code = code, reason, "WebSocket handshake rejected");
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}

/// Classify the caller, first match wins. Returns the bound participant and
/// whether a web-guest record was freshly created (the caller must be told
/// its assigned id in that case).
async fn resolve_participant(
    state: &AppState,
    params: WsConnectQuery,
) -> Result<(Participant, bool), (u16, &'static str)> {
    // 1. Authorization credential
    if let Some(token) = params.token.as_deref() {
        let claims =
            jwt::validate_access_token(&state.jwt_secret, token).map_err(|err| {
                match err.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        (CLOSE_TOKEN_EXPIRED, "Token expired")
                    }
                    _ => (CLOSE_TOKEN_INVALID, "Token invalid"),
                }
            })?;

        let db = state.db.clone();
        let user_id = claims.sub.clone();
        let role: Option<String> = tokio::task::spawn_blocking(move || {
            let conn = db.lock().ok()?;
            conn.query_row(
                "SELECT role FROM users WHERE id = ?1",
                rusqlite::params![user_id],
                |row| row.get(0),
            )
            .ok()
        })
        .await
        .ok()
        .flatten();

        let Some(role) = role else {
            return Err((CLOSE_ACCOUNT_GONE, "Account no longer exists"));
        };
        let participant = if is_admin_role(&role) {
            Participant::Admin {
                user_id: claims.sub,
            }
        } else {
            Participant::Owner(Owner::User(claims.sub))
        };
        return Ok((participant, false));
    }

    // 2. Anonymous device — no account lookup, no persistence side effect
    if let Some(device_id) = params.device_id.filter(|d| !d.is_empty()) {
        return Ok((Participant::Owner(Owner::Device(device_id)), false));
    }

    // 3. Web guest — reuse the session id if it still resolves, otherwise
    // mint a fresh guest record
    if params.web_guest {
        if let Some(guest_id) = params.guest_id.filter(|g| !g.is_empty()) {
            let db = state.db.clone();
            let gid = guest_id.clone();
            let exists = tokio::task::spawn_blocking(move || {
                let conn = db.lock().ok()?;
                conn.query_row(
                    "SELECT COUNT(*) FROM guests WHERE id = ?1",
                    rusqlite::params![gid],
                    |row| row.get::<_, i64>(0),
                )
                .ok()
            })
            .await
            .ok()
            .flatten()
            .unwrap_or(0)
                > 0;

            if exists {
                return Ok((Participant::Owner(Owner::Guest(guest_id)), false));
            }
        }

        let db = state.db.clone();
        let language = state.default_language.clone();
        let new_id = tokio::task::spawn_blocking(move || -> Option<String> {
            let conn = db.lock().ok()?;
            let id = uuid::Uuid::now_v7().to_string();
            let now = chrono::Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO guests (id, language, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, language, now],
            )
            .ok()?;
            Some(id)
        })
        .await
        .ok()
        .flatten();

        let Some(id) = new_id else {
            return Err((CLOSE_NO_IDENTITY, "Guest record creation failed"));
        };
        return Ok((Participant::Owner(Owner::Guest(id)), true));
    }

    Err((CLOSE_NO_IDENTITY, "No identifiable participant"))
}
