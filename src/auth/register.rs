//! Account registration.
//!
//! Creating an account issues a token immediately; if a guest previously
//! chatted or ordered under the same email, their history is folded in by a
//! detached merge task after the response is already on the wire.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use rusqlite::params;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::{self, ApiResponse};
use crate::auth::jwt;
use crate::db::models::ROLE_USER;
use crate::identity::merge;
use crate::state::AppState;
use crate::tasks;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub language: Option<String>,
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let email = body.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Ok(api::fail("A valid email is required"));
    }
    let language = body
        .language
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| state.default_language.clone());

    let db = state.db.clone();
    let user_id = Uuid::now_v7().to_string();
    let insert_email = email.clone();
    let insert_id = user_id.clone();
    let created: bool = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        let now = Utc::now().to_rfc3339();
        match conn.execute(
            "INSERT INTO users (id, email, role, language, orders_count, finished_count, canceled_count, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, 0, 0, ?5)",
            params![insert_id, insert_email, ROLE_USER, language, now],
        ) {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Ok(false)
            }
            Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
        }
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    if !created {
        return Ok(api::fail("Email already registered"));
    }

    let token = jwt::issue_access_token(&state.jwt_secret, &user_id, ROLE_USER)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    // The response does not wait for the merge; badges converge once it lands
    tasks::spawn_logged(
        "guest merge",
        merge::merge_guest_into_user(
            state.db.clone(),
            state.data_dir.clone(),
            email,
            user_id.clone(),
        ),
    );

    Ok(api::ok_msg(
        "Account created",
        json!({ "userId": user_id, "token": token }),
    ))
}
