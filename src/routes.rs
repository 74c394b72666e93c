use axum::{middleware, Router};

use crate::auth::middleware::JwtSecret;
use crate::auth::register;
use crate::chat::routes as chat_routes;
use crate::notify;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Inject the JWT secret into request extensions so the Claims extractor can find it.
async fn inject_jwt_secret(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new().route(
        "/api/auth/register",
        axum::routing::post(register::register),
    );

    // Chat surface. Identity comes from the bearer token when present, else
    // from device/guest identifiers carried in the request itself.
    let chat = Router::new()
        .route(
            "/api/chat/messages",
            axum::routing::post(chat_routes::send_message),
        )
        .route(
            "/api/chat/messages",
            axum::routing::get(chat_routes::list_own_messages),
        )
        .route(
            "/api/chat/conversations",
            axum::routing::get(chat_routes::list_conversations),
        )
        .route(
            "/api/chat/conversations/{id}/answer",
            axum::routing::post(chat_routes::send_answer),
        )
        .route(
            "/api/chat/conversations/{id}/messages",
            axum::routing::get(chat_routes::list_messages),
        )
        .route("/api/chat/badge", axum::routing::get(chat_routes::get_badge))
        .route("/api/chat/seen", axum::routing::post(chat_routes::mark_all_seen))
        .route("/api/chat/typing", axum::routing::post(chat_routes::send_typing));

    let notification_routes = Router::new()
        .route(
            "/api/notifications/broadcast",
            axum::routing::post(notify::broadcast),
        )
        .route(
            "/api/notifications/system",
            axum::routing::post(notify::system_event),
        );

    // WebSocket endpoint (identity via query params, not JWT header)
    let ws_routes = Router::new().route("/ws", axum::routing::get(ws_handler::ws_upgrade));

    let health = Router::new().route("/health", axum::routing::get(health_check));

    Router::new()
        .merge(auth_routes)
        .merge(chat)
        .merge(notification_routes)
        .merge(ws_routes)
        .merge(health)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
