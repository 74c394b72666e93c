//! Uniform REST response envelope.
//!
//! Business outcomes — including not-found — ride in `{success, message,
//! data}` with HTTP 200; only transport-level failures (bad/expired token,
//! DB breakage) surface as HTTP error statuses.

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

pub fn ok(data: serde_json::Value) -> Json<ApiResponse> {
    Json(ApiResponse {
        success: true,
        message: "ok".to_string(),
        data: Some(data),
    })
}

pub fn ok_msg(message: &str, data: serde_json::Value) -> Json<ApiResponse> {
    Json(ApiResponse {
        success: true,
        message: message.to_string(),
        data: Some(data),
    })
}

pub fn fail(message: &str) -> Json<ApiResponse> {
    Json(ApiResponse {
        success: false,
        message: message.to_string(),
        data: None,
    })
}
