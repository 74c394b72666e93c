use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use serde::{Deserialize, Serialize};

use crate::db::models::is_admin_role;

/// JWT claims extracted from the Authorization: Bearer header.
/// Implements axum's FromRequestParts for use as an extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id (UUIDv7)
    pub sub: String,
    /// Account role: "user", "admin", or "superAdmin"
    pub role: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        is_admin_role(&self.role)
    }
}

fn decode_bearer(parts: &Parts) -> Result<Option<Claims>, StatusCode> {
    let Some(auth_header) = parts
        .headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
    else {
        return Ok(None);
    };

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // Get JWT secret from request extensions (set by middleware layer)
    let jwt_secret = parts
        .extensions
        .get::<JwtSecret>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    let validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(&jwt_secret.0),
        &validation,
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    Ok(Some(token_data.claims))
}

impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        decode_bearer(parts)?.ok_or(StatusCode::UNAUTHORIZED)
    }
}

/// Like `Claims`, but a missing Authorization header yields `None` instead of
/// a rejection. Endpoints that also serve anonymous devices and guests use
/// this and fall back to device/guest identifiers in the request.
#[derive(Debug, Clone)]
pub struct OptionalClaims(pub Option<Claims>);

impl<S> FromRequestParts<S> for OptionalClaims
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalClaims(decode_bearer(parts)?))
    }
}

/// JWT secret stored in request extensions for the Claims extractor
#[derive(Clone)]
pub struct JwtSecret(pub Vec<u8>);
