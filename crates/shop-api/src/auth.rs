//! # Identity Extraction
//!
//! Requests arrive with an `X-User-Id` header already vetted by the
//! upstream credential layer (out of scope here); extractors resolve it
//! against the account directory and enforce the admin role where routes
//! require it.

use crate::response::ApiError;
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use shop_core::User;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct Identity(pub User);

impl FromRequestParts<AppState> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ApiError::new(StatusCode::UNAUTHORIZED, "Missing X-User-Id header")
            })?;

        let user = state
            .manager
            .lookup_user(user_id)
            .await
            .map_err(|e| ApiError::from_shop(e, !state.config.is_production()))?
            .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "Unknown user"))?;

        Ok(Identity(user))
    }
}

/// Authenticated caller with the admin role
#[derive(Debug, Clone)]
pub struct Admin(pub User);

impl FromRequestParts<AppState> for Admin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Identity(user) = Identity::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::new(
                StatusCode::FORBIDDEN,
                "Administrator role required",
            ));
        }
        Ok(Admin(user))
    }
}
