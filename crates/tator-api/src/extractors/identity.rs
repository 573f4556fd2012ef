//! `Identity` extractor: the caller's user id from the gateway header.
//!
//! Authentication happens in front of this service; the gateway forwards
//! the authenticated user as `x-user-id`.

use axum::Json;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};

use tator_core::types::UserId;

use crate::error::ApiErrorResponse;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity(pub UserId);

impl Identity {
    fn parse(parts: &Parts) -> Option<UserId> {
        parts
            .headers
            .get(USER_ID_HEADER)?
            .to_str()
            .ok()?
            .parse()
            .ok()
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::parse(parts).map(Identity).ok_or_else(|| {
            let body = ApiErrorResponse {
                error: "UNAUTHORIZED".to_string(),
                message: format!("Missing or invalid {USER_ID_HEADER} header"),
            };
            (StatusCode::UNAUTHORIZED, Json(body)).into_response()
        })
    }
}
