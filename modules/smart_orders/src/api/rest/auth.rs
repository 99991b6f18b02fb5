//! Request authentication
//!
//! The caller is identified by the `session_id` cookie or, failing that, an
//! `Authorization: Bearer` header carrying the same token.

use super::error::{map_domain_error, Problem};
use crate::contract::Principal;
use crate::domain::Service;
use axum::{extract::FromRequestParts, http::request::Parts, Extension};
use axum_extra::{
    extract::CookieJar,
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use std::sync::Arc;

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "session_id";

/// Session token presented with the request, if any
pub struct SessionToken(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for SessionToken {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_request_parts(parts, state).await?;
        if let Some(cookie) = jar.get(SESSION_COOKIE).filter(|c| !c.value().is_empty()) {
            return Ok(SessionToken(Some(cookie.value().to_string())));
        }

        let bearer = TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
            .ok()
            .map(|TypedHeader(auth)| auth.token().to_string());
        Ok(SessionToken(bearer))
    }
}

/// Authenticated caller; rejects with 401 when the session is missing or expired
pub struct CurrentUser(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = Problem;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let SessionToken(token) = match SessionToken::from_request_parts(parts, state).await {
            Ok(token) => token,
            Err(never) => match never {},
        };
        let token = token.ok_or_else(|| Problem::unauthorized("authentication required"))?;

        let Extension(service) = Extension::<Arc<Service>>::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "service extension missing");
                Problem::internal()
            })?;

        let principal = service
            .authenticate(&token)
            .await
            .map_err(map_domain_error)?;
        Ok(CurrentUser(principal))
    }
}
