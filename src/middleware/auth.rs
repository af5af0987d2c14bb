// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bearer-token authentication middleware.
//!
//! Requests carry the identity provider's ID token either in the session
//! cookie or an `Authorization: Bearer` header. The token is verified by
//! [`IdentityVerifier`] and the extracted claims are attached to the request
//! for handlers to consume.

use crate::services::identity::{IdentityClaims, IdentityError};
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Name of the session cookie carrying the ID token.
pub const SESSION_COOKIE: &str = "sideline_token";

/// Authenticated coach extracted from a verified ID token.
#[derive(Debug, Clone)]
pub struct AuthCoach {
    pub claims: IdentityClaims,
}

impl AuthCoach {
    /// The coach's stable identity-provider subject (coach document ID).
    pub fn id(&self) -> &str {
        &self.claims.sub
    }
}

/// Middleware that requires a valid identity-provider ID token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // Try cookie first, then header
    let token = if let Some(cookie) = jar.get(SESSION_COOKIE) {
        cookie.value().to_string()
    } else {
        let auth_header = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match auth_header {
            Some(h) if h.starts_with("Bearer ") => h[7..].to_string(),
            _ => return Err(StatusCode::UNAUTHORIZED),
        }
    };

    let claims = state.identity.verify(&token).await.map_err(|err| match err {
        IdentityError::Rejected(reason) => {
            tracing::debug!(reason = %reason, "Rejected ID token");
            StatusCode::UNAUTHORIZED
        }
        IdentityError::Transient(reason) => {
            tracing::error!(reason = %reason, "Identity verification transient failure");
            StatusCode::SERVICE_UNAVAILABLE
        }
    })?;

    request.extensions_mut().insert(AuthCoach { claims });

    Ok(next.run(request).await)
}
