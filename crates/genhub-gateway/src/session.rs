//! Session lookup and the Route Guard middleware.
//!
//! Every non-asset request is authenticated once here. Page requests get a
//! guard decision; the outcome is attached as a `Session` extension that
//! handlers pull with the `Session` extractor.

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use genhub_core::route_guard::{classify, PathClass};
use genhub_core::{AuthState, GuardDecision, Identity};
use std::convert::Infallible;

use crate::error::ApiError;
use crate::state::AppState;

/// Who is calling, as far as the auth backend could tell.
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: Option<Identity>,
    pub auth: AuthState,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            identity: None,
            auth: AuthState::Anonymous,
        }
    }
}

impl Session {
    pub fn require_identity(&self) -> Result<&Identity, ApiError> {
        match (&self.identity, self.auth) {
            (Some(identity), _) => Ok(identity),
            (None, AuthState::Unavailable) => Err(ApiError::Unauthorized(
                "authentication service unavailable".to_string(),
            )),
            (None, _) => Err(ApiError::Unauthorized("authentication required".to_string())),
        }
    }

    pub fn require_admin(&self) -> Result<&Identity, ApiError> {
        let identity = self.require_identity()?;
        if !identity.is_admin {
            return Err(ApiError::Forbidden("admin privileges required".to_string()));
        }
        Ok(identity)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Session>().cloned().unwrap_or_default())
    }
}

/// Session token from the cookie, or from `Authorization: Bearer`.
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.trim().to_string());
    from_cookie
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|t| t.trim().to_string())
        })
        .filter(|t| !t.is_empty())
}

fn resolve_session(state: &AppState, headers: &HeaderMap) -> Session {
    let Some(token) = session_token(headers, &state.config.session_cookie) else {
        return Session::default();
    };
    match state.identities.authenticate(&token) {
        Ok(Some(identity)) => Session {
            auth: AuthState::Authenticated {
                activated: identity.activated,
            },
            identity: Some(identity),
        },
        Ok(None) => Session::default(),
        Err(e) => {
            tracing::warn!("session lookup failed: {}", e);
            Session {
                identity: None,
                auth: AuthState::Unavailable,
            }
        }
    }
}

/// Authenticates the request and applies the Route Guard.
pub async fn guard_requests(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let is_api = path == "/api" || path.starts_with("/api/");
    if classify(&path) == PathClass::Bypass && !is_api {
        return next.run(request).await;
    }

    let session = resolve_session(&state, request.headers());
    if let GuardDecision::Redirect(to) = state.guard.decide(&path, &session.auth) {
        tracing::debug!(path = %path, to, "route guard redirect");
        return Redirect::temporary(to).into_response();
    }

    request.extensions_mut().insert(session);
    next.run(request).await
}
