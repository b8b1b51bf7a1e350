use std::sync::Arc;

use axum::{
    Json, async_trait,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use crates::domain::{interfaces::identity::IdentityVerifier, value_objects::iam::VerifiedIdentity};
use tracing::{error, warn};

use crate::axum_http::error_responses::ErrorResponse;

/// Shared handle to the identity strategy chosen at startup, installed as a request extension.
pub type SharedIdentityVerifier = Arc<dyn IdentityVerifier>;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl From<VerifiedIdentity> for AuthUser {
    fn from(identity: VerifiedIdentity) -> Self {
        Self {
            uid: identity.uid,
            email: identity.email,
            name: identity.name,
            picture: identity.picture,
        }
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingHeader,
    MalformedHeader,
    InvalidToken,
    NotConfigured,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingHeader => (StatusCode::UNAUTHORIZED, "Missing Authorization header"),
            AuthError::MalformedHeader => {
                (StatusCode::UNAUTHORIZED, "Invalid Authorization header format")
            }
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            AuthError::NotConfigured => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (
            status,
            Json(ErrorResponse {
                code: status.as_u16(),
                message: message.to_string(),
            }),
        )
            .into_response()
    }
}

pub fn bearer_token(header_value: &str) -> Option<&str> {
    let token = header_value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token) }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingHeader)?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AuthError::MalformedHeader)?;

        let token = bearer_token(auth_str).ok_or(AuthError::MalformedHeader)?;

        let verifier = parts
            .extensions
            .get::<SharedIdentityVerifier>()
            .cloned()
            .ok_or_else(|| {
                error!("auth: identity verifier extension is missing");
                AuthError::NotConfigured
            })?;

        let identity = verifier.verify(token).await.map_err(|err| {
            warn!(
                strategy = verifier.strategy_name(),
                error = %err,
                "auth: token verification failed"
            );
            AuthError::InvalidToken
        })?;

        Ok(AuthUser::from(identity))
    }
}

#[cfg(test)]
mod tests;
