use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use tracing::warn;
use uuid::Uuid;

use super::jwt::TokenIssuer;
use crate::error::AppError;

/// Name of the cookie set on login.
pub const TOKEN_COOKIE: &str = "token";

/// Validates the bearer token and yields the subject's account ID.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<dyn TokenIssuer>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let issuer = <Arc<dyn TokenIssuer>>::from_ref(state);

        let Some(token) = bearer_token(parts).or_else(|| cookie_token(parts)) else {
            warn!("missing credentials");
            return Err(AppError::Unauthorized);
        };

        match issuer.verify(&token) {
            Ok(claims) => Ok(AuthUser(claims.sub)),
            Err(e) => {
                warn!(reason = %e, "rejected token");
                Err(AppError::Unauthorized)
            }
        }
    }
}

// Expect "Bearer <token>"
fn bearer_token(parts: &Parts) -> Option<String> {
    let auth = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(|t| t.trim().to_string())
}

fn cookie_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == TOKEN_COOKIE)
        .map(|(_, value)| value.to_string())
}
