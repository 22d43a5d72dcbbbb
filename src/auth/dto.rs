use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::users::dto::normalize_email;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    /// Trims the username, normalizes the email and requires a password.
    pub fn validate(mut self) -> AppResult<Self> {
        self.username = self.username.trim().to_string();
        if self.username.is_empty() {
            return Err(AppError::validation("Username is required"));
        }
        self.email = normalize_email(&self.email)?;
        if self.password.is_empty() {
            return Err(AppError::validation("Password is required"));
        }
        Ok(self)
    }
}

/// Request body for login. `identifier` is an email or a username; its case is
/// kept so username lookups stay exact.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(mut self) -> AppResult<Self> {
        self.identifier = self.identifier.trim().to_string();
        if self.identifier.is_empty() || self.password.is_empty() {
            return Err(AppError::validation("Identifier and password are required"));
        }
        Ok(self)
    }
}

/// Response returned after login.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub user_id: Uuid,
}
