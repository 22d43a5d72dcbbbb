use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::User;
use super::services::ProfileChanges;
use crate::error::{AppError, AppResult};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trims and lower-cases an email, rejecting anything that doesn't look like one.
pub(crate) fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::validation("Invalid email"));
    }
    Ok(email)
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            role: u.role,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Request body for PATCH /users/:id. Absent or empty fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl UpdateUserRequest {
    /// Normalizes the supplied fields; blank ones are dropped rather than rejected.
    pub fn into_changes(self) -> AppResult<ProfileChanges> {
        let username = self
            .username
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        let email = match self.email.filter(|e| !e.trim().is_empty()) {
            Some(raw) => Some(normalize_email(&raw)?),
            None => None,
        };
        Ok(ProfileChanges {
            username,
            email,
            password: self.password.filter(|p| !p.is_empty()),
        })
    }
}

/// Query for GET /users/lookup; exactly one of the two must be set.
#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub email: Option<String>,
    pub username: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_normalization() {
        assert_eq!(normalize_email("  Alice@X.com ").unwrap(), "alice@x.com");
        assert!(matches!(
            normalize_email("not-an-email"),
            Err(AppError::Validation(_))
        ));
        assert!(!is_valid_email("a b@x.com"));
    }

    #[test]
    fn update_request_drops_blank_fields() {
        let changes = UpdateUserRequest {
            username: Some("   ".into()),
            email: Some("".into()),
            password: Some("secret".into()),
        }
        .into_changes()
        .unwrap();
        assert!(changes.username.is_none());
        assert!(changes.email.is_none());
        assert_eq!(changes.password.as_deref(), Some("secret"));
    }

    #[test]
    fn update_request_rejects_bad_email() {
        let err = UpdateUserRequest {
            email: Some("nope".into()),
            ..Default::default()
        }
        .into_changes()
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn public_user_never_contains_hash() {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@x.com".into(),
            password_hash: "$argon2id$secret".into(),
            role: "user".into(),
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&PublicUser::from(user.clone())).unwrap();
        assert!(json.contains("alice@x.com"));
        assert!(!json.contains("argon2"));
        assert!(!serde_json::to_string(&user).unwrap().contains("argon2"));
    }
}
