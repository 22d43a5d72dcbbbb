use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::repo::{StoreError, UniqueField, UserStore};
use super::repo_types::{NewUser, User, DEFAULT_ROLE};
use crate::auth::{jwt::TokenIssuer, password::CredentialHasher};
use crate::error::{AppError, AppResult};

/// Optional profile edits; `None` or empty strings leave the field untouched.
#[derive(Debug, Default, Clone)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// A freshly signed bearer token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub subject: Uuid,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
    hasher: Arc<dyn CredentialHasher>,
    tokens: Arc<dyn TokenIssuer>,
    token_ttl: Duration,
}

fn provided(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn exists(lookup: Result<User, StoreError>) -> AppResult<bool> {
    match lookup {
        Ok(_) => Ok(true),
        Err(StoreError::NotFound) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

impl UserService {
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: Arc<dyn CredentialHasher>,
        tokens: Arc<dyn TokenIssuer>,
        token_ttl: Duration,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
            token_ttl,
        }
    }

    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Creates an account with the default role.
    ///
    /// The lookups only give a friendlier error up front; two concurrent
    /// registrations can both pass them, so the store's unique constraint is
    /// what actually decides.
    #[instrument(skip(self, password))]
    pub async fn register(&self, username: &str, email: &str, password: &str) -> AppResult<User> {
        if exists(self.store.get_by_username(username).await)? {
            warn!("username already registered");
            return Err(AppError::UsernameTaken);
        }
        if exists(self.store.get_by_email(email).await)? {
            warn!("email already registered");
            return Err(AppError::EmailTaken);
        }

        let password_hash = self.hasher.hash(password)?;
        let user = self
            .store
            .create(NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
                role: DEFAULT_ROLE.to_string(),
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(UniqueField::Username) => AppError::UsernameTaken,
                StoreError::Conflict(UniqueField::Email) => AppError::EmailTaken,
                other => other.into(),
            })?;

        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Resolves `identifier` as an email, then as a username, and issues a token.
    /// Emails are stored lower-cased, usernames as registered.
    /// Unknown identifiers and wrong passwords fail the same way.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, identifier: &str, password: &str) -> AppResult<IssuedToken> {
        let user = match self.store.get_by_email(&identifier.to_lowercase()).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => match self.store.get_by_username(identifier).await {
                Ok(user) => user,
                Err(StoreError::NotFound) => {
                    warn!("login for unknown identifier");
                    return Err(AppError::InvalidCredentials);
                }
                Err(e) => return Err(e.into()),
            },
            Err(e) => return Err(e.into()),
        };

        if !self.hasher.verify(password, &user.password_hash)? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }

        let expires_at = OffsetDateTime::now_utc() + self.token_ttl;
        let token = self.tokens.issue(user.id, expires_at)?;
        info!(user_id = %user.id, "user logged in");
        Ok(IssuedToken {
            token,
            subject: user.id,
            expires_at,
        })
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<User> {
        Ok(self.store.get_by_id(id).await?)
    }

    pub async fn get_by_email(&self, email: &str) -> AppResult<User> {
        Ok(self.store.get_by_email(email).await?)
    }

    pub async fn get_by_username(&self, username: &str) -> AppResult<User> {
        Ok(self.store.get_by_username(username).await?)
    }

    pub async fn list_all(&self) -> AppResult<Vec<User>> {
        Ok(self.store.list_all().await?)
    }

    /// Applies username, email and password edits. The role is never changed here.
    #[instrument(skip(self, changes))]
    pub async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> AppResult<User> {
        let mut user = self.store.get_by_id(id).await?;

        if let Some(username) = provided(changes.username) {
            user.username = username;
        }

        if let Some(email) = provided(changes.email) {
            match self.store.get_by_email(&email).await {
                Ok(owner) if owner.id != user.id => {
                    warn!(user_id = %id, "email belongs to another account");
                    return Err(AppError::EmailAlreadyInUse);
                }
                Ok(_) | Err(StoreError::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
            user.email = email;
        }

        if let Some(password) = provided(changes.password) {
            user.password_hash = self.hasher.hash(&password)?;
        }

        let updated = self.store.update(&user).await.map_err(|e| match e {
            StoreError::Conflict(UniqueField::Username) => AppError::UsernameTaken,
            StoreError::Conflict(UniqueField::Email) => AppError::EmailAlreadyInUse,
            other => other.into(),
        })?;
        info!(user_id = %id, "profile updated");
        Ok(updated)
    }

    /// Self-service deletion: `requester` must be the account being deleted.
    #[instrument(skip(self))]
    pub async fn delete_account(&self, requester: Uuid, target: Uuid) -> AppResult<()> {
        if requester != target {
            warn!("attempt to delete another account");
            return Err(AppError::Forbidden);
        }
        self.store.delete(target).await?;
        info!(user_id = %target, "user deleted");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_service() -> UserService {
    use crate::auth::{jwt::test_keys, password::fast_hasher};
    use crate::users::memory::InMemoryUserStore;

    UserService::new(
        Arc::new(InMemoryUserStore::new()),
        Arc::new(fast_hasher()),
        Arc::new(test_keys()),
        Duration::minutes(15),
    )
}
