use std::fmt;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use super::repo_types::{NewUser, User};

/// Column guarded by a unique constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    Email,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Username => f.write_str("username"),
            Self::Email => f.write_str("email"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user not found")]
    NotFound,
    #[error("{0} already exists")]
    Conflict(UniqueField),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Persistence for user accounts. Mutations report `NotFound` when no row was touched.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    async fn get_by_id(&self, id: Uuid) -> Result<User, StoreError>;
    async fn get_by_username(&self, username: &str) -> Result<User, StoreError>;
    async fn get_by_email(&self, email: &str) -> Result<User, StoreError>;
    /// Overwrites the mutable columns of `user.id` and returns the row as stored.
    async fn update(&self, user: &User) -> Result<User, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
    async fn list_all(&self) -> Result<Vec<User>, StoreError>;
}

const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn fetch_one_by(&self, column: &str, value: &str) -> Result<User, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?
            .ok_or(StoreError::NotFound)
    }
}

/// Turns a unique-index violation (SQLSTATE 23505) into a typed conflict.
fn map_write_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let code = db_err.code().map(|c| c.to_string());
        if code.as_deref() == Some("23505") {
            let field = match db_err.constraint() {
                Some(c) if c.contains("email") => UniqueField::Email,
                _ => UniqueField::Username,
            };
            warn!(%field, "unique constraint violated");
            return StoreError::Conflict(field);
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let sql = format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING {USER_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.role)
            .bind(now)
            .fetch_one(&self.db)
            .await
            .map_err(map_write_error)?;
        debug!(user_id = %created.id, username = %created.username, "user inserted");
        Ok(created)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_username(&self, username: &str) -> Result<User, StoreError> {
        self.fetch_one_by("username", username).await
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.fetch_one_by("email", email).await
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            UPDATE users
               SET username = $1, email = $2, password_hash = $3, role = $4, updated_at = $5
             WHERE id = $6
            RETURNING {USER_COLUMNS}
            "#
        );
        let updated = sqlx::query_as::<_, User>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.role)
            .bind(OffsetDateTime::now_utc())
            .bind(user.id)
            .fetch_optional(&self.db)
            .await
            .map_err(map_write_error)?;

        match updated {
            Some(updated) => {
                debug!(user_id = %updated.id, "user updated");
                Ok(updated)
            }
            None => {
                warn!(user_id = %user.id, "no rows updated");
                Err(StoreError::NotFound)
            }
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            warn!(user_id = %id, "user not found during deletion");
            return Err(StoreError::NotFound);
        }
        debug!(user_id = %id, "user deleted");
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id");
        let users = sqlx::query_as::<_, User>(&sql).fetch_all(&self.db).await?;
        debug!(count = users.len(), "fetched users");
        Ok(users)
    }
}
