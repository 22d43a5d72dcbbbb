use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::{jwt::TokenError, password::HashError};
use crate::users::repo::StoreError;

pub type AppResult<T> = Result<T, AppError>;

/// Errors surfaced by the account service and its HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("username already taken")]
    UsernameTaken,
    #[error("email already taken")]
    EmailTaken,
    #[error("email already in use")]
    EmailAlreadyInUse,
    #[error("user not found")]
    NotFound,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::UsernameTaken | Self::EmailTaken | Self::EmailAlreadyInUse => {
                StatusCode::CONFLICT
            }
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InvalidCredentials | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Internal(e) => {
                tracing::error!(error = ?e, "internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": {
                "message": message,
                "status": status.as_u16(),
            }
        }));
        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::Conflict(field) => {
                Self::Internal(anyhow::anyhow!("unmapped unique violation on {field}"))
            }
            StoreError::Database(e) => Self::Internal(anyhow::Error::new(e).context("database")),
        }
    }
}

impl From<HashError> for AppError {
    fn from(err: HashError) -> Self {
        Self::Internal(anyhow::Error::new(err))
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        Self::Internal(anyhow::Error::new(err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn conflicts_map_to_409() {
        assert_eq!(AppError::UsernameTaken.status(), StatusCode::CONFLICT);
        assert_eq!(AppError::EmailTaken.status(), StatusCode::CONFLICT);
        assert_eq!(AppError::EmailAlreadyInUse.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn store_not_found_maps_to_not_found() {
        let err: AppError = StoreError::NotFound.into();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn internal_error_text_is_not_leaked() {
        let err = AppError::Internal(anyhow::anyhow!("connection refused on 10.0.0.3"));
        let res = err.into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("internal server error"));
        assert!(!text.contains("10.0.0.3"));
    }
}
