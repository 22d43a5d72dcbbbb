use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::dto::{normalize_email, LookupQuery, PublicUser, UpdateUserRequest};
use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/lookup", get(lookup_user))
        .route(
            "/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<PublicUser>>> {
    let users = state.users.list_all().await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<PublicUser>> {
    let Path(id) = id?;
    let user = state.users.get_by_id(id).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn lookup_user(
    State(state): State<AppState>,
    query: Result<Query<LookupQuery>, QueryRejection>,
) -> AppResult<Json<PublicUser>> {
    let Query(query) = query?;
    let user = match (query.email, query.username) {
        (Some(email), None) => state.users.get_by_email(&normalize_email(&email)?).await?,
        (None, Some(username)) => state.users.get_by_username(username.trim()).await?,
        _ => {
            return Err(AppError::validation(
                "exactly one of email or username is required",
            ))
        }
    };
    Ok(Json(user.into()))
}

/// Only the account owner may edit their profile.
#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(subject): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> AppResult<Json<PublicUser>> {
    let Path(id) = id?;
    if subject != id {
        warn!(%subject, target = %id, "attempt to edit another account");
        return Err(AppError::Forbidden);
    }
    let Json(payload) = payload?;
    let user = state
        .users
        .update_profile(id, payload.into_changes()?)
        .await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(subject): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<StatusCode> {
    let Path(id) = id?;
    state.users.delete_account(subject, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
