use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RegisterRequest},
        extractors::{AuthUser, TOKEN_COOKIE},
    },
    error::AppResult,
    state::AppState,
    users::dto::PublicUser,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<PublicUser>)> {
    let Json(payload) = payload?;
    let payload = payload.validate()?;

    let user = state
        .users
        .register(&payload.username, &payload.email, &payload.password)
        .await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Returns the token in the body and also sets it as an HttpOnly cookie.
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<([(header::HeaderName, String); 1], Json<AuthResponse>)> {
    let Json(payload) = payload?;
    let payload = payload.validate()?;

    let issued = state
        .users
        .authenticate(&payload.identifier, &payload.password)
        .await?;

    let cookie = format!(
        "{TOKEN_COOKIE}={}; Path=/; Max-Age={}; HttpOnly; Secure; SameSite=Lax",
        issued.token,
        state.users.token_ttl().whole_seconds()
    );

    info!(user_id = %issued.subject, "session issued");
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            token: issued.token,
            token_type: "Bearer".into(),
            expires_at: issued.expires_at,
            user_id: issued.subject,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<PublicUser>> {
    let user = state.users.get_by_id(user_id).await?;
    Ok(Json(user.into()))
}
