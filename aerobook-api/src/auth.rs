use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::{issue_token, ROLE_GUEST},
    state::AppState,
};

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
    owner: String,
    expires_at: usize,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/guest", post(login_guest))
}

async fn login_guest(State(state): State<AppState>) -> Result<Json<AuthResponse>, AppError> {
    let owner = format!("guest-{}", Uuid::new_v4());
    let (token, claims) = issue_token(&state.auth, &owner, ROLE_GUEST)?;

    Ok(Json(AuthResponse {
        token,
        owner,
        expires_at: claims.exp,
    }))
}
