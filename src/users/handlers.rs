use anyhow::Context;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use futures::TryStreamExt;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::repo_types::User;
use crate::{auth::AuthUser, error::parse_body, error::ApiError, state::AppState, store::StoreError};

const EMPTY_REQUEST: &str = "Empty user request";
const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    #[serde(rename = "Token")]
    pub token: String,
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(signup))
        .route("/users/auth", post(authenticate))
        .route("/users/:email", get(get_user))
}

#[instrument(skip(state, body))]
pub async fn signup(State(state): State<AppState>, body: Bytes) -> Result<Json<User>, ApiError> {
    let mut user: User = parse_body(&body, EMPTY_REQUEST)?;
    user.email = user.email.trim().to_string();

    if user.email.is_empty() || user.password.trim().is_empty() {
        warn!("signup with blank email or password");
        return Err(ApiError::BadRequest(INVALID_CREDENTIALS.into()));
    }
    if !is_valid_email(&user.email) {
        warn!(email = %user.email, "invalid email");
        return Err(ApiError::BadRequest("Invalid email".into()));
    }

    let hasher = state.hasher.clone();
    let plain = std::mem::take(&mut user.password);
    user.password = tokio::task::spawn_blocking(move || hasher.hash(&plain))
        .await
        .context("password hashing task")??;

    match state.users.insert_unique(&user).await {
        Ok(()) => {}
        Err(StoreError::Conflict { .. }) => {
            warn!(email = %user.email, "email already registered");
            return Err(ApiError::BadRequest("User already exists".into()));
        }
        Err(e) => return Err(e.into()),
    }

    info!(email = %user.email, "user registered");
    Ok(Json(user.redacted()))
}

/// Unknown email and wrong password produce the same response.
#[instrument(skip(state, body))]
pub async fn authenticate(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TokenResponse>, ApiError> {
    let creds: Credentials = parse_body(&body, EMPTY_REQUEST)?;
    let email = creds.email.trim().to_string();
    if email.is_empty() || creds.password.trim().is_empty() {
        return Err(ApiError::BadRequest(INVALID_CREDENTIALS.into()));
    }

    let stored_hash = match state.users.find_by_key(&email).await {
        Ok(user) => Some(user.password),
        Err(StoreError::NotFound { .. }) => None,
        Err(e) => return Err(e.into()),
    };

    let hasher = state.hasher.clone();
    let plain = creds.password;
    let matched = tokio::task::spawn_blocking(move || match stored_hash {
        Some(hash) => hasher.verify(&hash, &plain),
        None => {
            hasher.verify_absent(&plain);
            false
        }
    })
    .await
    .context("password verification task")?;

    if !matched {
        warn!(email = %email, "login rejected");
        return Err(ApiError::BadRequest(INVALID_CREDENTIALS.into()));
    }

    let token = state.jwt.issue(&email).context("sign session token")?;
    info!(email = %email, "user logged in");
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(email): Path<String>,
) -> Result<Json<User>, ApiError> {
    let user = state.users.find_by_key(&email).await?;
    Ok(Json(user.redacted()))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<Vec<User>>, ApiError> {
    let mut cursor = state.users.list_all();
    let mut users = Vec::new();
    while let Some(user) = cursor.try_next().await? {
        users.push(user.redacted());
    }
    Ok(Json(users))
}
