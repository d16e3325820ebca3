use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use tracing::{error, info, warn};

use boxoffice_db::{Database, DbError, password};
use boxoffice_types::api::{AuthRequest, AuthResponse};

use crate::error::ApiError;
use crate::token::TokenService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenService,
}

impl AppStateInner {
    pub fn new(db: Database, tokens: TokenService) -> AppState {
        Arc::new(Self { db, tokens })
    }
}

/// Run a blocking store call off the async runtime.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> boxoffice_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal("internal server error".into())
        })?
        .map_err(ApiError::from)
}

/// Usernames are stored and looked up with surrounding whitespace removed.
fn validate(mut req: AuthRequest) -> Result<AuthRequest, ApiError> {
    req.username = req.username.trim().to_string();
    if req.username.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest("missing username and password".into()));
    }
    Ok(req)
}

fn issue_token(state: &AppState, username: &str) -> Result<String, ApiError> {
    state.tokens.issue(username).map_err(|e| {
        error!("failed to sign token for {}: {}", username, e);
        ApiError::Internal("failed to generate token".into())
    })
}

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<AuthRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let req = validate(req)?;

    let username = req.username.clone();
    let user_id = with_db(&state, move |db| db.create_user(&req.username, &req.password))
        .await
        .map_err(|e| match e {
            // Duplicate usernames answer 400, like any other bad registration
            ApiError::Conflict(msg) => ApiError::BadRequest(msg),
            other => other,
        })?;

    let token = issue_token(&state, &username)?;
    info!("registered user {} ({})", user_id, username);

    Ok((StatusCode::CREATED, Json(AuthResponse { token })))
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<AuthRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let req = validate(req)?;

    // Lookup and Argon2 verification both block
    let outcome = with_db(&state, move |db| {
        let Some(user) = db.get_user_by_username(&req.username)? else {
            return Ok(Err("user not found"));
        };
        if !password::verify(&req.password, &user.password_hash) {
            return Ok(Err("invalid password"));
        }
        Ok::<_, DbError>(Ok(user.username))
    })
    .await?;

    let username = outcome.map_err(|reason| {
        warn!("login refused: {}", reason);
        ApiError::Unauthorized(reason.into())
    })?;

    let token = issue_token(&state, &username)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token })))
}
