use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::{info, warn};

use boxoffice_db::models::UserRow;
use boxoffice_types::api::{MessageResponse, RoleUpdateRequest};
use boxoffice_types::models::{Event, Role, User};

use crate::auth::{AppState, with_db};
use crate::error::ApiError;
use crate::events::event_from_row;

type UserId = WithRejection<Path<i64>, ApiError>;

fn user_from_row(row: UserRow) -> User {
    let role = row.role.parse::<Role>().unwrap_or_else(|e| {
        warn!("Corrupt role on user {}: {}", row.id, e);
        Role::User
    });

    let created_at = row
        .created_at
        .parse::<chrono::DateTime<chrono::Utc>>()
        .or_else(|_| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
            // Parse as naive UTC and convert.
            chrono::NaiveDateTime::parse_from_str(&row.created_at, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on user {}: {}", row.created_at, row.id, e);
            chrono::DateTime::default()
        });

    User {
        id: row.id,
        username: row.username,
        role,
        tickets: row.tickets,
        created_at,
    }
}

/// GET /users (admin)
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = with_db(&state, |db| db.list_users()).await?;
    let users: Vec<User> = rows.into_iter().map(user_from_row).collect();
    Ok(Json(users))
}

/// GET /users/{id} (self or admin)
pub async fn get_user(
    State(state): State<AppState>,
    WithRejection(Path(id), _): UserId,
) -> Result<impl IntoResponse, ApiError> {
    let user = with_db(&state, move |db| db.get_user_by_id(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(user_from_row(user)))
}

/// DELETE /users/{id} (self or admin). Registrations cascade with the account.
pub async fn delete_user(
    State(state): State<AppState>,
    WithRejection(Path(id), _): UserId,
) -> Result<impl IntoResponse, ApiError> {
    with_db(&state, move |db| db.delete_user(id)).await?;

    info!("deleted user {}", id);
    Ok(Json(MessageResponse::new("User deleted successfully")))
}

/// PUT /users (admin): change a user's role.
pub async fn update_user_role(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RoleUpdateRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    if req.user_id == 0 || req.role.is_empty() {
        return Err(ApiError::BadRequest("Missing userId and role".into()));
    }
    let role: Role = req
        .role
        .parse()
        .map_err(|e: boxoffice_types::models::ParseRoleError| ApiError::BadRequest(e.to_string()))?;

    let user_id = req.user_id;
    let user = with_db(&state, move |db| {
        db.update_user_role(user_id, role)?;
        db.get_user_by_id(user_id)
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    info!("user {} is now {}", user_id, role);
    Ok(Json(user_from_row(user)))
}

/// GET /users/events/{id} (self or admin): events the user is registered for.
pub async fn list_user_events(
    State(state): State<AppState>,
    WithRejection(Path(id), _): UserId,
) -> Result<impl IntoResponse, ApiError> {
    let rows = with_db(&state, move |db| db.list_events_for_user(id)).await?;
    let events: Vec<Event> = rows.into_iter().map(event_from_row).collect();
    Ok(Json(events))
}
