use serde::{Deserialize, Serialize};

use crate::models::{Event, EventTranslation};

// -- JWT Claims --

/// Bearer token claims. The username is the only identity carried; roles are
/// always looked up fresh so a demotion takes effect immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
}

// -- Events --

/// Body of `POST /events` and `PUT /events/{id}`.
#[derive(Debug, Deserialize)]
pub struct EventRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub venue: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default, with = "crate::image")]
    pub image: Option<Vec<u8>>,
    #[serde(default)]
    pub translations: Vec<EventTranslation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    #[serde(default)]
    pub user_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventIdResponse {
    pub event_id: i64,
}

/// One page of a listing plus the size of the unpaginated result.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventPage {
    pub events: Vec<Event>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventDeletedResponse {
    pub id: i64,
    pub message: String,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleUpdateRequest {
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub role: String,
}

// -- Common --

/// Plain `{ "message": ... }` body, used for errors and acknowledgements.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
