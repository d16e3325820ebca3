use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account role. Stored as its lowercase name in the `users.role` column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid user role '{0}', role must be 'admin' or 'user'")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

/// A user as exposed over the API. The password hash never leaves the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub tickets: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTranslation {
    pub language: String,
    pub name: String,
    pub description: String,
    pub venue: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub category: String,
    /// RFC 3339 timestamp.
    pub date: String,
    pub venue: String,
    pub price: f64,
    #[serde(
        default,
        with = "crate::image",
        skip_serializing_if = "Option::is_none"
    )]
    pub image: Option<Vec<u8>>,
    /// Only populated on single-event fetches; listings leave it empty.
    #[serde(default)]
    pub translations: Vec<EventTranslation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_only_known_names() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert!("Admin".parse::<Role>().is_err());
        assert!("root".parse::<Role>().is_err());
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn event_image_is_base64_and_omitted_when_absent() {
        let mut event = Event {
            id: 1,
            name: "Party Event".into(),
            description: "desc".into(),
            category: "music".into(),
            date: "2025-01-01T20:00:00+00:00".into(),
            venue: "Hall".into(),
            price: 10.0,
            image: None,
            translations: vec![],
        };

        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("image").is_none());
        assert_eq!(json["translations"], serde_json::json!([]));

        event.image = Some(vec![1, 2, 3]);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["image"], "AQID");

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back.image, Some(vec![1, 2, 3]));
    }
}
