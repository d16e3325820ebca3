//! Database row types. These map directly to SQLite rows and stay
//! distinct from the boxoffice-types API models.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub tickets: i64,
    pub created_at: String,
}

pub struct EventRow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub category: String,
    pub date: String,
    pub venue: String,
    pub price: f64,
    pub image: Option<Vec<u8>>,
    /// Empty unless loaded by `get_event`.
    pub translations: Vec<TranslationRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranslationRow {
    pub language: String,
    pub name: String,
    pub description: String,
    pub venue: String,
}

/// Column values for an event insert or full overwrite.
pub struct NewEvent {
    pub name: String,
    pub description: String,
    pub category: String,
    pub date: String,
    pub venue: String,
    pub price: f64,
    pub image: Option<Vec<u8>>,
    pub translations: Vec<TranslationRow>,
}
