use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                username        TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                role            TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('admin', 'user')),
                tickets         INTEGER NOT NULL DEFAULT 999,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS events (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL,
                description TEXT NOT NULL,
                category    TEXT NOT NULL,
                date        TEXT NOT NULL,
                venue       TEXT NOT NULL,
                price       REAL NOT NULL,
                image       BLOB
            );

            CREATE INDEX IF NOT EXISTS idx_events_category
                ON events(category);

            -- No UNIQUE(event_id, language): duplicate languages are legal
            CREATE TABLE IF NOT EXISTS event_translations (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id    INTEGER NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                language    TEXT NOT NULL,
                name        TEXT NOT NULL,
                description TEXT NOT NULL,
                venue       TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_event_translations_event
                ON event_translations(event_id);

            CREATE TABLE IF NOT EXISTS registrations (
                user_id         INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                event_id        INTEGER NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                registered_at   TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (user_id, event_id)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
