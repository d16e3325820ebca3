use rusqlite::{Connection, Row, params};
use tracing::debug;

use crate::models::{EventRow, NewEvent, TranslationRow};
use crate::{Constraint, Database, DbError, OptionalExt, QueryContext, Result, constraint_violation};

const EVENT_COLUMNS: &str = "id, name, description, category, date, venue, price, image";

impl Database {
    // -- Events --

    /// Every event, without translations.
    pub fn list_events(&self) -> Result<Vec<EventRow>> {
        self.with_conn(|conn| {
            query_events(
                conn,
                &format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY id"),
                [],
                "failed to fetch events",
            )
        })
    }

    /// A single event with its translations attached.
    pub fn get_event(&self, id: i64) -> Result<Option<EventRow>> {
        self.with_conn(|conn| {
            let event = conn
                .query_row(
                    &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
                    [id],
                    map_event,
                )
                .optional("failed to get event by id")?;

            let Some(mut event) = event else {
                return Ok(None);
            };
            event.translations = query_translations(conn, id)?;
            Ok(Some(event))
        })
    }

    pub fn list_events_by_category(&self, category: &str) -> Result<Vec<EventRow>> {
        self.with_conn(|conn| {
            query_events(
                conn,
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE category = ?1 ORDER BY id"),
                [category],
                "fetching events by category failed",
            )
        })
    }

    /// Case-insensitive substring match over name, description and venue.
    pub fn search_events(&self, keyword: &str) -> Result<Vec<EventRow>> {
        let pattern = like_pattern(keyword);
        self.with_conn(|conn| {
            query_events(
                conn,
                &format!(
                    "SELECT {EVENT_COLUMNS} FROM events
                     WHERE name LIKE ?1 ESCAPE '\\'
                        OR description LIKE ?1 ESCAPE '\\'
                        OR venue LIKE ?1 ESCAPE '\\'
                     ORDER BY id"
                ),
                [&pattern],
                "search query failed",
            )
        })
    }

    /// Insert an event and its translations in one transaction. Returns the new id.
    pub fn create_event(&self, event: &NewEvent) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO events (name, description, category, date, venue, price, image)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    event.name,
                    event.description,
                    event.category,
                    event.date,
                    event.venue,
                    event.price,
                    event.image,
                ],
            )
            .context("failed to create event")?;

            let id = tx.last_insert_rowid();
            insert_translations(&tx, id, &event.translations)?;
            tx.commit()?;

            debug!("created event {} with {} translations", id, event.translations.len());
            Ok(id)
        })
    }

    /// Overwrite every column and replace the translation set wholesale.
    /// Returns `false` when no event has this id.
    pub fn update_event(&self, id: i64, event: &NewEvent) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let affected = tx
                .execute(
                    "UPDATE events
                     SET name = ?1, description = ?2, category = ?3, date = ?4, venue = ?5, price = ?6, image = ?7
                     WHERE id = ?8",
                    params![
                        event.name,
                        event.description,
                        event.category,
                        event.date,
                        event.venue,
                        event.price,
                        event.image,
                        id,
                    ],
                )
                .context("failed to update event")?;

            if affected == 0 {
                return Ok(false);
            }

            tx.execute("DELETE FROM event_translations WHERE event_id = ?1", [id])
                .context("failed to delete existing event translations")?;
            insert_translations(&tx, id, &event.translations)?;
            tx.commit()?;

            Ok(true)
        })
    }

    /// Translations and registrations go with it. Returns `false` when nothing was deleted.
    pub fn delete_event(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn
                .execute("DELETE FROM events WHERE id = ?1", [id])
                .context("failed to delete event")?;
            Ok(affected > 0)
        })
    }

    // -- Registrations --

    /// Enroll a user in an event. The composite primary key is the only
    /// duplicate guard: a second enrollment of the same pair is a `Conflict`.
    pub fn register_user_to_event(&self, user_id: i64, event_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO registrations (user_id, event_id) VALUES (?1, ?2)",
                [user_id, event_id],
            )
            .map_err(|e| match constraint_violation(&e) {
                Some(Constraint::Unique) => DbError::Conflict(format!(
                    "user {} is already registered to event {}",
                    user_id, event_id
                )),
                Some(Constraint::ForeignKey) => DbError::NotFound(format!(
                    "user {} or event {} does not exist",
                    user_id, event_id
                )),
                None => DbError::Query {
                    context: "failed to register user to event",
                    source: e,
                },
            })?;
            Ok(())
        })
    }

    /// Events the user is registered for.
    pub fn list_events_for_user(&self, user_id: i64) -> Result<Vec<EventRow>> {
        self.with_conn(|conn| {
            query_events(
                conn,
                "SELECT e.id, e.name, e.description, e.category, e.date, e.venue, e.price, e.image
                 FROM events e
                 JOIN registrations r ON e.id = r.event_id
                 WHERE r.user_id = ?1
                 ORDER BY r.registered_at, e.id",
                [user_id],
                "failed to fetch events for user",
            )
        })
    }
}

fn map_event(row: &Row<'_>) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        date: row.get(4)?,
        venue: row.get(5)?,
        price: row.get(6)?,
        image: row.get(7)?,
        translations: Vec::new(),
    })
}

fn query_events<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    context: &'static str,
) -> Result<Vec<EventRow>> {
    let mut stmt = conn.prepare(sql).context(context)?;

    let rows = stmt
        .query_map(params, map_event)
        .context(context)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("error scanning event row")?;

    Ok(rows)
}

fn query_translations(conn: &Connection, event_id: i64) -> Result<Vec<TranslationRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT language, name, description, venue FROM event_translations
             WHERE event_id = ?1 ORDER BY id",
        )
        .context("failed to fetch event translations")?;

    let rows = stmt
        .query_map([event_id], |row| {
            Ok(TranslationRow {
                language: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                venue: row.get(3)?,
            })
        })
        .context("failed to fetch event translations")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("error scanning event translation")?;

    Ok(rows)
}

fn insert_translations(conn: &Connection, event_id: i64, translations: &[TranslationRow]) -> Result<()> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO event_translations (event_id, language, name, description, venue)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .context("failed to prepare event translation insert")?;

    for t in translations {
        stmt.execute(params![event_id, t.language, t.name, t.description, t.venue])
            .context("failed to insert event translation")?;
    }
    Ok(())
}

/// Wrap a keyword as `%keyword%`, escaping LIKE wildcards so it matches literally.
fn like_pattern(keyword: &str) -> String {
    let mut pattern = String::with_capacity(keyword.len() + 2);
    pattern.push('%');
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn event(name: &str, category: &str, translations: Vec<TranslationRow>) -> NewEvent {
        NewEvent {
            name: name.to_string(),
            description: format!("{} description", name),
            category: category.to_string(),
            date: "2025-06-01T18:00:00+00:00".to_string(),
            venue: "Main Hall".to_string(),
            price: 25.0,
            image: None,
            translations,
        }
    }

    fn translation(language: &str) -> TranslationRow {
        TranslationRow {
            language: language.to_string(),
            name: format!("name-{}", language),
            description: format!("description-{}", language),
            venue: format!("venue-{}", language),
        }
    }

    fn stored_translations(db: &Database, event_id: i64) -> Vec<TranslationRow> {
        db.with_conn(|conn| query_translations(conn, event_id)).unwrap()
    }

    fn count(db: &Database, sql: &str) -> i64 {
        db.with_conn(|conn| Ok(conn.query_row(sql, [], |r| r.get(0))?)).unwrap()
    }

    #[test]
    fn get_event_loads_translations_but_listing_does_not() {
        let db = db();
        let id = db
            .create_event(&event("Gala", "music", vec![translation("en"), translation("fr")]))
            .unwrap();

        let fetched = db.get_event(id).unwrap().unwrap();
        assert_eq!(fetched.name, "Gala");
        assert_eq!(fetched.translations, vec![translation("en"), translation("fr")]);

        let listed = db.list_events().unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].translations.is_empty());

        assert!(db.get_event(id + 1).unwrap().is_none());
    }

    #[test]
    fn duplicate_translation_languages_are_kept() {
        let db = db();
        let id = db
            .create_event(&event("Gala", "music", vec![translation("en"), translation("en")]))
            .unwrap();
        assert_eq!(stored_translations(&db, id).len(), 2);
    }

    #[test]
    fn update_replaces_translations_wholesale() {
        let db = db();
        let id = db
            .create_event(&event(
                "Gala",
                "music",
                vec![translation("en"), translation("fr"), translation("de")],
            ))
            .unwrap();

        assert!(db.update_event(id, &event("Gala 2", "music", vec![translation("es")])).unwrap());
        let fetched = db.get_event(id).unwrap().unwrap();
        assert_eq!(fetched.name, "Gala 2");
        assert_eq!(fetched.translations, vec![translation("es")]);

        assert!(db.update_event(id, &event("Gala 3", "music", vec![])).unwrap());
        assert!(stored_translations(&db, id).is_empty());
    }

    #[test]
    fn update_of_missing_event_changes_nothing() {
        let db = db();
        assert!(!db.update_event(7, &event("Ghost", "none", vec![translation("en")])).unwrap());
        assert_eq!(count(&db, "SELECT COUNT(*) FROM event_translations"), 0);
    }

    #[test]
    fn category_filter_is_exact() {
        let db = db();
        db.create_event(&event("A", "music", vec![])).unwrap();
        db.create_event(&event("B", "sport", vec![])).unwrap();
        db.create_event(&event("C", "music", vec![])).unwrap();

        let names: Vec<_> = db
            .list_events_by_category("music")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["A", "C"]);
        assert!(db.list_events_by_category("Music").unwrap().is_empty());
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let db = db();
        db.create_event(&event("Party Event", "music", vec![])).unwrap();
        db.create_event(&event("Other", "music", vec![])).unwrap();

        for keyword in ["party", "PARTY", "rty Ev"] {
            let hits = db.search_events(keyword).unwrap();
            assert_eq!(hits.len(), 1, "keyword {keyword}");
            assert_eq!(hits[0].name, "Party Event");
        }
    }

    #[test]
    fn search_matches_venue_and_treats_wildcards_literally() {
        let db = db();
        let mut e = event("Quiz", "games", vec![]);
        e.venue = "The 100% Bar".to_string();
        db.create_event(&e).unwrap();
        db.create_event(&event("Other", "games", vec![])).unwrap();

        assert_eq!(db.search_events("100%").unwrap().len(), 1);
        assert_eq!(db.search_events("%").unwrap().len(), 1);
        assert!(db.search_events("_").unwrap().is_empty());
    }

    #[test]
    fn registration_is_unique_per_pair() {
        let db = db();
        let user = db.create_user("alice", "pw").unwrap();
        let event_id = db.create_event(&event("Gala", "music", vec![])).unwrap();

        db.register_user_to_event(user, event_id).unwrap();
        let err = db.register_user_to_event(user, event_id).unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
        assert_eq!(count(&db, "SELECT COUNT(*) FROM registrations"), 1);

        let mine = db.list_events_for_user(user).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, event_id);
    }

    #[test]
    fn registration_to_missing_event_is_not_found() {
        let db = db();
        let user = db.create_user("alice", "pw").unwrap();
        let err = db.register_user_to_event(user, 404).unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[test]
    fn deletes_cascade() {
        let db = db();
        let alice = db.create_user("alice", "pw").unwrap();
        let bob = db.create_user("bob", "pw").unwrap();
        let gala = db.create_event(&event("Gala", "music", vec![translation("en")])).unwrap();
        let fair = db.create_event(&event("Fair", "food", vec![])).unwrap();

        db.register_user_to_event(alice, gala).unwrap();
        db.register_user_to_event(alice, fair).unwrap();
        db.register_user_to_event(bob, gala).unwrap();

        db.delete_user(alice).unwrap();
        assert_eq!(count(&db, "SELECT COUNT(*) FROM registrations WHERE user_id = 1"), 0);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM registrations"), 1);

        assert!(db.delete_event(gala).unwrap());
        assert_eq!(count(&db, "SELECT COUNT(*) FROM registrations"), 0);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM event_translations"), 0);
        assert!(!db.delete_event(gala).unwrap());
    }

    #[test]
    fn image_blob_round_trips() {
        let db = db();
        let mut e = event("Gala", "music", vec![]);
        e.image = Some(vec![0xde, 0xad, 0xbe, 0xef]);
        let id = db.create_event(&e).unwrap();

        assert_eq!(db.get_event(id).unwrap().unwrap().image, Some(vec![0xde, 0xad, 0xbe, 0xef]));
    }
}
