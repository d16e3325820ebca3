use rusqlite::{Connection, Row};
use tracing::{debug, info};

use boxoffice_types::models::Role;

use crate::models::UserRow;
use crate::{Constraint, Database, DbError, OptionalExt, QueryContext, Result, constraint_violation, password};

const USER_COLUMNS: &str = "id, username, password_hash, role, tickets, created_at";

impl Database {
    /// Register a new account with the default role and ticket balance.
    /// Returns the new user id.
    pub fn create_user(&self, username: &str, raw_password: &str) -> Result<i64> {
        if self.get_user_by_username(username)?.is_some() {
            return Err(DbError::Conflict(format!("user '{}' already exists", username)));
        }

        // Hash outside the connection lock
        let password_hash = password::hash(raw_password)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
                (username, &password_hash),
            )
            .map_err(|e| match constraint_violation(&e) {
                // Lost a race with a concurrent registration of the same name
                Some(Constraint::Unique) => {
                    DbError::Conflict(format!("user '{}' already exists", username))
                }
                _ => DbError::Query { context: "failed to create user", source: e },
            })?;

            let id = conn.last_insert_rowid();
            debug!("created user {} ({})", id, username);
            Ok(id)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
                .context("failed to retrieve users")?;

            let rows = stmt
                .query_map([], map_user)
                .context("failed to retrieve users")?
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("error scanning user row")?;

            Ok(rows)
        })
    }

    /// Fails with `NotFound` when no row was deleted.
    pub fn delete_user(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            let affected = conn
                .execute("DELETE FROM users WHERE id = ?1", [id])
                .context("failed to delete user")?;

            if affected == 0 {
                return Err(DbError::NotFound(format!("no user found with id {}", id)));
            }
            Ok(())
        })
    }

    /// Updating an id that does not exist is not an error here.
    pub fn update_user_role(&self, id: i64, role: Role) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET role = ?1 WHERE id = ?2",
                (role.as_str(), id),
            )
            .context("failed to update user role")?;
            Ok(())
        })
    }

    /// Unconditional `tickets - 1`. The balance has no floor and may go negative.
    pub fn decrement_tickets(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE users SET tickets = tickets - 1 WHERE id = ?1", [id])
                .context("failed to decrement ticket balance")?;
            Ok(())
        })
    }

    /// Lookup errors and unknown usernames both answer `false`.
    pub fn is_admin(&self, username: &str) -> bool {
        matches!(
            self.get_user_by_username(username),
            Ok(Some(user)) if user.role == Role::Admin.as_str()
        )
    }

    /// Whether `username` owns the account `owner_id`. Fails closed like `is_admin`.
    pub fn is_same_user(&self, username: &str, owner_id: i64) -> bool {
        matches!(
            self.get_user_by_id(owner_id),
            Ok(Some(user)) if user.username == username
        )
    }

    /// Seed an admin account if `username` is free. An existing account is left untouched.
    pub fn ensure_admin(&self, username: &str, raw_password: &str) -> Result<()> {
        if self.get_user_by_username(username)?.is_some() {
            return Ok(());
        }

        let password_hash = password::hash(raw_password)?;
        self.with_conn(|conn| {
            let inserted = conn
                .execute(
                    "INSERT OR IGNORE INTO users (username, password_hash, role) VALUES (?1, ?2, ?3)",
                    (username, &password_hash, Role::Admin.as_str()),
                )
                .context("failed to insert default admin user")?;

            if inserted > 0 {
                info!("Seeded admin account '{}'", username);
            }
            Ok(())
        })
    }
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        role: row.get(3)?,
        tickets: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
        [username],
        map_user,
    )
    .optional("failed to get user by username")
}

fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        [id],
        map_user,
    )
    .optional("failed to get user by id")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn user_count(db: &Database) -> i64 {
        db.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?))
            .unwrap()
    }

    #[test]
    fn new_user_gets_defaults() {
        let db = db();
        let id = db.create_user("alice", "pw").unwrap();

        let user = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.role, "user");
        assert_eq!(user.tickets, 999);
        assert_ne!(user.password_hash, "pw");
        assert!(password::verify("pw", &user.password_hash));
        assert!(!user.created_at.is_empty());
    }

    #[test]
    fn duplicate_username_is_a_conflict() {
        let db = db();
        db.create_user("alice", "pw").unwrap();

        let err = db.create_user("alice", "other").unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
        assert_eq!(user_count(&db), 1);
    }

    #[test]
    fn lookups_of_missing_users_are_absent_not_errors() {
        let db = db();
        assert!(db.get_user_by_username("ghost").unwrap().is_none());
        assert!(db.get_user_by_id(42).unwrap().is_none());
    }

    #[test]
    fn delete_missing_user_is_not_found() {
        let db = db();
        let id = db.create_user("alice", "pw").unwrap();

        db.delete_user(id).unwrap();
        assert!(matches!(db.delete_user(id), Err(DbError::NotFound(_))));
    }

    #[test]
    fn role_update_and_admin_predicate() {
        let db = db();
        let id = db.create_user("bob", "pw").unwrap();
        assert!(!db.is_admin("bob"));

        db.update_user_role(id, Role::Admin).unwrap();
        assert!(db.is_admin("bob"));

        // Unknown id is a silent no-op
        db.update_user_role(9999, Role::Admin).unwrap();
        assert!(!db.is_admin("nobody"));
    }

    #[test]
    fn same_user_predicate_fails_closed() {
        let db = db();
        let alice = db.create_user("alice", "pw").unwrap();
        let bob = db.create_user("bob", "pw").unwrap();

        assert!(db.is_same_user("alice", alice));
        assert!(!db.is_same_user("alice", bob));
        assert!(!db.is_same_user("alice", 9999));
    }

    #[test]
    fn ticket_balance_has_no_floor() {
        let db = db();
        let id = db.create_user("alice", "pw").unwrap();
        db.with_conn(|conn| {
            conn.execute("UPDATE users SET tickets = 0 WHERE id = ?1", [id])?;
            Ok(())
        })
        .unwrap();

        db.decrement_tickets(id).unwrap();
        assert_eq!(db.get_user_by_id(id).unwrap().unwrap().tickets, -1);
    }

    #[test]
    fn ensure_admin_is_idempotent() {
        let db = db();
        db.ensure_admin("admin", "secret").unwrap();
        db.ensure_admin("admin", "changed").unwrap();

        let admin = db.get_user_by_username("admin").unwrap().unwrap();
        assert_eq!(admin.role, "admin");
        assert!(password::verify("secret", &admin.password_hash));
        assert_eq!(user_count(&db), 1);
    }

    #[test]
    fn list_users_in_id_order() {
        let db = db();
        db.create_user("alice", "pw").unwrap();
        db.create_user("bob", "pw").unwrap();

        let names: Vec<_> = db.list_users().unwrap().into_iter().map(|u| u.username).collect();
        assert_eq!(names, ["alice", "bob"]);
    }
}
