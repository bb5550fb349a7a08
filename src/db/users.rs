// User directory
// Maps human-chosen names to stable numeric ids. Users are never renamed or removed here.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
}

fn map_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

/// All users, name ascending (case-insensitive)
pub fn list_users(conn: &Connection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare("SELECT id, name FROM users ORDER BY name COLLATE NOCASE ASC, id ASC")?;
    let users = stmt
        .query_map([], map_user)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(users)
}

/// Look up a user by exact name. Absence is not an error.
pub fn get_user(conn: &Connection, name: &str) -> Result<Option<User>> {
    let result = conn
        .query_row(
            "SELECT id, name FROM users WHERE name = ?1",
            params![name],
            map_user,
        )
        .optional()?;
    Ok(result)
}

/// Return the user with this name, creating it first if needed.
/// The insert is conditional, so calling twice with the same name never fails.
pub fn get_or_create_user(conn: &Connection, name: &str) -> Result<User> {
    let inserted = conn.execute(
        "INSERT INTO users (name) SELECT ?1 WHERE NOT EXISTS (SELECT 1 FROM users WHERE name = ?1)",
        params![name],
    )?;
    if inserted > 0 {
        log::debug!("Created user '{}'", name);
    }

    let user = conn.query_row(
        "SELECT id, name FROM users WHERE name = ?1",
        params![name],
        map_user,
    )?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_USER_NAME;
    use crate::db::bootstrap::run_bootstrap;

    fn setup_db() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        run_bootstrap(&mut conn).unwrap();
        conn
    }

    #[test]
    fn test_get_or_create_is_stable() {
        let conn = setup_db();
        let first = get_or_create_user(&conn, "alice").unwrap();
        let second = get_or_create_user(&conn, "alice").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.name, "alice");
    }

    #[test]
    fn test_get_user_missing_is_none() {
        let conn = setup_db();
        assert!(get_user(&conn, "nobody").unwrap().is_none());

        let bob = get_or_create_user(&conn, "bob").unwrap();
        assert_eq!(get_user(&conn, "bob").unwrap(), Some(bob));
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let conn = setup_db();
        let lower = get_or_create_user(&conn, "carol").unwrap();
        let upper = get_or_create_user(&conn, "Carol").unwrap();
        assert_ne!(lower.id, upper.id);
        assert!(get_user(&conn, "CAROL").unwrap().is_none());
    }

    #[test]
    fn test_list_users_orders_case_insensitively() {
        let conn = setup_db();
        get_or_create_user(&conn, "zoe").unwrap();
        get_or_create_user(&conn, "Adam").unwrap();
        get_or_create_user(&conn, "bea").unwrap();

        let names: Vec<String> = list_users(&conn).unwrap().into_iter().map(|u| u.name).collect();
        assert_eq!(names, vec!["Adam", "bea", DEFAULT_USER_NAME, "zoe"]);
    }

    #[test]
    fn test_list_users_empty_without_bootstrap_rows() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL UNIQUE);")
            .unwrap();
        assert!(list_users(&conn).unwrap().is_empty());
    }
}
