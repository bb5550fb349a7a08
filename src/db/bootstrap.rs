// Schema bootstrap
// Tables and columns are created when missing, never dropped. The one rewrite is
// the movies table of the first layout, whose global UNIQUE on title predates owners.
// Safe to run on every start against any previously shipped layout.

use std::collections::HashSet;

use rusqlite::{params, Connection};

use crate::constants::{DEFAULT_USER_NAME, MOVIES_TABLE, SCHEMA_VERSION};
use crate::error::{CatalogError, Result};

const USERS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );
"#;

/// Current movies layout. Fresh stores get it directly; legacy stores keep
/// their existing table and pick up columns from OPTIONAL_COLUMNS.
const MOVIES_COLUMNS: &str = r#"
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        year INTEGER NOT NULL,
        rating REAL NOT NULL,
        poster_url TEXT,
        owner_id INTEGER REFERENCES users(id),
        note TEXT,
        external_id TEXT
"#;

const MOVIES_COLUMN_NAMES: &str = "id, title, year, rating, poster_url, owner_id, note, external_id";

/// Columns introduced after the first release, in the order they shipped.
/// (table, column, declaration)
const OPTIONAL_COLUMNS: &[(&str, &str, &str)] = &[
    (MOVIES_TABLE, "poster_url", "TEXT"),
    (MOVIES_TABLE, "owner_id", "INTEGER REFERENCES users(id)"),
    (MOVIES_TABLE, "note", "TEXT"),
    (MOVIES_TABLE, "external_id", "TEXT"),
];

const INDEXES: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_movies_owner ON movies(owner_id);
"#;

/// What a bootstrap pass changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BootstrapReport {
    /// `table.column` for every column added during this pass
    pub added_columns: Vec<String>,
    /// Movie rows that had no owner and were assigned to the default user
    pub backfilled_rows: usize,
    pub default_user_id: i64,
    /// The movies table was rebuilt to drop a store-wide UNIQUE on title
    pub rebuilt_movies: bool,
}

/// Get current schema version marker
pub fn get_schema_version(conn: &Connection) -> Result<u32> {
    let version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(version)
}

/// Names of the columns currently present on `table`.
pub fn table_columns(conn: &Connection, table: &str) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut columns = HashSet::new();
    for row in rows {
        columns.insert(row?);
    }
    Ok(columns)
}

/// True if a UNIQUE index (declared or created) covers `movies.title` alone.
/// Such an index makes titles unique across owners instead of per owner.
pub fn has_title_unique_index(conn: &Connection) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA index_list({})", MOVIES_TABLE))?;
    let unique_indexes: Vec<String> = stmt
        .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, bool>(2)?)))?
        .filter_map(|r| match r {
            Ok((name, true)) => Some(Ok(name)),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        })
        .collect::<std::result::Result<_, _>>()?;

    for index in unique_indexes {
        let mut info = conn.prepare("SELECT name FROM pragma_index_info(?1)")?;
        let columns: Vec<Option<String>> = info
            .query_map(params![index], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        if matches!(columns.as_slice(), [Some(column)] if column.eq_ignore_ascii_case("title")) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Bring the store up to the current layout in a single transaction.
///
/// Missing columns are detected up front, so any `ALTER TABLE` failure is a
/// real error and aborts the pass. A movies table still carrying the
/// store-wide UNIQUE on title is copied into the current layout. The default
/// user is ensured and orphaned movie rows are reassigned to it on every run,
/// not only when `owner_id` was just added.
pub fn run_bootstrap(conn: &mut Connection) -> Result<BootstrapReport> {
    let current_version = get_schema_version(conn)?;

    // Refuse to touch a store written by a newer Cinelog build
    if current_version > SCHEMA_VERSION {
        return Err(CatalogError::SchemaTooNew {
            found: current_version,
            supported: SCHEMA_VERSION,
        });
    }

    let tx = conn.transaction()?;

    tx.execute_batch(USERS_TABLE)?;
    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} ({});",
        MOVIES_TABLE, MOVIES_COLUMNS
    ))?;

    let mut added_columns = Vec::new();
    for (table, column, decl) in OPTIONAL_COLUMNS {
        if add_column_if_missing(&tx, table, column, decl)? {
            added_columns.push(format!("{}.{}", table, column));
        }
    }

    // After the column adds, so every current column exists on the old table
    let rebuilt_movies = has_title_unique_index(&tx)?;
    if rebuilt_movies {
        rebuild_movies_table(&tx)?;
    }

    tx.execute_batch(INDEXES)?;

    let default_user_id = ensure_default_user(&tx)?;
    let backfilled_rows = backfill_owner(&tx, default_user_id)?;

    tx.execute_batch(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))?;
    tx.commit()?;

    for column in &added_columns {
        log::info!("Added column {}", column);
    }
    if rebuilt_movies {
        log::info!("Rebuilt {} table without the store-wide title constraint", MOVIES_TABLE);
    }
    if backfilled_rows > 0 {
        log::info!(
            "Assigned {} unowned movies to user '{}' (id {})",
            backfilled_rows,
            DEFAULT_USER_NAME,
            default_user_id
        );
    }

    Ok(BootstrapReport {
        added_columns,
        backfilled_rows,
        default_user_id,
        rebuilt_movies,
    })
}

/// Add `column` to `table` unless it is already there. Returns true if added.
fn add_column_if_missing(conn: &Connection, table: &str, column: &str, decl: &str) -> Result<bool> {
    let columns = table_columns(conn, table)?;
    if columns.contains(column) {
        return Ok(false);
    }

    conn.execute_batch(&format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, decl))?;
    Ok(true)
}

/// Copy every row into a fresh table with the current layout, then swap it in.
/// Ids are kept. Indexes on the old table go with it.
fn rebuild_movies_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE movies_rebuild ({cols});
         INSERT INTO movies_rebuild ({names}) SELECT {names} FROM {table};
         DROP TABLE {table};
         ALTER TABLE movies_rebuild RENAME TO {table};",
        cols = MOVIES_COLUMNS,
        names = MOVIES_COLUMN_NAMES,
        table = MOVIES_TABLE,
    ))?;
    Ok(())
}

fn ensure_default_user(conn: &Connection) -> Result<i64> {
    conn.execute(
        "INSERT INTO users (name) SELECT ?1 WHERE NOT EXISTS (SELECT 1 FROM users WHERE name = ?1)",
        params![DEFAULT_USER_NAME],
    )?;
    let id: i64 = conn.query_row(
        "SELECT id FROM users WHERE name = ?1",
        params![DEFAULT_USER_NAME],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn backfill_owner(conn: &Connection, default_user_id: i64) -> Result<usize> {
    let updated = conn.execute(
        "UPDATE movies SET owner_id = ?1 WHERE owner_id IS NULL",
        params![default_user_id],
    )?;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema_snapshot(conn: &Connection) -> Vec<(String, String)> {
        let mut stmt = conn
            .prepare("SELECT name, sql FROM sqlite_master WHERE sql IS NOT NULL ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn test_fresh_store_gets_full_layout() {
        let mut conn = Connection::open_in_memory().unwrap();
        let report = run_bootstrap(&mut conn).unwrap();

        // Base tables already carry every optional column
        assert!(report.added_columns.is_empty());
        assert_eq!(report.backfilled_rows, 0);
        assert!(!report.rebuilt_movies);

        let cols = table_columns(&conn, MOVIES_TABLE).unwrap();
        for c in ["id", "title", "year", "rating", "poster_url", "owner_id", "note", "external_id"] {
            assert!(cols.contains(c), "missing column {}", c);
        }
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_default_user_exists_after_bootstrap() {
        let mut conn = Connection::open_in_memory().unwrap();
        let report = run_bootstrap(&mut conn).unwrap();

        let name: String = conn
            .query_row("SELECT name FROM users WHERE id = ?1", params![report.default_user_id], |row| row.get(0))
            .unwrap();
        assert_eq!(name, DEFAULT_USER_NAME);
    }

    #[test]
    fn test_legacy_movies_table_gains_columns_and_owner() {
        let mut conn = Connection::open_in_memory().unwrap();
        // First shipped layout: no users, no owner, no optional columns
        conn.execute_batch(r#"
            CREATE TABLE movies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT UNIQUE NOT NULL,
                year INTEGER NOT NULL,
                rating REAL NOT NULL
            );
            INSERT INTO movies (title, year, rating) VALUES ('Alien', 1979, 8.5);
            INSERT INTO movies (title, year, rating) VALUES ('Heat', 1995, 8.3);
        "#).unwrap();

        let report = run_bootstrap(&mut conn).unwrap();

        assert_eq!(
            report.added_columns,
            vec![
                "movies.poster_url".to_string(),
                "movies.owner_id".to_string(),
                "movies.note".to_string(),
                "movies.external_id".to_string(),
            ]
        );
        assert_eq!(report.backfilled_rows, 2);

        let orphans: i64 = conn
            .query_row("SELECT COUNT(*) FROM movies WHERE owner_id IS NULL", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 0);

        let owners: Vec<i64> = conn
            .prepare("SELECT DISTINCT owner_id FROM movies")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(owners, vec![report.default_user_id]);

        // Store-wide title constraint is gone, rows and ids survive
        assert!(report.rebuilt_movies);
        assert!(!has_title_unique_index(&conn).unwrap());
        let heat_id: i64 = conn
            .query_row("SELECT id FROM movies WHERE title = 'Heat'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(heat_id, 2);
    }

    #[test]
    fn test_title_unique_index_lets_other_owners_share_titles() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(r#"
            CREATE TABLE movies (id INTEGER PRIMARY KEY, Title TEXT, year INTEGER, rating REAL);
            CREATE UNIQUE INDEX idx_title ON movies(Title);
            INSERT INTO movies (Title, year, rating) VALUES ('Alien', 1979, 8.5);
        "#).unwrap();

        let report = run_bootstrap(&mut conn).unwrap();
        assert!(report.rebuilt_movies);

        conn.execute("INSERT INTO users (name) VALUES ('alice')", []).unwrap();
        let alice = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO movies (title, year, rating, owner_id) VALUES ('Alien', 1979, 9.0, ?1)",
            params![alice],
        )
        .unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM movies WHERE title = 'Alien'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);

        // The owner index is recreated on the new table
        let owner_index: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'idx_movies_owner'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(owner_index, 1);

        let again = run_bootstrap(&mut conn).unwrap();
        assert!(!again.rebuilt_movies);
    }

    #[test]
    fn test_composite_unique_index_is_left_alone() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_bootstrap(&mut conn).unwrap();
        conn.execute_batch("CREATE UNIQUE INDEX idx_owner_title ON movies(owner_id, title);").unwrap();

        assert!(!has_title_unique_index(&conn).unwrap());
        let report = run_bootstrap(&mut conn).unwrap();
        assert!(!report.rebuilt_movies);
    }

    #[test]
    fn test_partial_legacy_layout_only_adds_missing() {
        let mut conn = Connection::open_in_memory().unwrap();
        // Layout after poster_url and owner_id shipped, before note/external_id
        conn.execute_batch(r#"
            CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL UNIQUE);
            CREATE TABLE movies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                year INTEGER NOT NULL,
                rating REAL NOT NULL,
                poster_url TEXT,
                owner_id INTEGER REFERENCES users(id)
            );
            INSERT INTO users (name) VALUES ('alice');
            INSERT INTO movies (title, year, rating, owner_id) VALUES ('Dune', 2021, 8.0, 1);
            INSERT INTO movies (title, year, rating, owner_id) VALUES ('Tron', 1982, 6.8, NULL);
        "#).unwrap();

        let report = run_bootstrap(&mut conn).unwrap();
        assert_eq!(
            report.added_columns,
            vec!["movies.note".to_string(), "movies.external_id".to_string()]
        );
        assert_eq!(report.backfilled_rows, 1);
        assert_ne!(report.default_user_id, 1);

        // Owned rows keep their owner
        let dune_owner: i64 = conn
            .query_row("SELECT owner_id FROM movies WHERE title = 'Dune'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(dune_owner, 1);

        let tron_owner: i64 = conn
            .query_row("SELECT owner_id FROM movies WHERE title = 'Tron'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(tron_owner, report.default_user_id);
    }

    #[test]
    fn test_bootstrap_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(r#"
            CREATE TABLE movies (id INTEGER PRIMARY KEY, title TEXT, year INTEGER, rating REAL);
            INSERT INTO movies (title, year, rating) VALUES ('Brazil', 1985, 7.9);
        "#).unwrap();

        let first = run_bootstrap(&mut conn).unwrap();
        let schema_once = schema_snapshot(&conn);
        let users_once: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0)).unwrap();

        let second = run_bootstrap(&mut conn).unwrap();
        assert!(second.added_columns.is_empty());
        assert_eq!(second.backfilled_rows, 0);
        assert_eq!(second.default_user_id, first.default_user_id);
        assert_eq!(schema_snapshot(&conn), schema_once);

        let users_twice: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0)).unwrap();
        assert_eq!(users_once, users_twice);
    }

    #[test]
    fn test_out_of_band_orphans_self_heal() {
        let mut conn = Connection::open_in_memory().unwrap();
        let report = run_bootstrap(&mut conn).unwrap();

        // Row inserted behind the store's back with no owner
        conn.execute(
            "INSERT INTO movies (title, year, rating) VALUES ('Stalker', 1979, 8.1)",
            [],
        )
        .unwrap();

        let again = run_bootstrap(&mut conn).unwrap();
        assert_eq!(again.backfilled_rows, 1);
        let owner: i64 = conn
            .query_row("SELECT owner_id FROM movies WHERE title = 'Stalker'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(owner, report.default_user_id);
    }

    #[test]
    fn test_refuses_newer_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&format!("PRAGMA user_version = {}", SCHEMA_VERSION + 1)).unwrap();

        let err = run_bootstrap(&mut conn).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::SchemaTooNew { found, supported } if found == SCHEMA_VERSION + 1 && supported == SCHEMA_VERSION
        ));

        // Nothing was created
        let tables: i64 = conn
            .query_row("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(tables, 0);
    }
}
