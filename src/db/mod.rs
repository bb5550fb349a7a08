// Database module

pub mod bootstrap;
pub mod movies;
pub mod users;


use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::constants::{BUSY_TIMEOUT_MS, CINELOG_FOLDER, DB_FILENAME, DB_PATH_ENV};
use crate::error::{CatalogError, Result};

use bootstrap::BootstrapReport;
use movies::{Movie, MovieList, MovieUpdate, NewMovie};
use users::User;

/// Resolve the database path: explicit path, then `CINELOG_DB_PATH`, then
/// `~/.cinelog/movies.db`.
pub fn resolve_db_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Ok(v) = std::env::var(DB_PATH_ENV) {
        if !v.trim().is_empty() {
            return Ok(PathBuf::from(v));
        }
    }

    default_db_path()
}

/// Get the default database path: ~/.cinelog/movies.db
pub fn default_db_path() -> Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| CatalogError::Other("Could not determine home directory".to_string()))?;
    Ok(home.home_dir().join(CINELOG_FOLDER).join(DB_FILENAME))
}

/// Open a connection with per-connection pragmas set. Does NOT bootstrap.
pub fn open_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;

    // Enable foreign keys (must be done per connection)
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(&format!("PRAGMA busy_timeout = {};", BUSY_TIMEOUT_MS))?;

    Ok(conn)
}

/// Handle to a movie store file.
///
/// Holds only the path. Every operation opens a short-lived connection,
/// runs its statements, and closes it again; nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct Store {
    db_path: PathBuf,
}

impl Store {
    /// Open (or create) the store at `db_path` and bring its schema up to date.
    /// Call once at startup. A bootstrap failure is fatal for the caller.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let (store, _) = Self::open_with_report(db_path)?;
        Ok(store)
    }

    /// Like [`Store::open`], also returning what the bootstrap changed.
    pub fn open_with_report(db_path: impl Into<PathBuf>) -> Result<(Self, BootstrapReport)> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut conn = open_connection(&db_path)?;
        let report = bootstrap::run_bootstrap(&mut conn)?;
        log::debug!("Store ready at {}", db_path.display());

        Ok((Self { db_path }, report))
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Open a short-lived connection to this store.
    pub fn connect(&self) -> Result<Connection> {
        open_connection(&self.db_path)
    }

    // ----- Users -----

    pub fn list_users(&self) -> Result<Vec<User>> {
        users::list_users(&self.connect()?)
    }

    pub fn get_user(&self, name: &str) -> Result<Option<User>> {
        users::get_user(&self.connect()?, name)
    }

    /// Like [`Store::get_user`], but absence is a `UserNotFound` error.
    pub fn require_user(&self, name: &str) -> Result<User> {
        self.get_user(name)?
            .ok_or_else(|| CatalogError::UserNotFound(name.to_string()))
    }

    pub fn get_or_create_user(&self, name: &str) -> Result<User> {
        users::get_or_create_user(&self.connect()?, name)
    }

    // ----- Movies -----

    pub fn list_movies(&self, owner_id: i64) -> Result<MovieList> {
        movies::list_movies(&self.connect()?, owner_id)
    }

    pub fn get_movie(&self, owner_id: i64, title: &str) -> Result<Option<Movie>> {
        movies::get_movie(&self.connect()?, owner_id, title)
    }

    pub fn add_movie(&self, owner_id: i64, movie: &NewMovie) -> Result<i64> {
        let mut conn = self.connect()?;
        movies::add_movie(&mut conn, owner_id, movie)
    }

    pub fn delete_movie(&self, owner_id: i64, title: &str) -> Result<()> {
        movies::delete_movie(&self.connect()?, owner_id, title)
    }

    pub fn update_movie(&self, owner_id: i64, title: &str, updates: &MovieUpdate) -> Result<()> {
        // No fields, no connection
        if updates.is_empty() {
            return Ok(());
        }
        movies::update_movie(&self.connect()?, owner_id, title, updates)
    }
}
