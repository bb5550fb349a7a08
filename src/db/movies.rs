// Movie repository
// Per-owner CRUD. (owner_id, title) uniqueness is enforced here, not by the schema:
// legacy stores may hold rows that predate ownership.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};

// ----- Movie -----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub year: i64,
    pub rating: f64,
    pub poster_url: Option<String>,
    pub note: Option<String>,
    pub external_id: Option<String>,
}

/// Everything about a movie except its identity and title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieAttributes {
    pub year: i64,
    pub rating: f64,
    pub poster_url: Option<String>,
    pub note: Option<String>,
    pub external_id: Option<String>,
}

impl Movie {
    pub fn attributes(&self) -> MovieAttributes {
        MovieAttributes {
            year: self.year,
            rating: self.rating,
            poster_url: self.poster_url.clone(),
            note: self.note.clone(),
            external_id: self.external_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMovie {
    pub title: String,
    pub year: i64,
    pub rating: f64,
    pub poster_url: Option<String>,
    pub note: Option<String>,
    pub external_id: Option<String>,
}

impl NewMovie {
    /// A movie with only the required fields set.
    pub fn new(title: impl Into<String>, year: i64, rating: f64) -> Self {
        Self {
            title: title.into(),
            year,
            rating,
            poster_url: None,
            note: None,
            external_id: None,
        }
    }
}

/// Sparse update. `None` leaves a column untouched.
/// For nullable columns `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovieUpdate {
    pub rating: Option<f64>,
    pub year: Option<i64>,
    pub poster_url: Option<Option<String>>,
    pub note: Option<Option<String>>,
    pub external_id: Option<Option<String>>,
}

impl MovieUpdate {
    pub fn is_empty(&self) -> bool {
        self.rating.is_none()
            && self.year.is_none()
            && self.poster_url.is_none()
            && self.note.is_none()
            && self.external_id.is_none()
    }
}

// ----- MovieList -----

/// One owner's movies, title ascending (case-insensitive).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MovieList {
    movies: Vec<Movie>,
}

impl MovieList {
    pub fn new(movies: Vec<Movie>) -> Self {
        Self { movies }
    }

    /// Exact-title lookup
    pub fn get(&self, title: &str) -> Option<&Movie> {
        self.movies.iter().find(|m| m.title == title)
    }

    pub fn contains(&self, title: &str) -> bool {
        self.get(title).is_some()
    }

    pub fn titles(&self) -> Vec<&str> {
        self.movies.iter().map(|m| m.title.as_str()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Movie> {
        self.movies.iter()
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }
}

impl<'a> IntoIterator for &'a MovieList {
    type Item = &'a Movie;
    type IntoIter = std::slice::Iter<'a, Movie>;

    fn into_iter(self) -> Self::IntoIter {
        self.movies.iter()
    }
}

// ----- Queries -----

const MOVIE_COLUMNS: &str = "id, title, year, rating, poster_url, note, external_id";

fn map_movie(row: &rusqlite::Row) -> rusqlite::Result<Movie> {
    Ok(Movie {
        id: row.get(0)?,
        title: row.get(1)?,
        year: row.get(2)?,
        rating: row.get(3)?,
        poster_url: row.get(4)?,
        note: row.get(5)?,
        external_id: row.get(6)?,
    })
}

pub fn list_movies(conn: &Connection, owner_id: i64) -> Result<MovieList> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM movies WHERE owner_id = ?1 ORDER BY title COLLATE NOCASE ASC, title ASC",
        MOVIE_COLUMNS
    ))?;
    let movies = stmt
        .query_map(params![owner_id], map_movie)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(MovieList::new(movies))
}

pub fn get_movie(conn: &Connection, owner_id: i64, title: &str) -> Result<Option<Movie>> {
    let result = conn
        .query_row(
            &format!(
                "SELECT {} FROM movies WHERE owner_id = ?1 AND title = ?2",
                MOVIE_COLUMNS
            ),
            params![owner_id, title],
            map_movie,
        )
        .optional()?;
    Ok(result)
}

fn movie_exists(conn: &Connection, owner_id: i64, title: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM movies WHERE owner_id = ?1 AND title = ?2)",
        params![owner_id, title],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Insert a movie for `owner_id`. Fails with `Duplicate` if the owner already
/// has a movie with exactly this title.
///
/// The check and the insert share one `BEGIN IMMEDIATE` transaction, so the
/// write lock is held across both and concurrent adds cannot both succeed.
pub fn add_movie(conn: &mut Connection, owner_id: i64, movie: &NewMovie) -> Result<i64> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if movie_exists(&tx, owner_id, &movie.title)? {
        return Err(CatalogError::Duplicate(movie.title.clone()));
    }

    tx.execute(
        "INSERT INTO movies (title, year, rating, poster_url, note, external_id, owner_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            movie.title,
            movie.year,
            movie.rating,
            movie.poster_url,
            movie.note,
            movie.external_id,
            owner_id,
        ],
    )?;
    let id = tx.last_insert_rowid();
    tx.commit()?;

    log::debug!("Added movie '{}' (id {}) for user {}", movie.title, id, owner_id);
    Ok(id)
}

/// Delete the owner's movie with this exact title.
pub fn delete_movie(conn: &Connection, owner_id: i64, title: &str) -> Result<()> {
    let deleted = conn.execute(
        "DELETE FROM movies WHERE title = ?1 AND owner_id = ?2",
        params![title, owner_id],
    )?;
    if deleted == 0 {
        return Err(CatalogError::NotFound(title.to_string()));
    }

    log::debug!("Deleted movie '{}' for user {}", title, owner_id);
    Ok(())
}

/// Apply a sparse update. Only supplied fields are written; an empty update
/// succeeds without touching the database.
pub fn update_movie(conn: &Connection, owner_id: i64, title: &str, updates: &MovieUpdate) -> Result<()> {
    if updates.is_empty() {
        return Ok(());
    }

    let mut set_clauses: Vec<String> = Vec::new();
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(rating) = updates.rating {
        set_clauses.push(format!("rating = ?{}", params_vec.len() + 1));
        params_vec.push(Box::new(rating));
    }
    if let Some(year) = updates.year {
        set_clauses.push(format!("year = ?{}", params_vec.len() + 1));
        params_vec.push(Box::new(year));
    }
    if let Some(ref poster_url) = updates.poster_url {
        set_clauses.push(format!("poster_url = ?{}", params_vec.len() + 1));
        params_vec.push(Box::new(poster_url.clone()));
    }
    if let Some(ref note) = updates.note {
        set_clauses.push(format!("note = ?{}", params_vec.len() + 1));
        params_vec.push(Box::new(note.clone()));
    }
    if let Some(ref external_id) = updates.external_id {
        set_clauses.push(format!("external_id = ?{}", params_vec.len() + 1));
        params_vec.push(Box::new(external_id.clone()));
    }

    params_vec.push(Box::new(title.to_string()));
    let title_param = params_vec.len();
    params_vec.push(Box::new(owner_id));
    let owner_param = params_vec.len();

    let sql = format!(
        "UPDATE movies SET {} WHERE title = ?{} AND owner_id = ?{}",
        set_clauses.join(", "),
        title_param,
        owner_param
    );

    let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let updated = conn.execute(&sql, params_refs.as_slice())?;
    if updated == 0 {
        return Err(CatalogError::NotFound(title.to_string()));
    }

    log::debug!("Updated movie '{}' for user {} ({})", title, owner_id, set_clauses.join(", "));
    Ok(())
}
