// Cinelog Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Movie '{0}' already exists.")]
    Duplicate(String),

    #[error("Movie '{0}' not found.")]
    NotFound(String),

    #[error("No user named '{0}'")]
    UserNotFound(String),

    #[error("Database schema version {found} is newer than this build supports (max {supported}). Please upgrade Cinelog.")]
    SchemaTooNew { found: u32, supported: u32 },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
