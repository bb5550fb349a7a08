// Cinelog Constants
// Names and limits shared by the store and the CLI.

// Schema
pub const SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_USER_NAME: &str = "Default";

// Tables
pub const MOVIES_TABLE: &str = "movies";

// Paths
pub const CINELOG_FOLDER: &str = ".cinelog";
pub const DB_FILENAME: &str = "movies.db";
pub const DB_PATH_ENV: &str = "CINELOG_DB_PATH";

// Connection settings
pub const BUSY_TIMEOUT_MS: u32 = 5000;

// Input bounds (enforced by the CLI, not the store)
pub const RATING_MIN: f64 = 0.0;
pub const RATING_MAX: f64 = 10.0;
pub const YEAR_MIN: i64 = 1878; // first motion picture
pub const YEAR_MAX: i64 = 2100;

// Search
pub const MAX_SUGGESTIONS: usize = 5;
