// Cinelog - Library Entry Point
// Per-user movie catalog on a single SQLite file.

pub mod catalog;
pub mod constants;
pub mod db;
pub mod error;

pub use db::movies::{Movie, MovieAttributes, MovieList, MovieUpdate, NewMovie};
pub use db::users::User;
pub use db::Store;
pub use error::{CatalogError, Result};
