//! Database module: row models and SQL repositories.
//!
//! - `model`: row shapes returned by queries and their conversion into domain types.
//! - `repo`: SQL-only functions, each scoped to the requesting user where ownership applies.
//! - `error`: typed failures surfaced through `anyhow`.
//!
//! External modules import from `cadence_tracker::db`; the repository API is re-exported.

pub mod error;
pub mod model;
pub mod repo;

pub use error::StoreError;
pub use repo::*;
