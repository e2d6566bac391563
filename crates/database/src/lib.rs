//! Hymnal Local Store
//!
//! SQLite storage for the offline hymn catalog, per-user preferences, the
//! favorites/recent entries behind the secure storage seam, and the
//! install-scoped sync watermark. Built on sqlx.

pub mod connection;
pub mod migrations;
pub mod queries;
pub mod search;

pub use connection::{close, connect, connect_in_memory, DatabaseConfig, DbPool};
pub use migrations::{current_version, initialize_schema, optimize, run_migrations, verify_integrity};
