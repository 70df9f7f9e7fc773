//! PostgreSQL storage backend
//!
//! Items live in a single `sowtrack_items` table with a JSONB `data` column and a
//! partial index over the listing columns.

pub mod client;
pub mod store;

pub use client::PostgreSQLClient;
pub use store::PostgresStore;
