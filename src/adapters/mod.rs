//! External system integrations for Sowtrack.
//!
//! - [`database`] - the [`database::ItemStore`] abstraction and backend factory
//! - [`memory`] - in-process store for tests and local runs
//! - [`postgresql`] - PostgreSQL store (single JSONB item table)
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** so the transition engine and repository
//! only ever see the trait:
//!
//! ```rust
//! use sowtrack::adapters::database::ItemStore;
//! use sowtrack::adapters::memory::MemoryStore;
//! use std::sync::Arc;
//!
//! let store: Arc<dyn ItemStore + Send + Sync> = Arc::new(MemoryStore::new());
//! assert_eq!(store.backend_name(), "memory");
//! ```

pub mod database;
pub mod memory;
pub mod postgresql;
