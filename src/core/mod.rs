//! Core business logic for Sowtrack.
//!
//! # Modules
//!
//! - [`keys`] - Composite storage and index key codec
//! - [`cursor`] - Opaque, scope-bound pagination cursors
//! - [`repository`] - Paginated active/history listings
//! - [`transition`] - Stage transitions, record updates and repair
//! - [`lookup`] - Profile, medical and stage history reads
//! - [`api`] - Uniform request/response facade over all of the above
//!
//! # Example
//!
//! ```rust,no_run
//! use sowtrack::adapters::memory::MemoryStore;
//! use sowtrack::config::PaginationConfig;
//! use sowtrack::core::api::{ListActiveRequest, StageApi};
//! use sowtrack::domain::Stage;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let api = StageApi::new(Arc::new(MemoryStore::new()), PaginationConfig::default());
//!
//! let response = api
//!     .list_active(&ListActiveRequest {
//!         farm_id: "F1".to_string(),
//!         stage: Stage::Gestation,
//!         cursor: None,
//!         limit: Some(25),
//!     })
//!     .await;
//!
//! println!("{} sows in gestation", response.data.len());
//! # }
//! ```

pub mod api;
pub mod cursor;
pub mod keys;
pub mod lookup;
pub mod repository;
pub mod transition;
