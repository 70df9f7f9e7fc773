// Sowtrack - Livestock stage tracking
// Copyright (c) 2025 Sowtrack Contributors
// Licensed under the MIT License

//! # Sowtrack - Livestock stage tracking
//!
//! Sowtrack follows breeding animals through the stages of a production pipeline
//! (breeding, gestation, farrowing, nursery, fattening, dried, in-house) and keeps a
//! per-stage record of every visit.
//!
//! ## Overview
//!
//! This library provides:
//! - **Listing** the animals active in a stage, or closed in a given month, with
//!   opaque cursors that only resume the listing that issued them
//! - **Transitions** between stages that never leave two active records behind and
//!   converge when replayed
//! - **Lookups** of profiles, medical history and stage history
//! - **A client** with a bearer-token HTTP transport and a session-owned cache
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Key codec, cursors, listings, transitions, lookups and the API facade
//! - [`client`] - Remote transport and client-side reconciliation
//! - [`adapters`] - Item stores (in-memory, PostgreSQL)
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sowtrack::adapters::database::create_item_store;
//! use sowtrack::config::load_config;
//! use sowtrack::core::api::{StageApi, TransitionRequest};
//! use sowtrack::domain::Stage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("sowtrack.toml")?;
//!     let store = create_item_store(&config).await?;
//!     let api = StageApi::new(store, config.pagination.clone());
//!
//!     let response = api
//!         .transition(&TransitionRequest {
//!             source_record_id: "B1".to_string(),
//!             animal_id: "P1".to_string(),
//!             farm_id: "F1".to_string(),
//!             target_stage: Stage::Gestation,
//!         })
//!         .await;
//!
//!     println!("{}", serde_json::to_string_pretty(&response)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Library operations return [`domain::Result`], whose error is
//! [`domain::SowtrackError`]. Each error has an [`domain::ErrorKind`]; the facade in
//! [`core::api`] turns failures into `{success: false, data: "<message>", error}`
//! envelopes instead of returning them.
//!
//! ```rust
//! use sowtrack::domain::{ErrorKind, SowtrackError};
//!
//! let err = SowtrackError::StaleTransition("record B1 is no longer active".to_string());
//! assert_eq!(err.kind(), ErrorKind::StaleTransition);
//! ```

pub mod adapters;
pub mod cli;
pub mod client;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
