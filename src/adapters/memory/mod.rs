//! In-process item store
//!
//! Backs the CLI's `memory` backend and the test suite.

pub mod store;

pub use store::MemoryStore;
