//! Storage abstraction layer
//!
//! The [`ItemStore`] trait is the only storage surface the core uses; backends live
//! in [`crate::adapters::memory`] and [`crate::adapters::postgresql`].

pub mod factory;
pub mod traits;

pub use factory::create_item_store;
pub use traits::{Condition, Item, ItemStore};
