//! Persistence layer (single-file JSON document store).

pub mod store;

pub use store::JsonStore;
