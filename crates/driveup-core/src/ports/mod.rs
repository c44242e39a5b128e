//! Port definitions
//!
//! Ports are interfaces the upload pipeline depends on but whose
//! implementations live in front-end or adapter crates.
//!
//! - [`TokenPersister`] - write-through persistence for refreshed tokens

pub mod token_store;

pub use token_store::{NoopTokenPersister, TokenPersister};
