//! Core types and shared functionality for outpost.
//!
//! This crate provides:
//! - Versioned store implementation with SQLite backend
//! - Request-key derivation
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod key;
pub mod store;

pub use config::AppConfig;
pub use error::Error;
pub use store::{StoreRecord, VersionedStore};
