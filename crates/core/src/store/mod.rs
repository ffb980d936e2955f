//! SQLite-backed versioned store for cached origin responses.
//!
//! This module provides the persistent key/value store behind the proxy,
//! using SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Records keyed by (generation, request_key), replaced wholesale on write
//! - A single-row pointer naming the current generation
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod generations;
pub mod migrations;
pub mod records;

pub use crate::Error;

pub use connection::VersionedStore;
pub use records::StoreRecord;
