//! Client code for outpost.
//!
//! This crate provides request classification and the origin HTTP
//! client used by the proxy server.

pub mod classify;
pub mod origin;

pub use classify::{ClassifierRules, Decision};

pub use origin::{OriginClient, OriginConfig, OriginFetcher, OriginResponse};
