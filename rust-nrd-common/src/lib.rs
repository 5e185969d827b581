//! Common types and utilities for the rust-nrd NDN RIB daemon.
//!
//! This crate provides the pieces shared by the RIB engine and the CLI:
//! hierarchical NDN names, TLV encoding helpers, route identifier types,
//! the shared error enum, and metrics primitives.

pub mod error;
pub mod metrics;
pub mod name;
pub mod tlv;
pub mod types;

/// Reexport of common types
pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
