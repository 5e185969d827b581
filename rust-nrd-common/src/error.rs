//! Error types for the rust-nrd implementation.

use thiserror::Error;

/// All possible errors that can occur within the rust-nrd implementation.
#[derive(Error, Debug)]
pub enum Error {
    /// Error related to TLV encoding/decoding.
    #[error("TLV error: {0}")]
    Tlv(String),

    /// Error related to NDN name handling.
    #[error("name error: {0}")]
    Name(String),

    /// Error related to configuration handling.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("other error: {0}")]
    Other(String),
}
