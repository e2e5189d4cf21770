//! Error types for the bluesim library
//!
//! This module defines the error types used throughout the library.

use thiserror::Error;

/// Errors raised while decoding packets carried over the emulated radio
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("Packet truncated: need {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("Payload length mismatch: header says {declared}, got {actual}")]
    LengthMismatch { declared: usize, actual: usize },
}
