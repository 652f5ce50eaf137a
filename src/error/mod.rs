//! Error handling
//!
//! Defines the error type returned by every storage operation.

pub mod types;

pub use types::*;
