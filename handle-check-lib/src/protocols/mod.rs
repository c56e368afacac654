//! Checker implementations for concrete remote services.
//!
//! The core only depends on the [`Checker`](crate::Checker) trait; this module
//! holds ready-made implementations.

/// Plain HTTP endpoint probing
pub mod http;

// Re-export commonly used functions and types
pub use http::{classify_response, HttpChecker, USERNAME_PLACEHOLDER};
