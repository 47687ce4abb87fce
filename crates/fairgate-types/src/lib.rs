//! Shared types for the fairgate weighted rate limiter.
//!
//! Holds the error type, the clock abstraction and the optional device and
//! geo capabilities so hosts can implement them without depending on the
//! limiter itself.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod capability;
pub mod error;
pub mod prelude;
pub mod types;

// vim: ts=4
