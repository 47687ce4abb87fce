//! Weighted request rate limiter.
//!
//! Every request is charged a cost that depends on who is asking: the shape of
//! the client address, the operating system and device class guessed from the
//! user agent, and optionally where the address is located. Costs accumulate
//! per fingerprint within a time window, and a fingerprint that overspends is
//! banned for a while. The limiter is exposed as tower middleware for Axum.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod device;
pub mod duration;
pub mod prelude;
pub mod rate_limit;
pub mod sanitize;

// Re-export commonly used types
pub use device::UaDeviceClassifier;
pub use rate_limit::{
	install, ClientAddrMode, RateLimitApi, RateLimitConfig, RateLimitLayer, RateLimiter, Verdict,
};

// vim: ts=4
