//! Rate Limiting System
//!
//! Weighted request rate limiting. Each request is charged a cost derived from
//! the client's address shape, operating system, device class and location;
//! a fingerprint that spends more than its budget within one window is banned
//! for the kick time.

mod api;
mod config;
mod effect;
mod error;
mod extractors;
mod fingerprint;
mod limiter;
mod middleware;
mod store;

pub use api::{BanEntry, RateLimitApi, RateLimiterStats};
pub use config::{
	ErrorResponse, ErrorResponseConfig, GeoConfig, GeoSettings, LimiterSettings, RateLimitConfig,
};
pub use effect::{device_adjust, geo_penalty, score, Score};
pub use error::{RejectAction, RejectHandler, RejectPolicy, RejectReason, Rejection};
pub use extractors::{client_address, extract_client_ip, user_agent, ClientAddrMode, UNKNOWN_ADDRESS};
pub use fingerprint::{AddressShape, Fingerprint, FingerprintBuilder, OsFamily};
pub use limiter::{is_local_address, ClientRequest, RateLimiter, RateLimiterBuilder, Verdict};
pub use middleware::{
	install, DeviceCaptureLayer, DeviceCaptureService, RateLimitLayer, RateLimitService,
};
pub use store::{SweepReport, WindowStore};

// vim: ts=4
