//! Rate Limiting Internal API
//!
//! Traits and types for inspecting and managing limiter state by fingerprint
//! key.

use std::time::Duration;

use serde::Serialize;

use crate::prelude::*;

/// Ban entry as reported by [`RateLimitApi::list_bans`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BanEntry {
	pub key: Box<str>,
	pub expires_at: Timestamp,
}

/// Statistics about the rate limiter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimiterStats {
	/// Fingerprints with a cost in the current window
	pub tracked_fingerprints: usize,
	/// Bans that have not run out yet
	pub active_bans: usize,
	/// Requests evaluated, including bypassed ones
	pub total_requests: u64,
	/// Requests from local addresses that skipped accounting
	pub total_bypassed: u64,
	/// Requests the limiter rejected, including ones a handler let through
	pub total_rejected: u64,
	/// Rejections a reject handler turned into [`Continue`](super::error::RejectAction::Continue)
	pub total_overridden: u64,
	pub total_bans_issued: u64,
	pub total_sweeps: u64,
}

/// Internal API for programmatic rate limit management
pub trait RateLimitApi: Send + Sync {
	/// Accumulated cost of a fingerprint in the current window
	fn cost(&self, key: &str) -> f64;

	/// Recorded ban expiry, whether or not it has already passed
	fn ban_expiry(&self, key: &str) -> Option<Timestamp>;

	/// Check if a fingerprint is banned right now
	fn is_banned(&self, key: &str) -> bool;

	/// Ban a fingerprint for `duration` from now
	fn ban(&self, key: &str, duration: Duration) -> FgResult<()>;

	/// Lift a ban
	fn unban(&self, key: &str) -> FgResult<()>;

	/// Clear cost and ban for a fingerprint
	fn reset(&self, key: &str) -> FgResult<()>;

	/// List all currently running bans
	fn list_bans(&self) -> Vec<BanEntry>;

	fn stats(&self) -> RateLimiterStats;
}

// vim: ts=4
