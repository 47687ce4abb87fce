//! Window & Ban Store
//!
//! Accumulated cost and ban expiry per fingerprint key. The store is a plain
//! owned value; the limiter wraps it in a single lock so every
//! read-modify-write sequence is serialized.

use std::collections::HashMap;

use crate::prelude::*;

/// Result of one sweep
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
	pub costs_cleared: usize,
	pub bans_expired: usize,
}

#[derive(Debug, Default)]
pub struct WindowStore {
	costs: HashMap<Box<str>, f64>,
	bans: HashMap<Box<str>, Timestamp>,
}

impl WindowStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Accumulated cost in the current window, 0 when absent
	pub fn cost(&self, key: &str) -> f64 {
		self.costs.get(key).copied().unwrap_or(0.0)
	}

	/// Add `effect` to the key's cost and return the new total.
	///
	/// Negative and NaN effects count as zero, and the total saturates at
	/// `f64::MAX`, so this never fails.
	pub fn accumulate(&mut self, key: &str, effect: f64) -> f64 {
		let effect = if effect.is_nan() { 0.0 } else { effect.max(0.0) };
		let total = self.costs.entry(key.into()).or_insert(0.0);
		*total = (*total + effect).min(f64::MAX);
		*total
	}

	pub fn ban_expiry(&self, key: &str) -> Option<Timestamp> {
		self.bans.get(key).copied()
	}

	/// Ban expiry if the ban is still running at `now`
	pub fn active_ban(&self, key: &str, now: Timestamp) -> Option<Timestamp> {
		self.ban_expiry(key).filter(|until| now < *until)
	}

	pub fn ban(&mut self, key: &str, until: Timestamp) {
		self.bans.insert(key.into(), until);
	}

	pub fn unban(&mut self, key: &str) -> bool {
		self.bans.remove(key).is_some()
	}

	/// Forget everything about a key
	pub fn reset(&mut self, key: &str) {
		self.costs.remove(key);
		self.bans.remove(key);
	}

	/// Window reset: drop every cost and the bans that have run out by `now`
	pub fn sweep(&mut self, now: Timestamp) -> SweepReport {
		let costs_cleared = self.costs.len();
		self.costs.clear();

		let before = self.bans.len();
		self.bans.retain(|_, until| now < *until);

		SweepReport { costs_cleared, bans_expired: before - self.bans.len() }
	}

	pub fn tracked(&self) -> usize {
		self.costs.len()
	}

	pub fn active_bans(&self, now: Timestamp) -> usize {
		self.bans.values().filter(|until| now < **until).count()
	}

	pub fn bans(&self) -> impl Iterator<Item = (&str, Timestamp)> {
		self.bans.iter().map(|(k, v)| (k.as_ref(), *v))
	}
}


// vim: ts=4
