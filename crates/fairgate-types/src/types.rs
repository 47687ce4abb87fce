//! Time primitives
//!
//! Ban expiries are wall-clock millisecond timestamps. The limiter reads the
//! current time through the [`Clock`] trait so tests can drive time by hand.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
	/// Current wall-clock time
	pub fn now() -> Timestamp {
		Timestamp(chrono::Utc::now().timestamp_millis())
	}

	/// Timestamp `duration` later, saturating at the representable maximum.
	/// Partial milliseconds round up, so a non-zero duration always moves the
	/// timestamp forward.
	pub fn add_duration(self, duration: Duration) -> Timestamp {
		let partial = u128::from(duration.subsec_nanos() % 1_000_000 > 0);
		let millis = i64::try_from(duration.as_millis() + partial).unwrap_or(i64::MAX);
		Timestamp(self.0.saturating_add(millis))
	}

	/// Time left until `self`, or `None` if it has already passed `now`
	pub fn remaining_from(self, now: Timestamp) -> Option<Duration> {
		let diff = self.0.checked_sub(now.0)?;
		u64::try_from(diff).ok().filter(|ms| *ms > 0).map(Duration::from_millis)
	}
}

impl std::fmt::Display for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match chrono::DateTime::from_timestamp_millis(self.0) {
			Some(dt) => write!(f, "{}", dt.to_rfc3339()),
			None => write!(f, "{}ms", self.0),
		}
	}
}

/// Source of the current time
pub trait Clock: Send + Sync {
	fn now(&self) -> Timestamp;
}

/// Wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> Timestamp {
		Timestamp::now()
	}
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
	millis: AtomicI64,
}

impl ManualClock {
	pub fn new(start: Timestamp) -> Self {
		Self { millis: AtomicI64::new(start.0) }
	}

	pub fn set(&self, ts: Timestamp) {
		self.millis.store(ts.0, Ordering::SeqCst);
	}

	pub fn advance(&self, duration: Duration) {
		let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
		self.millis.fetch_add(millis, Ordering::SeqCst);
	}
}

impl Clock for ManualClock {
	fn now(&self) -> Timestamp {
		Timestamp(self.millis.load(Ordering::SeqCst))
	}
}


// vim: ts=4
