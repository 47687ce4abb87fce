//! Rate Limiter
//!
//! Per-request evaluation: fingerprint the client, score the request, charge
//! the score against the fingerprint's budget and ban it once the budget is
//! exceeded. Costs are forgotten on every window sweep; bans outlive sweeps
//! until they run out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use fairgate_types::capability::{DeviceClassifier, GeoLookup};
use fairgate_types::types::SystemClock;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::api::{BanEntry, RateLimitApi, RateLimiterStats};
use super::config::{LimiterSettings, RateLimitConfig};
use super::effect::{self, Score};
use super::error::{RejectHandler, RejectPolicy, RejectReason, Rejection};
use super::fingerprint::{Fingerprint, FingerprintBuilder};
use super::store::{SweepReport, WindowStore};
use crate::prelude::*;

/// Addresses that are never accounted
const LOCAL_ADDRESSES: [&str; 3] = ["localhost", "127.0.0.1", "::1"];

/// Shortest sweep interval the sweeper accepts
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

pub fn is_local_address(address: &str) -> bool {
	LOCAL_ADDRESSES.contains(&address)
}

/// What the limiter needs to know about a request
#[derive(Clone, Debug, Default)]
pub struct ClientRequest<'a> {
	/// Cleaned client address
	pub address: &'a str,
	pub user_agent: &'a str,
	/// Device class supplied by an upstream stage
	pub device: Option<&'a DeviceInfo>,
}

/// Outcome of evaluating one request
#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
	/// Local request, nothing was recorded
	Bypass,
	Allow { key: Box<str>, effect: f64, total: f64 },
	Reject(RejectReason),
}

impl Verdict {
	pub fn is_allowed(&self) -> bool {
		!matches!(self, Verdict::Reject(_))
	}
}

/// Builder for [`RateLimiter`]
#[derive(Default)]
pub struct RateLimiterBuilder {
	config: RateLimitConfig,
	geo: Capability<dyn GeoLookup>,
	device: Capability<dyn DeviceClassifier>,
	clock: Option<Arc<dyn Clock>>,
	reject_handler: Option<Arc<dyn RejectHandler>>,
}

impl RateLimiterBuilder {
	pub fn config(mut self, config: RateLimitConfig) -> Self {
		self.config = config;
		self
	}

	pub fn geo(mut self, geo: Arc<dyn GeoLookup>) -> Self {
		self.geo = Capability::Available(geo);
		self
	}

	/// Classifier used when a request carries no device info
	pub fn device_classifier(mut self, classifier: Arc<dyn DeviceClassifier>) -> Self {
		self.device = Capability::Available(classifier);
		self
	}

	pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = Some(clock);
		self
	}

	pub fn reject_handler(mut self, handler: Arc<dyn RejectHandler>) -> Self {
		self.reject_handler = Some(handler);
		self
	}

	pub fn build(self) -> FgResult<RateLimiter> {
		let settings = self.config.resolve()?;
		let fingerprints = FingerprintBuilder::new(settings.strict, settings.passive)?;

		let reject_policy = match (self.reject_handler, settings.error_response.as_ref()) {
			(Some(handler), _) => RejectPolicy::Handler(handler),
			(None, Some(custom)) => RejectPolicy::Custom(custom.clone()),
			(None, None) => RejectPolicy::Default,
		};

		info!(
			"Rate limiter ready: budget {} per {:?}, kick time {:?}, effect {}..{}",
			settings.budget, settings.window, settings.kick_time, settings.min_effect, settings.max_effect
		);

		Ok(RateLimiter {
			settings,
			fingerprints,
			geo: self.geo,
			device: self.device,
			clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
			reject_policy,
			store: Mutex::new(WindowStore::new()),
			total_requests: AtomicU64::new(0),
			total_bypassed: AtomicU64::new(0),
			total_rejected: AtomicU64::new(0),
			total_overridden: AtomicU64::new(0),
			total_bans: AtomicU64::new(0),
			total_sweeps: AtomicU64::new(0),
		})
	}
}

/// Weighted request rate limiter
pub struct RateLimiter {
	settings: LimiterSettings,
	fingerprints: FingerprintBuilder,
	geo: Capability<dyn GeoLookup>,
	device: Capability<dyn DeviceClassifier>,
	clock: Arc<dyn Clock>,
	reject_policy: RejectPolicy,
	/// Costs and bans, one lock for the whole check-accumulate-ban sequence
	store: Mutex<WindowStore>,
	total_requests: AtomicU64,
	total_bypassed: AtomicU64,
	total_rejected: AtomicU64,
	total_overridden: AtomicU64,
	total_bans: AtomicU64,
	total_sweeps: AtomicU64,
}

impl std::fmt::Debug for RateLimiter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RateLimiter")
			.field("settings", &self.settings)
			.field("geo", &self.geo.is_available())
			.field("device", &self.device.is_available())
			.field("reject_policy", &self.reject_policy)
			.finish_non_exhaustive()
	}
}

impl RateLimiter {
	pub fn builder() -> RateLimiterBuilder {
		RateLimiterBuilder::default()
	}

	/// Limiter with the given configuration and no optional capabilities
	pub fn new(config: RateLimitConfig) -> FgResult<Self> {
		Self::builder().config(config).build()
	}

	pub fn settings(&self) -> &LimiterSettings {
		&self.settings
	}

	pub fn reject_policy(&self) -> &RejectPolicy {
		&self.reject_policy
	}

	/// Count a rejection that the reject handler let through
	pub fn record_override(&self) {
		self.total_overridden.fetch_add(1, Ordering::Relaxed);
	}

	pub fn device_classifier(&self) -> Option<Arc<dyn DeviceClassifier>> {
		match &self.device {
			Capability::Available(classifier) => Some(classifier.clone()),
			Capability::Unavailable => None,
		}
	}

	pub fn now(&self) -> Timestamp {
		self.clock.now()
	}

	/// Device info from the request, or from the classifier if one is set
	fn device_for(&self, request: &ClientRequest<'_>) -> Option<DeviceInfo> {
		request
			.device
			.cloned()
			.or_else(|| self.device.get().map(|c| c.classify(request.user_agent)))
	}

	/// Fingerprint and score a request without recording anything
	pub fn assess(&self, request: &ClientRequest<'_>) -> (Fingerprint, Score) {
		let device = self.device_for(request);
		let fingerprint =
			self.fingerprints.build(request.address, request.user_agent, device.as_ref());
		let score = effect::score(
			&self.settings,
			&fingerprint,
			device.as_ref(),
			self.geo.get(),
			request.address,
		);
		(fingerprint, score)
	}

	/// Evaluate one request and record its cost
	pub fn evaluate(&self, request: &ClientRequest<'_>) -> Verdict {
		self.total_requests.fetch_add(1, Ordering::Relaxed);

		if is_local_address(request.address) {
			self.total_bypassed.fetch_add(1, Ordering::Relaxed);
			return Verdict::Bypass;
		}

		let (fingerprint, score) = self.assess(request);
		let key = fingerprint.key;
		let effect = score.effect();
		let now = self.clock.now();

		let mut store = self.store.lock();

		if let Some(until) = store.active_ban(&key, now) {
			drop(store);
			self.total_rejected.fetch_add(1, Ordering::Relaxed);
			debug!("Rejected {} ({}): banned until {}", request.address, key, until);
			return Verdict::Reject(RejectReason::Banned { key, until });
		}

		let total = store.accumulate(&key, effect);
		if total > self.settings.budget {
			let until = now.add_duration(self.settings.kick_time);
			store.ban(&key, until);
			drop(store);

			self.total_rejected.fetch_add(1, Ordering::Relaxed);
			self.total_bans.fetch_add(1, Ordering::Relaxed);
			warn!(
				"Banned {} ({}) until {}: cost {} exceeds budget {}",
				request.address, key, until, total, self.settings.budget
			);
			return Verdict::Reject(RejectReason::BudgetExceeded { key, total, until });
		}
		drop(store);

		debug!("Allowed {} ({}): effect {}, total {}", request.address, key, effect, total);
		Verdict::Allow { key, effect, total }
	}

	/// Default or configured rejection response for a reason
	pub fn rejection(&self, reason: &RejectReason) -> Rejection {
		let retry_after = reason.until().remaining_from(self.clock.now());
		match &self.reject_policy {
			RejectPolicy::Custom(custom) => Rejection::new(custom, retry_after),
			RejectPolicy::Default | RejectPolicy::Handler(_) => {
				Rejection { retry_after, ..Rejection::default() }
			}
		}
	}

	/// Start a new window: forget all costs and drop bans that have run out
	pub fn sweep(&self) -> SweepReport {
		let now = self.clock.now();
		let report = self.store.lock().sweep(now);
		self.total_sweeps.fetch_add(1, Ordering::Relaxed);
		debug!(
			"Window sweep: {} costs cleared, {} bans expired",
			report.costs_cleared, report.bans_expired
		);
		report
	}

	/// Run [`sweep`](Self::sweep) every window on the tokio runtime.
	///
	/// The task holds only a weak reference and ends once the limiter is
	/// dropped. Abort the returned handle to stop it earlier.
	pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
		let period = self.settings.window.max(MIN_SWEEP_INTERVAL);
		let weak: Weak<Self> = Arc::downgrade(self);

		tokio::spawn(async move {
			let start = tokio::time::Instant::now() + period;
			let mut interval = tokio::time::interval_at(start, period);
			loop {
				interval.tick().await;
				let Some(limiter) = weak.upgrade() else {
					debug!("Rate limiter dropped, sweeper exiting");
					break;
				};
				limiter.sweep();
			}
		})
	}
}

impl RateLimitApi for RateLimiter {
	fn cost(&self, key: &str) -> f64 {
		self.store.lock().cost(key)
	}

	fn ban_expiry(&self, key: &str) -> Option<Timestamp> {
		self.store.lock().ban_expiry(key)
	}

	fn is_banned(&self, key: &str) -> bool {
		let now = self.clock.now();
		self.store.lock().active_ban(key, now).is_some()
	}

	fn ban(&self, key: &str, duration: Duration) -> FgResult<()> {
		if key.is_empty() {
			return Err(Error::Parse("empty fingerprint key".into()));
		}
		let until = self.clock.now().add_duration(duration);
		self.store.lock().ban(key, until);
		self.total_bans.fetch_add(1, Ordering::Relaxed);
		info!("Banned {} until {}", key, until);
		Ok(())
	}

	fn unban(&self, key: &str) -> FgResult<()> {
		if self.store.lock().unban(key) {
			info!("Unbanned {}", key);
		}
		Ok(())
	}

	fn reset(&self, key: &str) -> FgResult<()> {
		self.store.lock().reset(key);
		debug!("Reset {}", key);
		Ok(())
	}

	fn list_bans(&self) -> Vec<BanEntry> {
		let now = self.clock.now();
		let mut bans: Vec<BanEntry> = self
			.store
			.lock()
			.bans()
			.filter(|(_, until)| now < *until)
			.map(|(key, until)| BanEntry { key: key.into(), expires_at: until })
			.collect();
		bans.sort_by(|a, b| a.key.cmp(&b.key));
		bans
	}

	fn stats(&self) -> RateLimiterStats {
		let now = self.clock.now();
		let store = self.store.lock();

		RateLimiterStats {
			tracked_fingerprints: store.tracked(),
			active_bans: store.active_bans(now),
			total_requests: self.total_requests.load(Ordering::Relaxed),
			total_bypassed: self.total_bypassed.load(Ordering::Relaxed),
			total_rejected: self.total_rejected.load(Ordering::Relaxed),
			total_overridden: self.total_overridden.load(Ordering::Relaxed),
			total_bans_issued: self.total_bans.load(Ordering::Relaxed),
			total_sweeps: self.total_sweeps.load(Ordering::Relaxed),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::duration::DurationValue;
	use crate::rate_limit::config::GeoConfig;
	use fairgate_types::capability::StaticGeoLookup;
	use fairgate_types::types::ManualClock;

	const LINUX_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0";

	/// Budget 50, window 60s, kick 1h; a Linux IPv6 client costs 7
	fn small_config() -> RateLimitConfig {
		RateLimitConfig {
			limit: Some(10.0),
			time: Some(DurationValue::from("60s")),
			kick_time: Some(DurationValue::from("1h")),
			max_effect: Some(10.0),
			..RateLimitConfig::default()
		}
	}

	fn limiter_with_clock(config: RateLimitConfig) -> (RateLimiter, Arc<ManualClock>) {
		let clock = Arc::new(ManualClock::new(Timestamp(1_700_000_000_000)));
		let limiter = RateLimiter::builder().config(config).clock(clock.clone()).build().unwrap();
		(limiter, clock)
	}

	fn request(address: &str) -> ClientRequest<'_> {
		ClientRequest { address, user_agent: LINUX_UA, device: None }
	}

	#[test]
	fn test_budget_exceeded_then_banned() {
		let (limiter, clock) = limiter_with_clock(small_config());
		let req = request("2001:db8::1");

		for n in 1..=7 {
			match limiter.evaluate(&req) {
				Verdict::Allow { key, effect, total } => {
					assert_eq!(&*key, "2001:db8::linux");
					assert_eq!(effect, 7.0);
					assert_eq!(total, 7.0 * f64::from(n));
				}
				other => panic!("request {} should pass: {:?}", n, other),
			}
		}

		let Verdict::Reject(RejectReason::BudgetExceeded { total, until, .. }) = limiter.evaluate(&req)
		else {
			panic!("8th request should exceed the budget");
		};
		assert_eq!(total, 56.0);
		assert_eq!(until, clock.now().add_duration(Duration::from_secs(3600)));

		// Banned requests do not accumulate
		clock.advance(Duration::from_secs(10));
		assert!(matches!(limiter.evaluate(&req), Verdict::Reject(RejectReason::Banned { .. })));
		assert_eq!(limiter.cost("2001:db8::linux"), 56.0);
		assert!(limiter.is_banned("2001:db8::linux"));
	}

	#[test]
	fn test_sub_millisecond_kick_time_still_bans() {
		let config = RateLimitConfig { kick_time: Some(DurationValue::from("500us")), ..small_config() };
		let (limiter, clock) = limiter_with_clock(config);
		let req = request("2001:db8::1");
		for _ in 0..7 {
			assert!(limiter.evaluate(&req).is_allowed());
		}

		let Verdict::Reject(RejectReason::BudgetExceeded { until, .. }) = limiter.evaluate(&req) else {
			panic!("8th request should exceed the budget");
		};
		assert_eq!(until, clock.now().add_duration(Duration::from_millis(1)));
		assert!(limiter.is_banned("2001:db8::linux"));
		assert!(matches!(limiter.evaluate(&req), Verdict::Reject(RejectReason::Banned { .. })));

		clock.advance(Duration::from_millis(1));
		assert!(!limiter.is_banned("2001:db8::linux"));
	}

	#[test]
	fn test_ban_survives_sweep_until_expiry() {
		let (limiter, clock) = limiter_with_clock(small_config());
		let req = request("2001:db8::1");
		for _ in 0..8 {
			limiter.evaluate(&req);
		}

		clock.advance(Duration::from_secs(60));
		limiter.sweep();
		assert_eq!(limiter.cost("2001:db8::linux"), 0.0);
		assert!(matches!(limiter.evaluate(&req), Verdict::Reject(RejectReason::Banned { .. })));

		// Ban is over, the lapsed record waits for the next sweep
		clock.advance(Duration::from_secs(3600));
		assert!(!limiter.is_banned("2001:db8::linux"));
		assert!(limiter.ban_expiry("2001:db8::linux").is_some());
		assert!(limiter.evaluate(&req).is_allowed());

		let report = limiter.sweep();
		assert_eq!(report.bans_expired, 1);
		assert_eq!(limiter.ban_expiry("2001:db8::linux"), None);
	}

	#[test]
	fn test_local_addresses_bypass() {
		let (limiter, _clock) = limiter_with_clock(small_config());
		for address in ["localhost", "127.0.0.1", "::1"] {
			for _ in 0..100 {
				assert_eq!(limiter.evaluate(&request(address)), Verdict::Bypass);
			}
		}
		let stats = limiter.stats();
		assert_eq!(stats.tracked_fingerprints, 0);
		assert_eq!(stats.total_bypassed, 300);
		assert_eq!(stats.total_rejected, 0);
	}

	#[test]
	fn test_cost_is_monotonic_within_window() {
		let (limiter, _clock) = limiter_with_clock(RateLimitConfig::default());
		let mut last = 0.0;
		for ua in [LINUX_UA, "", "Windows NT 10.0", "iPhone OS", "Android", "CrOS x86_64"] {
			limiter.evaluate(&ClientRequest { address: "198.51.100.20", user_agent: ua, device: None });
			let cost = limiter.cost("198.51.100:linux");
			assert!(cost >= last);
			last = cost;
		}
		assert!(limiter.evaluate(&request("198.51.100.20")).is_allowed());
		assert!(limiter.cost("198.51.100:linux") > last);
	}

	#[test]
	fn test_clients_share_subnet_bucket() {
		let (limiter, _clock) = limiter_with_clock(small_config());
		limiter.evaluate(&request("203.0.113.45"));
		limiter.evaluate(&request("203.0.113.46"));
		// Linux costs 7, plus 1 for IPv4
		assert_eq!(limiter.cost("203.0.113:linux"), 16.0);
	}

	#[test]
	fn test_device_from_request_and_classifier() {
		let tv = DeviceInfo::new(DeviceKind::Tv, "roku");
		let (limiter, _clock) = limiter_with_clock(small_config());
		let verdict = limiter.evaluate(&ClientRequest {
			address: "2001:db8::1",
			user_agent: LINUX_UA,
			device: Some(&tv),
		});
		let Verdict::Allow { key, effect, .. } = verdict else {
			panic!("tv request should pass");
		};
		assert_eq!(&*key, "2001:db8::linux:tv:roku");
		assert_eq!(effect, 5.0);

		let clock = Arc::new(ManualClock::new(Timestamp(0)));
		let limiter = RateLimiter::builder()
			.config(small_config())
			.clock(clock)
			.device_classifier(Arc::new(crate::device::UaDeviceClassifier::new().unwrap()))
			.build()
			.unwrap();
		let Verdict::Allow { key, .. } = limiter.evaluate(&request("2001:db8::1")) else {
			panic!("desktop request should pass");
		};
		assert_eq!(&*key, "2001:db8::linux:desktop:");
	}

	#[test]
	fn test_geo_penalty_applies() {
		let config = RateLimitConfig {
			geo: Some(GeoConfig { country: Some(vec!["US".into()]), ..GeoConfig::default() }),
			..small_config()
		};
		let lookup = StaticGeoLookup::new().with_entry(
			"2001:db8::9",
			GeoLocation { country: "FR".into(), ..GeoLocation::default() },
		);
		let limiter = RateLimiter::builder()
			.config(config)
			.geo(Arc::new(lookup))
			.clock(Arc::new(ManualClock::new(Timestamp(0))))
			.build()
			.unwrap();
		let Verdict::Allow { effect, .. } = limiter.evaluate(&request("2001:db8::9")) else {
			panic!("first request should pass");
		};
		// 7, plus 4 for the country, clamped to 10
		assert_eq!(effect, 10.0);
	}

	#[test]
	fn test_manual_ban_api() {
		let (limiter, clock) = limiter_with_clock(small_config());
		limiter.ban("203.0.113:linux", Duration::from_secs(30)).unwrap();
		assert!(limiter.ban("", Duration::from_secs(30)).is_err());

		assert!(matches!(
			limiter.evaluate(&request("203.0.113.1")),
			Verdict::Reject(RejectReason::Banned { .. })
		));
		let bans = limiter.list_bans();
		assert_eq!(bans.len(), 1);
		assert_eq!(&*bans[0].key, "203.0.113:linux");

		limiter.unban("203.0.113:linux").unwrap();
		assert!(limiter.evaluate(&request("203.0.113.1")).is_allowed());

		limiter.reset("203.0.113:linux").unwrap();
		assert_eq!(limiter.cost("203.0.113:linux"), 0.0);

		limiter.ban("203.0.113:linux", Duration::from_secs(30)).unwrap();
		clock.advance(Duration::from_secs(31));
		assert!(limiter.list_bans().is_empty());
		assert_eq!(limiter.stats().total_bans_issued, 2);
	}

	#[test]
	fn test_rejection_retry_after() {
		let (limiter, clock) = limiter_with_clock(small_config());
		let until = clock.now().add_duration(Duration::from_secs(90));
		let rejection =
			limiter.rejection(&RejectReason::Banned { key: "k".into(), until });
		assert_eq!(rejection.retry_after, Some(Duration::from_secs(90)));
		assert_eq!(rejection.message.as_ref(), "Too Many Requests");
	}

	#[test]
	fn test_invalid_duration_fails_build() {
		let config =
			RateLimitConfig { time: Some(DurationValue::from("soon")), ..RateLimitConfig::default() };
		assert!(matches!(RateLimiter::new(config), Err(Error::Config(_))));
	}

	#[tokio::test(start_paused = true)]
	async fn test_sweeper_clears_window() {
		let clock = Arc::new(ManualClock::new(Timestamp(0)));
		let limiter = Arc::new(
			RateLimiter::builder().config(small_config()).clock(clock).build().unwrap(),
		);
		let handle = limiter.spawn_sweeper();

		limiter.evaluate(&request("2001:db8::1"));
		assert_eq!(limiter.cost("2001:db8::linux"), 7.0);

		tokio::time::sleep(Duration::from_secs(30)).await;
		assert_eq!(limiter.cost("2001:db8::linux"), 7.0);

		tokio::time::sleep(Duration::from_secs(31)).await;
		assert_eq!(limiter.cost("2001:db8::linux"), 0.0);
		assert_eq!(limiter.stats().total_sweeps, 1);

		drop(limiter);
		tokio::time::sleep(Duration::from_secs(61)).await;
		assert!(handle.is_finished());
	}
}

// vim: ts=4
