//! Rate Limiting Configuration
//!
//! [`RateLimitConfig`] is the raw record as it arrives from a config file: every
//! field optional, numbers unchecked. [`RateLimitConfig::resolve`] applies the
//! defaults and produces the immutable [`LimiterSettings`] the limiter runs on.

use std::time::Duration;

use axum::http::StatusCode;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

use crate::duration::{parse_duration_millis, DurationValue};
use crate::prelude::*;

pub const DEFAULT_LIMIT: f64 = 100.0;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
pub const DEFAULT_KICK_TIME: Duration = Duration::from_secs(3600);
pub const DEFAULT_EFFECT: f64 = 5.0;
pub const DEFAULT_MIN_EFFECT: f64 = 1.0;
pub const DEFAULT_STRICT: f64 = 1.0;
pub const DEFAULT_PASSIVE: f64 = 1.0;
pub const DEFAULT_GEO_STRICT: f64 = 1.0;
pub const DEFAULT_REJECT_MESSAGE: &str = "Too Many Requests";

/// Raw limiter configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimitConfig {
	/// Base budget, multiplied by `def_effect`
	#[serde(deserialize_with = "lenient_number")]
	pub limit: Option<f64>,
	/// Window reset interval
	#[serde(deserialize_with = "lenient")]
	pub time: Option<DurationValue>,
	/// Ban duration once the budget is exceeded
	#[serde(alias = "kick_time", deserialize_with = "lenient")]
	pub kick_time: Option<DurationValue>,
	/// Baseline cost per request
	#[serde(alias = "def_effect", deserialize_with = "lenient_number")]
	pub def_effect: Option<f64>,
	#[serde(alias = "min_effect", deserialize_with = "lenient_number")]
	pub min_effect: Option<f64>,
	/// Defaults to `limit / 20`
	#[serde(alias = "max_effect", deserialize_with = "lenient_number")]
	pub max_effect: Option<f64>,
	/// Multiplier for OS based penalties
	#[serde(deserialize_with = "lenient_number")]
	pub strict: Option<f64>,
	/// Multiplier for OS and device based discounts
	#[serde(deserialize_with = "lenient_number")]
	pub passive: Option<f64>,
	/// Ignored unless it is a mapping
	#[serde(deserialize_with = "lenient")]
	pub geo: Option<GeoConfig>,
	/// Ignored unless it is a mapping
	#[serde(deserialize_with = "lenient")]
	pub err: Option<ErrorResponseConfig>,
}

/// Permitted geography. Absent dimensions are not checked.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
	pub country: Option<Vec<Box<str>>>,
	pub region: Option<Vec<Box<str>>>,
	pub city: Option<Vec<Box<str>>>,
	pub timezone: Option<Vec<Box<str>>>,
	/// Inclusive (low, high) range the location's range must overlap
	pub range: Option<(f64, f64)>,
	pub area: Option<Vec<u32>>,
	pub metro: Option<Vec<u32>>,
	/// Severity multiplier for geo penalties
	#[serde(deserialize_with = "lenient_number")]
	pub strict: Option<f64>,
}

/// Custom status and message for rejections
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorResponseConfig {
	#[serde(deserialize_with = "lenient")]
	pub status: Option<u16>,
	#[serde(deserialize_with = "lenient")]
	pub msg: Option<String>,
}

/// A value of the expected shape, or anything else
#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient<T> {
	Value(T),
	Other(IgnoredAny),
}

/// Deserialize `T`, turning a value of the wrong shape into `None`
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
	D: Deserializer<'de>,
	T: Deserialize<'de>,
{
	Ok(match Lenient::<T>::deserialize(deserializer)? {
		Lenient::Value(value) => Some(value),
		Lenient::Other(_) => None,
	})
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberLike {
	Number(f64),
	Text(String),
	Other(IgnoredAny),
}

/// A number or a numeric string; anything else is `None`
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(match NumberLike::deserialize(deserializer)? {
		NumberLike::Number(n) => Some(n),
		NumberLike::Text(text) => text.trim().parse().ok(),
		NumberLike::Other(_) => None,
	})
}

/// Resolved geo settings
#[derive(Clone, Debug, PartialEq)]
pub struct GeoSettings {
	pub allow: GeoConfig,
	pub strict: f64,
}

/// Resolved rejection response
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorResponse {
	pub status: StatusCode,
	pub message: Box<str>,
}

impl Default for ErrorResponse {
	fn default() -> Self {
		Self { status: StatusCode::TOO_MANY_REQUESTS, message: DEFAULT_REJECT_MESSAGE.into() }
	}
}

/// Validated limiter settings
#[derive(Clone, Debug, PartialEq)]
pub struct LimiterSettings {
	pub limit: f64,
	/// Effective budget: `limit * def_effect`
	pub budget: f64,
	pub window: Duration,
	pub kick_time: Duration,
	pub def_effect: f64,
	pub min_effect: f64,
	pub max_effect: f64,
	pub strict: f64,
	pub passive: f64,
	pub geo: Option<GeoSettings>,
	pub error_response: Option<ErrorResponse>,
}

impl Default for LimiterSettings {
	fn default() -> Self {
		// Defaults always resolve
		let limit = DEFAULT_LIMIT;
		Self {
			limit,
			budget: limit * DEFAULT_EFFECT,
			window: DEFAULT_WINDOW,
			kick_time: DEFAULT_KICK_TIME,
			def_effect: DEFAULT_EFFECT,
			min_effect: DEFAULT_MIN_EFFECT,
			max_effect: (limit / 20.0).max(DEFAULT_MIN_EFFECT),
			strict: DEFAULT_STRICT,
			passive: DEFAULT_PASSIVE,
			geo: None,
			error_response: None,
		}
	}
}

/// Use `value` if it is a finite number of at least 1
fn positive(value: Option<f64>, default: f64) -> f64 {
	value.filter(|v| v.is_finite() && *v >= 1.0).unwrap_or(default)
}

/// Resolve a configured duration.
///
/// Zero, negative and blank values fall back to `default`. Text that has no
/// number in it is an error.
fn duration(name: &str, value: Option<&DurationValue>, default: Duration) -> FgResult<Duration> {
	let millis = match value {
		None => return Ok(default),
		Some(DurationValue::Millis(ms)) => *ms,
		Some(DurationValue::Text(text)) if text.trim().is_empty() => return Ok(default),
		Some(DurationValue::Text(text)) => parse_duration_millis(text)
			.ok_or_else(|| Error::Config(format!("{}: invalid duration {:?}", name, text)))?,
	};
	Ok(DurationValue::Millis(millis).to_duration().unwrap_or(default))
}

impl RateLimitConfig {
	/// Apply defaults and validate.
	///
	/// Invalid numbers and empty durations fall back to their defaults; a
	/// duration string that cannot be parsed is an error.
	pub fn resolve(&self) -> FgResult<LimiterSettings> {
		let limit = positive(self.limit, DEFAULT_LIMIT);
		let def_effect = positive(self.def_effect, DEFAULT_EFFECT);
		let min_effect = positive(self.min_effect, DEFAULT_MIN_EFFECT);
		let max_effect = positive(self.max_effect, limit / 20.0).max(min_effect);

		let geo = self.geo.as_ref().map(|geo| GeoSettings {
			allow: geo.clone(),
			strict: geo.strict.filter(|s| s.is_finite() && *s > 0.0).unwrap_or(DEFAULT_GEO_STRICT),
		});

		let error_response = self.err.as_ref().map(|err| ErrorResponse {
			status: err
				.status
				.and_then(|s| StatusCode::from_u16(s).ok())
				.unwrap_or(StatusCode::TOO_MANY_REQUESTS),
			message: err
				.msg
				.as_deref()
				.filter(|m| !m.is_empty())
				.unwrap_or(DEFAULT_REJECT_MESSAGE)
				.into(),
		});

		Ok(LimiterSettings {
			limit,
			budget: limit * def_effect,
			window: duration("time", self.time.as_ref(), DEFAULT_WINDOW)?,
			kick_time: duration("kickTime", self.kick_time.as_ref(), DEFAULT_KICK_TIME)?,
			def_effect,
			min_effect,
			max_effect,
			strict: positive(self.strict, DEFAULT_STRICT),
			passive: positive(self.passive, DEFAULT_PASSIVE),
			geo,
			error_response,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let settings = RateLimitConfig::default().resolve().unwrap();
		assert_eq!(settings, LimiterSettings::default());
		assert_eq!(settings.budget, 500.0);
		assert_eq!(settings.max_effect, 5.0);
		assert_eq!(settings.window, Duration::from_secs(60));
		assert_eq!(settings.kick_time, Duration::from_secs(3600));
	}

	#[test]
	fn test_invalid_numbers_fall_back() {
		let config = RateLimitConfig {
			limit: Some(0.0),
			def_effect: Some(-3.0),
			min_effect: Some(f64::NAN),
			strict: Some(0.5),
			passive: Some(f64::INFINITY),
			..RateLimitConfig::default()
		};
		let settings = config.resolve().unwrap();
		assert_eq!(settings.limit, DEFAULT_LIMIT);
		assert_eq!(settings.def_effect, DEFAULT_EFFECT);
		assert_eq!(settings.min_effect, DEFAULT_MIN_EFFECT);
		assert_eq!(settings.strict, DEFAULT_STRICT);
		assert_eq!(settings.passive, DEFAULT_PASSIVE);
	}

	#[test]
	fn test_max_effect_never_below_min() {
		// limit / 20 = 0.5 would put the ceiling under the floor
		let config = RateLimitConfig { limit: Some(10.0), ..RateLimitConfig::default() };
		let settings = config.resolve().unwrap();
		assert_eq!(settings.budget, 50.0);
		assert_eq!(settings.max_effect, 1.0);
		assert!(settings.min_effect <= settings.max_effect);

		let config = RateLimitConfig {
			min_effect: Some(4.0),
			max_effect: Some(2.0),
			..RateLimitConfig::default()
		};
		let settings = config.resolve().unwrap();
		assert_eq!((settings.min_effect, settings.max_effect), (4.0, 4.0));
	}

	#[test]
	fn test_durations() {
		let config = RateLimitConfig {
			time: Some("30s".into()),
			kick_time: Some(DurationValue::Millis(1500.0)),
			..RateLimitConfig::default()
		};
		let settings = config.resolve().unwrap();
		assert_eq!(settings.window, Duration::from_secs(30));
		assert_eq!(settings.kick_time, Duration::from_millis(1500));
	}

	#[test]
	fn test_unparseable_duration_is_fatal() {
		let config = RateLimitConfig { time: Some("soon".into()), ..RateLimitConfig::default() };
		assert!(matches!(config.resolve(), Err(Error::Config(_))));
	}

	#[test]
	fn test_empty_durations_fall_back() {
		let config = RateLimitConfig {
			time: Some(DurationValue::Millis(0.0)),
			kick_time: Some("".into()),
			..RateLimitConfig::default()
		};
		let settings = config.resolve().unwrap();
		assert_eq!(settings.window, DEFAULT_WINDOW);
		assert_eq!(settings.kick_time, DEFAULT_KICK_TIME);

		let config = RateLimitConfig {
			time: Some(DurationValue::Millis(-5.0)),
			kick_time: Some("0s".into()),
			..RateLimitConfig::default()
		};
		let settings = config.resolve().unwrap();
		assert_eq!(settings.window, DEFAULT_WINDOW);
		assert_eq!(settings.kick_time, DEFAULT_KICK_TIME);
	}

	#[test]
	fn test_wrong_shapes_fall_back() {
		let config: RateLimitConfig = serde_json::from_value(serde_json::json!({
			"limit": "50",
			"defEffect": " 2 ",
			"strict": "lots",
			"passive": [1],
			"time": true,
			"kickTime": { "hours": 1 },
			"geo": "US",
			"err": 503
		}))
		.unwrap();
		assert_eq!(config.limit, Some(50.0));
		assert!(config.geo.is_none());
		assert!(config.err.is_none());

		let settings = config.resolve().unwrap();
		assert_eq!(settings.limit, 50.0);
		assert_eq!(settings.budget, 100.0);
		assert_eq!(settings.strict, DEFAULT_STRICT);
		assert_eq!(settings.passive, DEFAULT_PASSIVE);
		assert_eq!(settings.window, DEFAULT_WINDOW);
		assert_eq!(settings.kick_time, DEFAULT_KICK_TIME);
		assert_eq!(settings.geo, None);
		assert_eq!(settings.error_response, None);
	}

	#[test]
	fn test_wrong_shapes_inside_err_fall_back() {
		let config: RateLimitConfig = serde_json::from_str(
			r#"{"limit": "20", "time": "", "geo": null, "err": {"status": "teapot", "msg": 7}}"#,
		)
		.unwrap();
		let settings = config.resolve().unwrap();
		assert_eq!(settings.limit, 20.0);
		assert_eq!(settings.window, DEFAULT_WINDOW);
		assert_eq!(settings.geo, None);
		assert_eq!(settings.error_response, Some(ErrorResponse::default()));
	}

	#[test]
	fn test_geo_and_err() {
		let config: RateLimitConfig = serde_json::from_value(serde_json::json!({
			"limit": 10,
			"kickTime": "2h",
			"defEffect": 5,
			"geo": { "country": ["US"], "strict": 2 },
			"err": { "status": 503, "msg": "Slow down" }
		}))
		.unwrap();
		let settings = config.resolve().unwrap();
		assert_eq!(settings.kick_time, Duration::from_secs(7200));
		let geo = settings.geo.unwrap();
		assert_eq!(geo.strict, 2.0);
		assert_eq!(geo.allow.country, Some(vec!["US".into()]));
		assert_eq!(
			settings.error_response,
			Some(ErrorResponse { status: StatusCode::SERVICE_UNAVAILABLE, message: "Slow down".into() })
		);
	}

	#[test]
	fn test_err_defaults() {
		let config: RateLimitConfig =
			serde_json::from_value(serde_json::json!({ "err": { "status": 42 }, "geo": {} })).unwrap();
		let settings = config.resolve().unwrap();
		assert_eq!(settings.error_response, Some(ErrorResponse::default()));
		assert_eq!(settings.geo.map(|g| g.strict), Some(DEFAULT_GEO_STRICT));
	}

	#[test]
	fn test_snake_case_aliases() {
		let config: RateLimitConfig =
			serde_json::from_value(serde_json::json!({ "def_effect": 3, "max_effect": 9 })).unwrap();
		let settings = config.resolve().unwrap();
		assert_eq!(settings.def_effect, 3.0);
		assert_eq!(settings.max_effect, 9.0);
	}
}

// vim: ts=4
