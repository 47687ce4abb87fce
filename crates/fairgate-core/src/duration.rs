//! Duration Parser
//!
//! Converts human readable durations (`"30s"`, `"1h"`, `"2D"`, `"250ms"`) into
//! milliseconds. Months, years, decades and centuries use fixed approximations,
//! not calendar arithmetic.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const MS_PER_SECOND: f64 = 1_000.0;
const MS_PER_MINUTE: f64 = 60_000.0;
const MS_PER_HOUR: f64 = 3_600_000.0;
const MS_PER_DAY: f64 = 86_400_000.0;
const MS_PER_MONTH: f64 = 2_628_000_000.0;
const MS_PER_YEAR: f64 = 31_536_000_000.0;
const MS_PER_DECADE: f64 = 315_360_000_000.0;
const MS_PER_CENTURY: f64 = 3_153_600_000_000.0;

/// Unit suffixes, checked in order. Multi-letter suffixes come before the
/// single letters they end with.
const UNITS: [(&str, f64); 13] = [
	("ms", 1.0),
	("us", 0.001),
	("mic", 0.001),
	("ns", 0.000_001),
	("DE", MS_PER_DECADE),
	("CE", MS_PER_CENTURY),
	("h", MS_PER_HOUR),
	("m", MS_PER_MINUTE),
	("s", MS_PER_SECOND),
	("D", MS_PER_DAY),
	("M", MS_PER_MONTH),
	("Y", MS_PER_YEAR),
	("C", MS_PER_CENTURY),
];

/// A configured duration: either plain milliseconds or a suffixed string
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
	Millis(f64),
	Text(String),
}

impl DurationValue {
	pub fn to_millis(&self) -> Option<f64> {
		match self {
			DurationValue::Millis(ms) => Some(*ms).filter(|ms| !ms.is_nan()),
			DurationValue::Text(text) => parse_duration_millis(text),
		}
	}

	/// Convert to a [`Duration`]. Fails for unparseable, non-finite or
	/// non-positive values.
	pub fn to_duration(&self) -> Option<Duration> {
		let ms = self.to_millis()?;
		if !ms.is_finite() || ms <= 0.0 {
			return None;
		}
		Duration::try_from_secs_f64(ms / MS_PER_SECOND).ok()
	}
}

impl From<&str> for DurationValue {
	fn from(text: &str) -> Self {
		DurationValue::Text(text.to_string())
	}
}

impl From<f64> for DurationValue {
	fn from(ms: f64) -> Self {
		DurationValue::Millis(ms)
	}
}

/// Parse a suffixed duration string into milliseconds.
///
/// Returns `None` for empty input or when no number can be extracted.
pub fn parse_duration_millis(text: &str) -> Option<f64> {
	let text = text.trim();
	if text.is_empty() {
		return None;
	}

	let factor = UNITS
		.iter()
		.find(|(suffix, _)| text.ends_with(suffix))
		.map_or(1.0, |(_, factor)| *factor); // bare numbers are milliseconds

	extract_number(text).map(|n| n * factor)
}

/// Keep digits and dots, then read at most one fractional part
fn extract_number(text: &str) -> Option<f64> {
	let kept: String = text.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
	let mut parts = kept.split('.');
	let whole = parts.next().unwrap_or_default();
	let number = match parts.next() {
		Some(frac) => format!("{}.{}", whole, frac),
		None => whole.to_string(),
	};
	if !number.bytes().any(|b| b.is_ascii_digit()) {
		return None;
	}
	number.parse::<f64>().ok()
}


// vim: ts=4
