//! Effect Scorer
//!
//! Computes the cost of a single request. The running effect starts at
//! `def_effect` and is adjusted, in order, by the OS delta, the device class
//! and the geo deviation. It is then clamped into `[min_effect, max_effect]`,
//! and finally the address-shape surcharge is added.

use fairgate_types::capability::GeoLookup;

use super::config::{GeoSettings, LimiterSettings};
use super::fingerprint::{Fingerprint, OsFamily};
use crate::prelude::*;

const BOT_MULTIPLIER: f64 = 1.2;
const GEO_UNKNOWN_WEIGHT: f64 = 2.0;
const GEO_COUNTRY_WEIGHT: f64 = 4.0;
const GEO_REGION_WEIGHT: f64 = 3.0;
const GEO_CITY_WEIGHT: f64 = 2.0;
const GEO_TIMEZONE_WEIGHT: f64 = 2.0;
const GEO_RANGE_WEIGHT: f64 = 1.0;
const GEO_AREA_WEIGHT: f64 = 0.5;
const GEO_METRO_WEIGHT: f64 = 0.5;

/// Cost of one request, with the intermediate values kept for inspection
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Score {
	/// After OS, device and geo adjustments
	pub raw: f64,
	/// `raw` clamped into `[min_effect, max_effect]`
	pub clamped: f64,
	pub surcharge: f64,
}

impl Score {
	/// The amount charged against the fingerprint's budget
	pub fn effect(&self) -> f64 {
		self.clamped + self.surcharge
	}
}

/// Device class adjustment. Bots only count as bots on a recognised OS.
pub fn device_adjust(effect: f64, os: OsFamily, device: &DeviceInfo, passive: f64) -> f64 {
	match device.kind {
		DeviceKind::Bot if os != OsFamily::Other => effect * BOT_MULTIPLIER,
		DeviceKind::Phone => effect - passive,
		DeviceKind::Tv => effect - 2.0 * passive,
		DeviceKind::Car => effect - 3.0 * passive,
		_ => effect,
	}
}

fn mismatch<T: PartialEq + ?Sized, U: AsRef<T>>(allow: Option<&Vec<U>>, value: &T) -> bool {
	allow.is_some_and(|allow| !allow.iter().any(|a| a.as_ref() == value))
}

/// Penalty for a resolved location, `None` meaning the lookup found nothing
pub fn geo_penalty(geo: &GeoSettings, location: Option<&GeoLocation>) -> f64 {
	let Some(loc) = location else {
		return GEO_UNKNOWN_WEIGHT * geo.strict;
	};
	let allow = &geo.allow;

	let mut weight = 0.0;
	if mismatch(allow.country.as_ref(), &*loc.country) {
		weight += GEO_COUNTRY_WEIGHT;
	}
	if mismatch(allow.region.as_ref(), &*loc.region) {
		weight += GEO_REGION_WEIGHT;
	}
	if mismatch(allow.city.as_ref(), &*loc.city) {
		weight += GEO_CITY_WEIGHT;
	}
	if mismatch(allow.timezone.as_ref(), &*loc.timezone) {
		weight += GEO_TIMEZONE_WEIGHT;
	}
	if let Some((low, high)) = allow.range {
		if loc.range.1 < low || loc.range.0 > high {
			weight += GEO_RANGE_WEIGHT;
		}
	}
	if allow.area.as_ref().is_some_and(|area| !area.contains(&loc.area)) {
		weight += GEO_AREA_WEIGHT;
	}
	if allow.metro.as_ref().is_some_and(|metro| !metro.contains(&loc.metro)) {
		weight += GEO_METRO_WEIGHT;
	}
	weight * geo.strict
}

/// Score a request
pub fn score(
	settings: &LimiterSettings,
	fingerprint: &Fingerprint,
	device: Option<&DeviceInfo>,
	geo: Option<&dyn GeoLookup>,
	address: &str,
) -> Score {
	let mut effect = settings.def_effect + fingerprint.os_delta;

	if let Some(device) = device {
		effect = device_adjust(effect, fingerprint.os, device, settings.passive);
	}

	effect = effect.max(1.0);

	if let (Some(lookup), Some(geo)) = (geo, settings.geo.as_ref()) {
		effect += geo_penalty(geo, lookup.lookup(address).as_ref());
	}

	let clamped = if effect < settings.min_effect {
		settings.min_effect
	} else if effect > settings.max_effect {
		settings.max_effect
	} else {
		effect
	};
	Score { raw: effect, clamped, surcharge: fingerprint.shape.surcharge() }
}


// vim: ts=4
