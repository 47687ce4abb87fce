//! Optional capabilities
//!
//! Device classification and geo-IP lookup are supplied by the host. Each one is
//! wrapped in a [`Capability`] so the limiter can branch on whether it was
//! provided at all.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// An injected capability that may be absent
pub enum Capability<T: ?Sized> {
	Available(Arc<T>),
	Unavailable,
}

impl<T: ?Sized> Capability<T> {
	pub fn get(&self) -> Option<&T> {
		match self {
			Capability::Available(inner) => Some(inner.as_ref()),
			Capability::Unavailable => None,
		}
	}

	pub fn is_available(&self) -> bool {
		matches!(self, Capability::Available(_))
	}
}

impl<T: ?Sized> Clone for Capability<T> {
	fn clone(&self) -> Self {
		match self {
			Capability::Available(inner) => Capability::Available(inner.clone()),
			Capability::Unavailable => Capability::Unavailable,
		}
	}
}

impl<T: ?Sized> Default for Capability<T> {
	fn default() -> Self {
		Capability::Unavailable
	}
}

impl<T: ?Sized> From<Option<Arc<T>>> for Capability<T> {
	fn from(inner: Option<Arc<T>>) -> Self {
		inner.map_or(Capability::Unavailable, Capability::Available)
	}
}

impl<T: ?Sized> std::fmt::Debug for Capability<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Capability::Available(_) => write!(f, "Available"),
			Capability::Unavailable => write!(f, "Unavailable"),
		}
	}
}

// Device classification
//***********************

/// Device class reported by a classifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
	Desktop,
	Tablet,
	Phone,
	Tv,
	Car,
	Bot,
}

impl DeviceKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			DeviceKind::Desktop => "desktop",
			DeviceKind::Tablet => "tablet",
			DeviceKind::Phone => "phone",
			DeviceKind::Tv => "tv",
			DeviceKind::Car => "car",
			DeviceKind::Bot => "bot",
		}
	}
}

impl std::fmt::Display for DeviceKind {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Result of classifying a client's device
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
	pub kind: DeviceKind,
	/// Free-form device name, may be empty
	pub name: Box<str>,
}

impl DeviceInfo {
	pub fn new(kind: DeviceKind, name: impl Into<Box<str>>) -> Self {
		Self { kind, name: name.into() }
	}
}

pub trait DeviceClassifier: Send + Sync {
	fn classify(&self, user_agent: &str) -> DeviceInfo;
}

// Geo lookup
//************

/// Location resolved for a network address
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
	pub country: Box<str>,
	pub region: Box<str>,
	pub city: Box<str>,
	pub timezone: Box<str>,
	/// Numeric range the address block covers (low, high)
	pub range: (f64, f64),
	/// Accuracy area code
	pub area: u32,
	/// Metro code
	pub metro: u32,
}

pub trait GeoLookup: Send + Sync {
	fn lookup(&self, address: &str) -> Option<GeoLocation>;
}

/// Geo lookup backed by a fixed address table
#[derive(Debug, Default)]
pub struct StaticGeoLookup {
	entries: HashMap<Box<str>, GeoLocation>,
}

impl StaticGeoLookup {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_entry(mut self, address: impl Into<Box<str>>, location: GeoLocation) -> Self {
		self.entries.insert(address.into(), location);
		self
	}
}

impl GeoLookup for StaticGeoLookup {
	fn lookup(&self, address: &str) -> Option<GeoLocation> {
		self.entries.get(address).cloned()
	}
}


// vim: ts=4
