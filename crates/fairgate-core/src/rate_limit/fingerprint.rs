//! Fingerprint Builder
//!
//! A fingerprint groups requests for accounting. It is made of the client's
//! address with its most specific part dropped, the operating system family
//! guessed from the user agent and, when known, the device class.

use regex::Regex;

use crate::prelude::*;

/// Operating system family inferred from a user agent
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OsFamily {
	Linux,
	Windows,
	Apple,
	ChromeOs,
	Android,
	Ios,
	Other,
}

impl OsFamily {
	pub fn as_str(&self) -> &'static str {
		match self {
			OsFamily::Linux => "linux",
			OsFamily::Windows => "windows",
			OsFamily::Apple => "apple",
			OsFamily::ChromeOs => "chrome",
			OsFamily::Android => "android",
			OsFamily::Ios => "ios",
			OsFamily::Other => "other",
		}
	}

	/// Initial effect adjustment for this family
	pub fn effect_delta(&self, strict: f64, passive: f64) -> f64 {
		match self {
			OsFamily::Linux => 2.0 * strict,
			OsFamily::ChromeOs => -passive,
			OsFamily::Android | OsFamily::Ios => -2.0 * passive,
			OsFamily::Windows | OsFamily::Apple | OsFamily::Other => 0.0,
		}
	}
}

impl std::fmt::Display for OsFamily {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Shape of the client address string
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressShape {
	/// Contains `::`
	Ipv6,
	/// Four dot separated numeric octets
	Ipv4,
	/// Anything else, used verbatim
	Other,
}

impl AddressShape {
	pub fn of(address: &str) -> Self {
		if address.contains("::") {
			AddressShape::Ipv6
		} else if is_ipv4_shaped(address) {
			AddressShape::Ipv4
		} else {
			AddressShape::Other
		}
	}

	/// Fixed cost added after clamping
	pub fn surcharge(&self) -> f64 {
		match self {
			AddressShape::Ipv6 => 0.0,
			AddressShape::Ipv4 => 1.0,
			AddressShape::Other => 2.0,
		}
	}
}

fn is_ipv4_shaped(address: &str) -> bool {
	let parts: Vec<&str> = address.split('.').collect();
	parts.len() == 4
		&& parts.iter().all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
}

/// Whole-word patterns in priority order; the first match wins
const OS_PATTERNS: [(OsFamily, &str); 6] = [
	(OsFamily::Linux, r"(?i)\blinux\b"),
	(OsFamily::Windows, r"(?i)\bwindows\b"),
	(OsFamily::Apple, r"(?i)\b(apple|mac)\b"),
	(OsFamily::ChromeOs, r"(?i)\bchrom(e|ium)\s*os\b"),
	(OsFamily::Android, r"(?i)\bandroid\b"),
	(OsFamily::Ios, r"(?i)\bios\b"),
];

/// A request's fingerprint
#[derive(Clone, Debug, PartialEq)]
pub struct Fingerprint {
	pub key: Box<str>,
	pub os: OsFamily,
	/// OS based effect adjustment, already scaled by strict/passive
	pub os_delta: f64,
	pub shape: AddressShape,
}

pub struct FingerprintBuilder {
	os_patterns: Vec<(OsFamily, Regex)>,
	strict: f64,
	passive: f64,
}

impl FingerprintBuilder {
	pub fn new(strict: f64, passive: f64) -> FgResult<Self> {
		let os_patterns = OS_PATTERNS
			.iter()
			.map(|(os, pattern)| {
				Regex::new(pattern)
					.map(|re| (*os, re))
					.map_err(|e| Error::Config(format!("os pattern compilation failed: {}", e)))
			})
			.collect::<FgResult<Vec<_>>>()?;
		Ok(Self { os_patterns, strict, passive })
	}

	pub fn detect_os(&self, user_agent: &str) -> OsFamily {
		self.os_patterns
			.iter()
			.find(|(_, re)| re.is_match(user_agent))
			.map_or(OsFamily::Other, |(os, _)| *os)
	}

	/// Build the fingerprint for a cleaned client address
	pub fn build(&self, address: &str, user_agent: &str, device: Option<&DeviceInfo>) -> Fingerprint {
		let os = self.detect_os(user_agent);
		let shape = AddressShape::of(address);

		let key = match shape {
			AddressShape::Ipv6 => {
				let prefix = address.split("::").next().unwrap_or_default();
				let mut key = format!("{}::{}", prefix, os);
				if let Some(device) = device {
					key.push_str(&format!(":{}:{}", device.kind, device.name));
				}
				key
			}
			AddressShape::Ipv4 => {
				let network = address.rsplit_once('.').map_or(address, |(network, _)| network);
				let mut key = format!("{}:{}", network, os);
				if let Some(device) = device {
					key.push_str(&format!(":{}", device.kind));
				}
				key
			}
			AddressShape::Other => address.to_string(),
		};

		Fingerprint { key: key.into(), os, os_delta: os.effect_delta(self.strict, self.passive), shape }
	}
}


// vim: ts=4
