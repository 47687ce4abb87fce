//! User-agent device classifier
//!
//! A small heuristic [`DeviceClassifier`] for hosts that have no dedicated
//! device detection library. Categories are checked from most to least
//! specific: bot, car, tv, tablet, phone, then desktop.

use regex::Regex;

use fairgate_types::capability::DeviceClassifier;

use crate::prelude::*;

/// `bot` only as a word of its own or as a product token (`Googlebot/2.1`)
const BOT_PATTERN: &str = r"(?i)(\b[a-z]*bot/|\bbot\b|crawler|crawling|spider|slurp|facebookexternalhit|bingpreview|mediapartners|curl|wget)";
const CAR_PATTERN: &str = r"(?i)\b(tesla|carplay|android auto|qtcarbrowser)\b";
const TV_PATTERN: &str =
	r"(?i)\b(smart-?tv|googletv|appletv|hbbtv|crkey|roku|netcast|bravia|web0s)\b";
const TABLET_PATTERN: &str = r"(?i)\b(ipad|tablet|kindle|silk|playbook)\b";
const PHONE_PATTERN: &str =
	r"(?i)\b(iphone|ipod|windows phone|blackberry|opera mini|mobile)\b";
const ANDROID_PATTERN: &str = r"(?i)\bandroid\b";

pub struct UaDeviceClassifier {
	bot: Regex,
	car: Regex,
	tv: Regex,
	tablet: Regex,
	phone: Regex,
	android: Regex,
}

fn compile(pattern: &str) -> FgResult<Regex> {
	Regex::new(pattern)
		.map_err(|e| Error::Config(format!("device pattern compilation failed: {}", e)))
}

impl UaDeviceClassifier {
	pub fn new() -> FgResult<Self> {
		Ok(Self {
			bot: compile(BOT_PATTERN)?,
			car: compile(CAR_PATTERN)?,
			tv: compile(TV_PATTERN)?,
			tablet: compile(TABLET_PATTERN)?,
			phone: compile(PHONE_PATTERN)?,
			android: compile(ANDROID_PATTERN)?,
		})
	}

	fn matched(re: &Regex, user_agent: &str) -> Option<Box<str>> {
		re.find(user_agent).map(|m| m.as_str().trim_end_matches('/').to_lowercase().into())
	}
}

impl DeviceClassifier for UaDeviceClassifier {
	fn classify(&self, user_agent: &str) -> DeviceInfo {
		if user_agent.trim().is_empty() {
			// Clients that hide their user agent are treated like scripts
			return DeviceInfo::new(DeviceKind::Bot, "");
		}
		if let Some(name) = Self::matched(&self.bot, user_agent) {
			return DeviceInfo::new(DeviceKind::Bot, name);
		}
		if let Some(name) = Self::matched(&self.car, user_agent) {
			return DeviceInfo::new(DeviceKind::Car, name);
		}
		if let Some(name) = Self::matched(&self.tv, user_agent) {
			return DeviceInfo::new(DeviceKind::Tv, name);
		}
		if let Some(name) = Self::matched(&self.tablet, user_agent) {
			return DeviceInfo::new(DeviceKind::Tablet, name);
		}
		let android = self.android.is_match(user_agent);
		if let Some(name) = Self::matched(&self.phone, user_agent) {
			let name = if android { "android".into() } else { name };
			return DeviceInfo::new(DeviceKind::Phone, name);
		}
		if android {
			// Android without the "Mobile" token is a tablet
			return DeviceInfo::new(DeviceKind::Tablet, "android");
		}
		DeviceInfo::new(DeviceKind::Desktop, "")
	}
}


// vim: ts=4
