//! Server configuration
//!
//! Read from the YAML file named by `FAIRGATE_CONFIG`, then overridden by
//! `FAIRGATE_LISTEN` and `FAIRGATE_MODE`.

use std::path::Path;

use fairgate_core::rate_limit::{ClientAddrMode, RateLimitConfig};
use fairgate_types::prelude::*;
use serde::Deserialize;

pub const ENV_CONFIG: &str = "FAIRGATE_CONFIG";
pub const ENV_LISTEN: &str = "FAIRGATE_LISTEN";
pub const ENV_MODE: &str = "FAIRGATE_MODE";
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
	pub listen: Box<str>,
	/// Where client addresses come from
	pub mode: ClientAddrMode,
	/// Classify devices from the user agent
	#[serde(alias = "classify_devices")]
	pub classify_devices: bool,
	#[serde(alias = "rate_limit")]
	pub rate_limit: RateLimitConfig,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			listen: DEFAULT_LISTEN.into(),
			mode: ClientAddrMode::Standalone,
			classify_devices: true,
			rate_limit: RateLimitConfig::default(),
		}
	}
}

impl ServerConfig {
	pub fn from_yaml(text: &str) -> FgResult<Self> {
		serde_yaml::from_str(text).map_err(|e| Error::Config(format!("invalid config: {}", e)))
	}

	pub fn from_file(path: &Path) -> FgResult<Self> {
		let text = std::fs::read_to_string(path)?;
		Self::from_yaml(&text)
	}

	/// Apply overrides from `var`
	pub fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> FgResult<Self> {
		if let Some(listen) = var(ENV_LISTEN).filter(|l| !l.is_empty()) {
			self.listen = listen.into();
		}
		if let Some(mode) = var(ENV_MODE) {
			self.mode = match mode.to_ascii_lowercase().as_str() {
				"standalone" => ClientAddrMode::Standalone,
				"proxy" => ClientAddrMode::Proxy,
				other => return Err(Error::Config(format!("{}: unknown mode {:?}", ENV_MODE, other))),
			};
		}
		Ok(self)
	}

	/// Load from the process environment
	pub fn load() -> FgResult<Self> {
		let config = match std::env::var(ENV_CONFIG) {
			Ok(path) => Self::from_file(Path::new(&path))?,
			Err(_) => Self::default(),
		};
		config.with_overrides(|name| std::env::var(name).ok())
	}
}


// vim: ts=4
