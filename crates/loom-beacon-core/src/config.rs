// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Boot configuration for the beacon.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::properties::{GlobalProperties, PropertyValue};

/// Default time to wait for the provider to become available.
pub const DEFAULT_LOAD_TIMEOUT_MS: u64 = 5000;

/// Default selector used to find the server-rendered user identity.
pub const DEFAULT_IDENTITY_SELECTOR: &str = "[data-beacon-user-id]";

/// How the loader obtains the provider handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStrategy {
	/// Inject the provider script and wait for it to register.
	Script,
	/// Use an already registered provider and run its async init hook.
	Sdk,
	/// Use a registered provider if present, otherwise fall back to `Script`.
	#[default]
	Detect,
}

impl std::fmt::Display for LoadStrategy {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			LoadStrategy::Script => write!(f, "script"),
			LoadStrategy::Sdk => write!(f, "sdk"),
			LoadStrategy::Detect => write!(f, "detect"),
		}
	}
}

/// Configuration passed to `Beacon::boot`.
///
/// # Example
///
/// ```
/// use loom_beacon_core::{BeaconConfig, LoadStrategy};
///
/// let config = BeaconConfig::new("https://analytics.example.com", "site_123")
///     .with_load_strategy(LoadStrategy::Sdk)
///     .with_global_property("env", "prod");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeaconConfig {
	/// Base URL of the analytics instance.
	pub host: String,
	/// Site ID from the analytics dashboard.
	pub site_id: String,
	/// Verbose logging.
	pub debug: bool,
	/// Install a logging stub instead of a real provider.
	pub dry_run: bool,
	/// Ask the provider not to start session replay.
	pub disable_replay: bool,
	pub load_strategy: LoadStrategy,
	pub load_timeout_ms: u64,
	/// Identify the user from server-rendered markup at boot.
	pub auto_identify: bool,
	/// Enable delegated click tracking once ready.
	pub auto_track: bool,
	pub identity_selector: String,
	/// Forward data-layer pushes as events.
	pub gtm_bridge: bool,
	/// Allow-list for the data-layer bridge; empty allows everything.
	pub gtm_events: Vec<String>,
	/// Initial global properties merged into every event.
	pub global_properties: GlobalProperties,
}

impl Default for BeaconConfig {
	fn default() -> Self {
		Self {
			host: String::new(),
			site_id: String::new(),
			debug: false,
			dry_run: false,
			disable_replay: false,
			load_strategy: LoadStrategy::default(),
			load_timeout_ms: DEFAULT_LOAD_TIMEOUT_MS,
			auto_identify: true,
			auto_track: false,
			identity_selector: DEFAULT_IDENTITY_SELECTOR.to_string(),
			gtm_bridge: false,
			gtm_events: Vec::new(),
			global_properties: GlobalProperties::new(),
		}
	}
}

impl BeaconConfig {
	/// Creates a configuration with the two required fields and defaults elsewhere.
	pub fn new(host: impl Into<String>, site_id: impl Into<String>) -> Self {
		Self {
			host: host.into(),
			site_id: site_id.into(),
			..Self::default()
		}
	}

	pub fn with_debug(mut self, debug: bool) -> Self {
		self.debug = debug;
		self
	}

	pub fn with_dry_run(mut self, dry_run: bool) -> Self {
		self.dry_run = dry_run;
		self
	}

	pub fn with_disable_replay(mut self, disable: bool) -> Self {
		self.disable_replay = disable;
		self
	}

	pub fn with_load_strategy(mut self, strategy: LoadStrategy) -> Self {
		self.load_strategy = strategy;
		self
	}

	pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
		self.load_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
		self
	}

	pub fn with_auto_identify(mut self, enabled: bool) -> Self {
		self.auto_identify = enabled;
		self
	}

	pub fn with_auto_track(mut self, enabled: bool) -> Self {
		self.auto_track = enabled;
		self
	}

	pub fn with_identity_selector(mut self, selector: impl Into<String>) -> Self {
		self.identity_selector = selector.into();
		self
	}

	/// Enables the data-layer bridge with an optional allow-list.
	pub fn with_gtm_bridge<I, S>(mut self, allowed_events: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.gtm_bridge = true;
		self.gtm_events = allowed_events.into_iter().map(Into::into).collect();
		self
	}

	pub fn with_global_property(
		mut self,
		key: impl Into<String>,
		value: impl Into<PropertyValue>,
	) -> Self {
		self.global_properties.insert(key.into(), value.into());
		self
	}

	pub fn load_timeout(&self) -> Duration {
		Duration::from_millis(self.load_timeout_ms)
	}

	/// The host without a trailing slash.
	pub fn normalized_host(&self) -> &str {
		self.host.trim_end_matches('/')
	}

	/// URL of the provider script for the `Script` strategy.
	pub fn script_url(&self) -> String {
		format!("{}/api/script.js", self.normalized_host())
	}

	/// Analytics endpoint handed to the provider's init hook.
	pub fn analytics_host(&self) -> String {
		format!("{}/api", self.normalized_host())
	}

	/// Checks the required fields.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.host.trim().is_empty() {
			return Err(ConfigError::missing_field("host"));
		}
		if self.site_id.trim().is_empty() {
			return Err(ConfigError::missing_field("site_id"));
		}
		if self.identity_selector.trim().is_empty() {
			return Err(ConfigError::invalid_value(
				"identity_selector",
				"must not be empty",
			));
		}
		Ok(())
	}

	/// Parses a TOML document.
	pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
		toml::from_str(contents).map_err(|source| ConfigError::TomlParse {
			path: "<inline>".into(),
			source,
		})
	}

	/// Reads and parses a TOML file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let contents = std::fs::read_to_string(path)?;
		toml::from_str(&contents).map_err(|source| ConfigError::TomlParse {
			path: path.to_path_buf(),
			source,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_defaults() {
		let config = BeaconConfig::default();
		assert!(!config.debug);
		assert!(!config.dry_run);
		assert_eq!(config.load_strategy, LoadStrategy::Detect);
		assert_eq!(config.load_timeout(), Duration::from_millis(5000));
		assert!(config.auto_identify);
		assert!(!config.auto_track);
		assert_eq!(config.identity_selector, DEFAULT_IDENTITY_SELECTOR);
		assert!(!config.gtm_bridge);
		assert!(config.gtm_events.is_empty());
	}

	#[test]
	fn test_validate_requires_host() {
		let result = BeaconConfig::new("", "site").validate();
		assert!(matches!(result, Err(ConfigError::MissingField(ref f)) if f == "host"));
	}

	#[test]
	fn test_validate_requires_site_id() {
		let result = BeaconConfig::new("https://a.example.com", " ").validate();
		assert!(matches!(result, Err(ConfigError::MissingField(ref f)) if f == "site_id"));
	}

	#[test]
	fn test_urls_strip_trailing_slash() {
		let config = BeaconConfig::new("https://a.example.com/", "site");
		assert_eq!(config.script_url(), "https://a.example.com/api/script.js");
		assert_eq!(config.analytics_host(), "https://a.example.com/api");
	}

	#[test]
	fn test_from_toml_str() {
		let config = BeaconConfig::from_toml_str(
			r#"
host = "https://a.example.com"
site_id = "abc"
load_strategy = "sdk"
load_timeout_ms = 250
gtm_bridge = true
gtm_events = ["purchase"]

[global_properties]
site = "a"
version = 3
"#,
		)
		.unwrap();

		assert_eq!(config.load_strategy, LoadStrategy::Sdk);
		assert_eq!(config.load_timeout_ms, 250);
		assert!(config.auto_identify);
		assert_eq!(config.gtm_events, vec!["purchase".to_string()]);
		assert_eq!(
			config.global_properties["site"],
			PropertyValue::String("a".to_string())
		);
		assert_eq!(config.global_properties["version"], PropertyValue::Integer(3));
	}

	#[test]
	fn test_from_toml_str_rejects_unknown_strategy() {
		let result = BeaconConfig::from_toml_str("load_strategy = \"magic\"");
		assert!(matches!(result, Err(ConfigError::TomlParse { .. })));
	}

	#[test]
	fn test_load_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "host = \"https://a.example.com\"\nsite_id = \"abc\"\ndry_run = true").unwrap();

		let config = BeaconConfig::load(file.path()).unwrap();
		assert!(config.dry_run);
		assert_eq!(config.site_id, "abc");
	}

	#[test]
	fn test_load_missing_file_is_io_error() {
		let result = BeaconConfig::load("/nonexistent/beacon.toml");
		assert!(matches!(result, Err(ConfigError::Io(_))));
	}

	#[test]
	fn test_builder_setters() {
		let config = BeaconConfig::new("https://a.example.com", "abc")
			.with_load_timeout(Duration::from_millis(100))
			.with_gtm_bridge(["purchase", "signup"])
			.with_global_property("env", "prod");

		assert_eq!(config.load_timeout_ms, 100);
		assert!(config.gtm_bridge);
		assert_eq!(config.gtm_events.len(), 2);
		assert_eq!(config.global_properties.len(), 1);
	}
}
