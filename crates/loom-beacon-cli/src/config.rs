// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration loading for the command line driver.
//!
//! The TOML file is the base layer. Flags and their `LOOM_BEACON_*`
//! environment variables are applied on top.

use std::path::Path;

use anyhow::{Context, Result};
use loom_beacon_core::BeaconConfig;

/// Values that override the configuration file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
	pub host: Option<String>,
	pub site_id: Option<String>,
	pub debug: bool,
	pub dry_run: bool,
}

impl Overrides {
	pub fn apply(&self, mut config: BeaconConfig) -> BeaconConfig {
		if let Some(host) = &self.host {
			config.host = host.clone();
		}
		if let Some(site_id) = &self.site_id {
			config.site_id = site_id.clone();
		}
		// Flags can only switch these on.
		config.debug |= self.debug;
		config.dry_run |= self.dry_run;
		config
	}
}

/// Loads, overrides and validates a configuration file.
pub fn load_config(path: &Path, overrides: &Overrides) -> Result<BeaconConfig> {
	let config = BeaconConfig::load(path)
		.with_context(|| format!("failed to load config from {}", path.display()))?;
	let config = overrides.apply(config);
	config
		.validate()
		.with_context(|| format!("invalid config in {}", path.display()))?;
	Ok(config)
}
