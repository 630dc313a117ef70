// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! A provider that prints every delivered call as a JSON line.

use std::io::{self, Write};

use async_trait::async_trait;
use loom_beacon_core::{
	Call, ErrorCapability, ErrorReport, InitOptions, Properties, Provider, ProviderError,
	ProviderInit, Result, TraitsCapability,
};
use parking_lot::Mutex;
use tracing::debug;

pub struct StdoutProvider {
	out: Mutex<Box<dyn Write + Send>>,
	user_id: Mutex<Option<String>>,
}

impl StdoutProvider {
	pub fn stdout() -> Self {
		Self::with_writer(Box::new(io::stdout()))
	}

	pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
		Self {
			out: Mutex::new(out),
			user_id: Mutex::new(None),
		}
	}

	fn write(&self, operation: &'static str, call: &Call) -> Result<()> {
		let line = serde_json::to_string(call)
			.map_err(|e| ProviderError::rejected(operation, e.to_string()))?;
		let mut out = self.out.lock();
		writeln!(out, "{line}")
			.and_then(|()| out.flush())
			.map_err(|e| ProviderError::rejected(operation, e.to_string()))
	}
}

impl Provider for StdoutProvider {
	fn pageview(&self, path: Option<&str>) -> Result<()> {
		self.write(
			"pageview",
			&Call::Pageview {
				path: path.map(str::to_string),
			},
		)
	}

	fn event(&self, name: &str, properties: Option<&Properties>) -> Result<()> {
		self.write(
			"event",
			&Call::Event {
				name: name.to_string(),
				properties: properties.cloned(),
			},
		)
	}

	fn track_outbound(&self, url: &str, text: Option<&str>, target: Option<&str>) -> Result<()> {
		self.write(
			"trackOutbound",
			&Call::TrackOutbound {
				url: url.to_string(),
				text: text.map(str::to_string),
				target: target.map(str::to_string),
			},
		)
	}

	fn identify(&self, user_id: &str, traits: Option<&Properties>) -> Result<()> {
		*self.user_id.lock() = Some(user_id.to_string());
		self.write(
			"identify",
			&Call::Identify {
				user_id: user_id.to_string(),
				traits: traits.cloned(),
			},
		)
	}

	fn clear_user_id(&self) -> Result<()> {
		*self.user_id.lock() = None;
		Ok(())
	}

	fn user_id(&self) -> Option<String> {
		self.user_id.lock().clone()
	}

	fn traits(&self) -> Option<&dyn TraitsCapability> {
		Some(self)
	}

	fn error_reporting(&self) -> Option<&dyn ErrorCapability> {
		Some(self)
	}

	fn initializer(&self) -> Option<&dyn ProviderInit> {
		Some(self)
	}
}

impl TraitsCapability for StdoutProvider {
	fn set_traits(&self, traits: &Properties) -> Result<()> {
		self.write(
			"setTraits",
			&Call::SetTraits {
				traits: traits.clone(),
			},
		)
	}
}

impl ErrorCapability for StdoutProvider {
	fn error(&self, error: &ErrorReport, context: Option<&Properties>) -> Result<()> {
		self.write(
			"error",
			&Call::TrackError {
				error: error.clone(),
				context: context.cloned(),
			},
		)
	}
}

#[async_trait]
impl ProviderInit for StdoutProvider {
	async fn init(&self, options: InitOptions) -> Result<()> {
		debug!(
			analytics_host = %options.analytics_host,
			site_id = %options.site_id,
			"Stdout provider initialized"
		);
		Ok(())
	}
}
