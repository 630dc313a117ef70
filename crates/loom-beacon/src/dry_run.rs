// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Logging-only provider installed when `dry_run` is configured.

use loom_beacon_core::{
	Cleanup, ErrorCapability, ErrorReport, PageChangeCallback, PageChanges, Properties, Provider,
	Result, SessionReplay, TraitsCapability, Unsubscribe,
};
use tracing::{debug, info};

/// A provider whose every operation only logs.
///
/// Read accessors return stable empty values: no user id, replay inactive.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunProvider {
	verbose: bool,
}

impl DryRunProvider {
	/// `verbose` promotes the dry-run log lines from debug to info.
	pub fn new(verbose: bool) -> Self {
		Self { verbose }
	}

	fn record(&self, operation: &'static str, detail: &str) {
		if self.verbose {
			info!(operation, detail, "[dry-run]");
		} else {
			debug!(operation, detail, "[dry-run]");
		}
	}
}

fn describe(properties: Option<&Properties>) -> String {
	properties
		.map(|p| p.clone().into_value().to_string())
		.unwrap_or_default()
}

impl Provider for DryRunProvider {
	fn pageview(&self, path: Option<&str>) -> Result<()> {
		self.record("pageview", path.unwrap_or_default());
		Ok(())
	}

	fn event(&self, name: &str, properties: Option<&Properties>) -> Result<()> {
		self.record("event", &format!("{name} {}", describe(properties)));
		Ok(())
	}

	fn track_outbound(&self, url: &str, _text: Option<&str>, _target: Option<&str>) -> Result<()> {
		self.record("outbound", url);
		Ok(())
	}

	fn identify(&self, user_id: &str, _traits: Option<&Properties>) -> Result<()> {
		self.record("identify", user_id);
		Ok(())
	}

	fn clear_user_id(&self) -> Result<()> {
		self.record("clearUserId", "");
		Ok(())
	}

	fn user_id(&self) -> Option<String> {
		None
	}

	fn traits(&self) -> Option<&dyn TraitsCapability> {
		Some(self)
	}

	fn error_reporting(&self) -> Option<&dyn ErrorCapability> {
		Some(self)
	}

	fn session_replay(&self) -> Option<&dyn SessionReplay> {
		Some(self)
	}

	fn page_changes(&self) -> Option<&dyn PageChanges> {
		Some(self)
	}

	fn cleanup_hook(&self) -> Option<&dyn Cleanup> {
		Some(self)
	}
}

impl TraitsCapability for DryRunProvider {
	fn set_traits(&self, traits: &Properties) -> Result<()> {
		self.record("setTraits", &describe(Some(traits)));
		Ok(())
	}
}

impl ErrorCapability for DryRunProvider {
	fn error(&self, error: &ErrorReport, _context: Option<&Properties>) -> Result<()> {
		self.record("error", error.message.as_deref().unwrap_or(&error.kind));
		Ok(())
	}
}

impl SessionReplay for DryRunProvider {
	fn start(&self) -> Result<()> {
		self.record("startReplay", "");
		Ok(())
	}

	fn stop(&self) -> Result<()> {
		self.record("stopReplay", "");
		Ok(())
	}

	fn is_active(&self) -> bool {
		false
	}
}

impl PageChanges for DryRunProvider {
	fn on_page_change(&self, _callback: PageChangeCallback) -> Unsubscribe {
		self.record("onPageChange", "");
		Unsubscribe::noop()
	}
}

impl Cleanup for DryRunProvider {
	fn cleanup(&self) {
		self.record("cleanup", "");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use loom_beacon_core::{satisfies_contract, Capability};

	#[test]
	fn test_satisfies_full_contract() {
		let provider = DryRunProvider::new(true);
		assert!(satisfies_contract(&provider));

		let caps = provider.capabilities();
		for cap in [
			Capability::SetTraits,
			Capability::Error,
			Capability::SessionReplay,
			Capability::PageChange,
			Capability::Cleanup,
		] {
			assert!(caps.contains(&cap), "missing {cap:?}");
		}
	}

	#[test]
	fn test_read_accessors_are_stable_empty_values() {
		let provider = DryRunProvider::default();
		assert_eq!(provider.user_id(), None);
		provider.identify("user_1", None).unwrap();
		assert_eq!(provider.user_id(), None);
		assert!(!provider.session_replay().unwrap().is_active());
		provider.session_replay().unwrap().start().unwrap();
		assert!(!provider.session_replay().unwrap().is_active());
	}

	#[test]
	fn test_every_operation_succeeds() {
		let provider = DryRunProvider::default();
		let props = Properties::new().insert("k", "v");
		assert!(provider.pageview(Some("/x")).is_ok());
		assert!(provider.event("e", Some(&props)).is_ok());
		assert!(provider.track_outbound("https://x", None, None).is_ok());
		assert!(provider.clear_user_id().is_ok());
		assert!(provider.traits().unwrap().set_traits(&props).is_ok());
		assert!(provider
			.error_reporting()
			.unwrap()
			.error(&ErrorReport::new("boom"), None)
			.is_ok());
		provider
			.page_changes()
			.unwrap()
			.on_page_change(Box::new(|_: &str, _: &str| {}))
			.unsubscribe();
		provider.cleanup_hook().unwrap().cleanup();
	}
}
