// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provider acquisition.
//!
//! The beacon never constructs a real provider itself; it asks a [`Loader`].
//! [`DefaultLoader`] implements the three load strategies on top of two host
//! seams:
//!
//! - [`ProviderSlot`]: the well-known place where an externally loaded
//!   provider registers itself once its script has run.
//! - [`ScriptInjector`]: the host's ability to add a script tag and report
//!   whether it failed to load.
//!
//! ```text
//!  detect ──► slot has provider? ──yes──► use it
//!                 │no
//!                 ▼
//!  script ──► inject tag (unless present) ──► poll slot every 50ms
//!                                               ├─ provider appears ──► use it
//!                                               ├─ injector reports failure ──► ScriptFailed
//!                                               └─ load_timeout elapses ──► Timeout
//!
//!  sdk ────► slot provider with init() ──► init(options) within load_timeout
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use loom_beacon_core::{
	satisfies_contract, BeaconConfig, InitOptions, LoadError, LoadStrategy, Provider,
};
use parking_lot::RwLock;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Interval between checks of the provider slot while waiting for a script.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Resolves a provider handle for a boot attempt.
#[async_trait]
pub trait Loader: Send + Sync {
	async fn load(&self, config: &BeaconConfig) -> Result<Arc<dyn Provider>, LoadError>;
}

/// Where an externally loaded provider registers itself.
#[derive(Default)]
pub struct ProviderSlot {
	provider: RwLock<Option<Arc<dyn Provider>>>,
}

impl ProviderSlot {
	pub fn new() -> Self {
		Self::default()
	}

	/// Publishes a provider, replacing any previous one.
	pub fn register(&self, provider: Arc<dyn Provider>) {
		*self.provider.write() = Some(provider);
	}

	pub fn clear(&self) {
		*self.provider.write() = None;
	}

	pub fn is_occupied(&self) -> bool {
		self.provider.read().is_some()
	}

	/// Returns the registered provider if it exposes the required operations.
	pub fn detect(&self) -> Option<Arc<dyn Provider>> {
		let provider = self.provider.read().clone()?;
		if satisfies_contract(provider.as_ref()) {
			Some(provider)
		} else {
			debug!("Provider slot holds a handle missing required operations");
			None
		}
	}
}

/// A script tag the loader asks the host to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTag {
	pub src: String,
	pub is_async: bool,
	pub defer: bool,
	pub attributes: Vec<(String, String)>,
}

impl ScriptTag {
	/// Builds the provider script tag for `config`.
	pub fn for_config(config: &BeaconConfig) -> Self {
		let mut attributes = vec![("data-site-id".to_string(), config.site_id.clone())];
		if config.disable_replay {
			attributes.push(("data-disable-replay".to_string(), "true".to_string()));
		}
		Self {
			src: config.script_url(),
			is_async: true,
			defer: true,
			attributes,
		}
	}

	pub fn attribute(&self, name: &str) -> Option<&str> {
		self.attributes
			.iter()
			.find(|(key, _)| key == name)
			.map(|(_, value)| value.as_str())
	}
}

/// Host hook for inserting the provider script.
pub trait ScriptInjector: Send + Sync {
	/// True when a script with this source is already in the page.
	fn has_script(&self, src: &str) -> bool;

	fn inject(&self, tag: ScriptTag);

	/// True once the host has observed a load error for this source.
	fn load_failed(&self, src: &str) -> bool;
}

/// Strategy-driven loader over a [`ProviderSlot`] and optional [`ScriptInjector`].
pub struct DefaultLoader {
	slot: Arc<ProviderSlot>,
	injector: Option<Arc<dyn ScriptInjector>>,
	poll_interval: Duration,
}

impl DefaultLoader {
	pub fn new(slot: Arc<ProviderSlot>) -> Self {
		Self {
			slot,
			injector: None,
			poll_interval: DEFAULT_POLL_INTERVAL,
		}
	}

	pub fn with_injector(mut self, injector: Arc<dyn ScriptInjector>) -> Self {
		self.injector = Some(injector);
		self
	}

	pub fn with_poll_interval(mut self, interval: Duration) -> Self {
		self.poll_interval = interval.max(Duration::from_millis(1));
		self
	}

	pub fn slot(&self) -> &Arc<ProviderSlot> {
		&self.slot
	}

	async fn load_via_script(&self, config: &BeaconConfig) -> Result<Arc<dyn Provider>, LoadError> {
		let tag = ScriptTag::for_config(config);
		let src = tag.src.clone();
		let injector = self
			.injector
			.as_ref()
			.ok_or_else(|| LoadError::NoScriptHost { src: src.clone() })?;

		if injector.has_script(&src) {
			debug!(src = %src, "Provider script already present, waiting for initialization");
		} else {
			injector.inject(tag);
			debug!(src = %src, "Injected provider script");
		}

		let timeout = config.load_timeout();
		let deadline = Instant::now() + timeout;
		let mut ticker = tokio::time::interval(self.poll_interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			ticker.tick().await;

			if let Some(provider) = self.slot.detect() {
				return Ok(provider);
			}
			if injector.load_failed(&src) {
				return Err(LoadError::ScriptFailed { src });
			}
			if Instant::now() >= deadline {
				return Err(LoadError::Timeout {
					timeout_ms: config.load_timeout_ms,
				});
			}
		}
	}

	async fn load_via_sdk(&self, config: &BeaconConfig) -> Result<Arc<dyn Provider>, LoadError> {
		let provider = self.slot.detect().ok_or(LoadError::MissingInitHook)?;

		{
			let init = provider.initializer().ok_or(LoadError::MissingInitHook)?;
			let options = InitOptions {
				analytics_host: config.analytics_host(),
				site_id: config.site_id.clone(),
				debug: config.debug,
			};

			tokio::time::timeout(config.load_timeout(), init.init(options))
				.await
				.map_err(|_| LoadError::Timeout {
					timeout_ms: config.load_timeout_ms,
				})?
				.map_err(LoadError::InitFailed)?;
		}

		Ok(provider)
	}
}

#[async_trait]
impl Loader for DefaultLoader {
	async fn load(&self, config: &BeaconConfig) -> Result<Arc<dyn Provider>, LoadError> {
		let strategy = config.load_strategy;
		debug!(%strategy, "Resolving provider");

		match strategy {
			LoadStrategy::Detect => {
				if let Some(provider) = self.slot.detect() {
					info!("Using pre-registered provider");
					return Ok(provider);
				}
				debug!("No registered provider, falling back to script injection");
				self.load_via_script(config).await
			}
			LoadStrategy::Sdk => self.load_via_sdk(config).await,
			LoadStrategy::Script => {
				if let Some(provider) = self.slot.detect() {
					warn!("Provider already registered but strategy is 'script', using existing");
					return Ok(provider);
				}
				self.load_via_script(config).await
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::RecordingProvider;
	use loom_beacon_core::{ProviderError, ProviderInit};
	use parking_lot::Mutex;
	use std::sync::atomic::{AtomicBool, Ordering};

	/// Injector that registers a provider in the slot after a delay.
	struct FakeHost {
		slot: Arc<ProviderSlot>,
		injected: Mutex<Vec<ScriptTag>>,
		present: bool,
		fail: AtomicBool,
		provider_after: Option<Duration>,
	}

	impl FakeHost {
		fn new(slot: Arc<ProviderSlot>) -> Self {
			Self {
				slot,
				injected: Mutex::new(Vec::new()),
				present: false,
				fail: AtomicBool::new(false),
				provider_after: None,
			}
		}
	}

	impl ScriptInjector for FakeHost {
		fn has_script(&self, _src: &str) -> bool {
			self.present
		}

		fn inject(&self, tag: ScriptTag) {
			self.injected.lock().push(tag);
			if let Some(delay) = self.provider_after {
				let slot = Arc::clone(&self.slot);
				tokio::spawn(async move {
					tokio::time::sleep(delay).await;
					slot.register(Arc::new(RecordingProvider::new()));
				});
			}
		}

		fn load_failed(&self, _src: &str) -> bool {
			self.fail.load(Ordering::SeqCst)
		}
	}

	struct InitProvider {
		inner: RecordingProvider,
		delay: Duration,
		fail: bool,
		options: Mutex<Option<InitOptions>>,
	}

	impl InitProvider {
		fn new(delay: Duration, fail: bool) -> Self {
			Self {
				inner: RecordingProvider::new(),
				delay,
				fail,
				options: Mutex::new(None),
			}
		}
	}

	#[async_trait]
	impl ProviderInit for InitProvider {
		async fn init(&self, options: InitOptions) -> loom_beacon_core::Result<()> {
			*self.options.lock() = Some(options);
			tokio::time::sleep(self.delay).await;
			if self.fail {
				Err(ProviderError::rejected("init", "bad site"))
			} else {
				Ok(())
			}
		}
	}

	impl Provider for InitProvider {
		fn pageview(&self, path: Option<&str>) -> loom_beacon_core::Result<()> {
			self.inner.pageview(path)
		}
		fn event(&self, name: &str, properties: Option<&loom_beacon_core::Properties>) -> loom_beacon_core::Result<()> {
			self.inner.event(name, properties)
		}
		fn track_outbound(&self, url: &str, text: Option<&str>, target: Option<&str>) -> loom_beacon_core::Result<()> {
			self.inner.track_outbound(url, text, target)
		}
		fn identify(&self, user_id: &str, traits: Option<&loom_beacon_core::Properties>) -> loom_beacon_core::Result<()> {
			self.inner.identify(user_id, traits)
		}
		fn clear_user_id(&self) -> loom_beacon_core::Result<()> {
			self.inner.clear_user_id()
		}
		fn user_id(&self) -> Option<String> {
			self.inner.user_id()
		}
		fn initializer(&self) -> Option<&dyn ProviderInit> {
			Some(self)
		}
	}

	fn config(strategy: LoadStrategy) -> BeaconConfig {
		BeaconConfig::new("https://analytics.example.com/", "site_1")
			.with_load_strategy(strategy)
			.with_load_timeout(Duration::from_millis(200))
	}

	#[test]
	fn test_script_tag_for_config() {
		let tag = ScriptTag::for_config(&config(LoadStrategy::Script).with_disable_replay(true));
		assert_eq!(tag.src, "https://analytics.example.com/api/script.js");
		assert!(tag.is_async && tag.defer);
		assert_eq!(tag.attribute("data-site-id"), Some("site_1"));
		assert_eq!(tag.attribute("data-disable-replay"), Some("true"));
	}

	#[test]
	fn test_script_tag_omits_replay_attribute_by_default() {
		let tag = ScriptTag::for_config(&config(LoadStrategy::Script));
		assert_eq!(tag.attribute("data-disable-replay"), None);
	}

	#[test]
	fn test_slot_detect_empty() {
		assert!(ProviderSlot::new().detect().is_none());
	}

	#[tokio::test]
	async fn test_detect_uses_registered_provider() {
		let slot = Arc::new(ProviderSlot::new());
		slot.register(Arc::new(RecordingProvider::new()));
		let loader = DefaultLoader::new(Arc::clone(&slot));

		assert!(loader.load(&config(LoadStrategy::Detect)).await.is_ok());
	}

	#[tokio::test]
	async fn test_detect_without_host_fails() {
		let loader = DefaultLoader::new(Arc::new(ProviderSlot::new()));
		let result = loader.load(&config(LoadStrategy::Detect)).await;
		assert!(matches!(result, Err(LoadError::NoScriptHost { .. })));
	}

	#[tokio::test(start_paused = true)]
	async fn test_script_waits_for_provider_registration() {
		let slot = Arc::new(ProviderSlot::new());
		let mut host = FakeHost::new(Arc::clone(&slot));
		host.provider_after = Some(Duration::from_millis(120));
		let host = Arc::new(host);
		let loader = DefaultLoader::new(Arc::clone(&slot)).with_injector(host.clone());

		let result = loader.load(&config(LoadStrategy::Script)).await;

		assert!(result.is_ok());
		let injected = host.injected.lock();
		assert_eq!(injected.len(), 1);
		assert_eq!(injected[0].src, "https://analytics.example.com/api/script.js");
	}

	#[tokio::test(start_paused = true)]
	async fn test_script_times_out() {
		let slot = Arc::new(ProviderSlot::new());
		let host = Arc::new(FakeHost::new(Arc::clone(&slot)));
		let loader = DefaultLoader::new(slot).with_injector(host);

		let result = loader.load(&config(LoadStrategy::Script)).await;
		assert!(matches!(result, Err(LoadError::Timeout { timeout_ms: 200 })));
	}

	#[tokio::test(start_paused = true)]
	async fn test_script_load_error_fails_fast() {
		let slot = Arc::new(ProviderSlot::new());
		let host = Arc::new(FakeHost::new(Arc::clone(&slot)));
		host.fail.store(true, Ordering::SeqCst);
		let loader = DefaultLoader::new(slot).with_injector(host);

		let result = loader.load(&config(LoadStrategy::Script)).await;
		assert!(matches!(result, Err(LoadError::ScriptFailed { ref src }) if src.ends_with("/api/script.js")));
	}

	#[tokio::test(start_paused = true)]
	async fn test_script_already_present_is_not_reinjected() {
		let slot = Arc::new(ProviderSlot::new());
		let mut host = FakeHost::new(Arc::clone(&slot));
		host.present = true;
		let host = Arc::new(host);
		let loader = DefaultLoader::new(slot).with_injector(host.clone());

		let _ = loader.load(&config(LoadStrategy::Script)).await;
		assert!(host.injected.lock().is_empty());
	}

	#[tokio::test]
	async fn test_sdk_requires_init_hook() {
		let slot = Arc::new(ProviderSlot::new());
		slot.register(Arc::new(RecordingProvider::new()));
		let loader = DefaultLoader::new(slot);

		let result = loader.load(&config(LoadStrategy::Sdk)).await;
		assert!(matches!(result, Err(LoadError::MissingInitHook)));
	}

	#[tokio::test]
	async fn test_sdk_runs_init_with_api_host() {
		let slot = Arc::new(ProviderSlot::new());
		let provider = Arc::new(InitProvider::new(Duration::ZERO, false));
		slot.register(provider.clone());
		let loader = DefaultLoader::new(slot);

		assert!(loader.load(&config(LoadStrategy::Sdk)).await.is_ok());
		let options = provider.options.lock().clone().unwrap();
		assert_eq!(options.analytics_host, "https://analytics.example.com/api");
		assert_eq!(options.site_id, "site_1");
	}

	#[tokio::test]
	async fn test_sdk_init_failure() {
		let slot = Arc::new(ProviderSlot::new());
		slot.register(Arc::new(InitProvider::new(Duration::ZERO, true)));
		let loader = DefaultLoader::new(slot);

		let result = loader.load(&config(LoadStrategy::Sdk)).await;
		assert!(matches!(result, Err(LoadError::InitFailed(_))));
	}

	#[tokio::test(start_paused = true)]
	async fn test_sdk_init_bounded_by_timeout() {
		let slot = Arc::new(ProviderSlot::new());
		slot.register(Arc::new(InitProvider::new(Duration::from_secs(10), false)));
		let loader = DefaultLoader::new(slot);

		let result = loader.load(&config(LoadStrategy::Sdk)).await;
		assert!(matches!(result, Err(LoadError::Timeout { .. })));
	}
}
