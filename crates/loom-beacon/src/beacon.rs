// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The lifecycle controller.
//!
//! [`Beacon`] owns the boot state machine and decides, for every public call,
//! whether it is forwarded to the provider immediately or queued until boot
//! completes.
//!
//! ```text
//!            boot()                 provider resolved
//!   Idle ───────────► Booting ─────────────────────────► Ready
//!    ▲                   │                                  │
//!    │                   │ load error / invalid config      │
//!    │                   ▼                                  │
//!    └────────────── Failed ◄───────────────────────────────┘
//!         destroy()            (destroy() from any state)
//! ```

use std::fmt;
use std::sync::{Arc, Weak};

use loom_beacon_core::{
	merge_global, BeaconConfig, Call, ErrorReport, GlobalProperties, LoadError, Properties,
	PropertyValue, Provider, ProviderError, SessionReplay, Unsubscribe,
};
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::auto_track::AutoTracker;
use crate::bridge::{DataLayer, DataLayerBridge, EventSink};
use crate::dom::{Document, Element};
use crate::dry_run::DryRunProvider;
use crate::identify::identity_from_document;
use crate::isolation::run_isolated;
use crate::loader::{DefaultLoader, Loader, ProviderSlot, ScriptInjector};
use crate::queue::{CallQueue, DEFAULT_QUEUE_CAPACITY};
use crate::registry::{ListenerRegistry, ReadyCallback};

/// Where the beacon is in its boot lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BootState {
	#[default]
	Idle,
	Booting,
	Ready,
	Failed,
}

impl fmt::Display for BootState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			BootState::Idle => write!(f, "idle"),
			BootState::Booting => write!(f, "booting"),
			BootState::Ready => write!(f, "ready"),
			BootState::Failed => write!(f, "failed"),
		}
	}
}

#[derive(Default)]
struct BeaconState {
	state: BootState,
	/// Advanced by every `destroy()`; a boot that started under an older
	/// generation discards its result.
	generation: u64,
	config: Option<BeaconConfig>,
	provider: Option<Arc<dyn Provider>>,
	global_properties: GlobalProperties,
	ready_callbacks: Vec<ReadyCallback>,
	bridge: Option<DataLayerBridge>,
}

struct BeaconInner {
	state: Mutex<BeaconState>,
	queue: CallQueue,
	listeners: Arc<ListenerRegistry>,
	loader: Arc<dyn Loader>,
	provider_slot: Arc<ProviderSlot>,
	document: Option<Arc<dyn Document>>,
	data_layer: Arc<DataLayer>,
	auto_tracker: AutoTracker,
}

/// Forwards events to a beacon without keeping it alive.
struct WeakSink(Weak<BeaconInner>);

impl EventSink for WeakSink {
	fn emit(&self, name: &str, properties: Option<Properties>) {
		if let Some(inner) = self.0.upgrade() {
			Beacon { inner }.event(name, properties);
		}
	}
}

/// Builder for constructing a [`Beacon`].
pub struct BeaconBuilder {
	loader: Option<Arc<dyn Loader>>,
	provider_slot: Option<Arc<ProviderSlot>>,
	script_injector: Option<Arc<dyn ScriptInjector>>,
	document: Option<Arc<dyn Document>>,
	data_layer: Option<Arc<DataLayer>>,
	queue_capacity: usize,
}

impl BeaconBuilder {
	pub fn new() -> Self {
		Self {
			loader: None,
			provider_slot: None,
			script_injector: None,
			document: None,
			data_layer: None,
			queue_capacity: DEFAULT_QUEUE_CAPACITY,
		}
	}

	/// Replaces the default slot-and-script loader entirely.
	pub fn loader(mut self, loader: Arc<dyn Loader>) -> Self {
		self.loader = Some(loader);
		self
	}

	/// Slot consulted by the default loader.
	pub fn provider_slot(mut self, slot: Arc<ProviderSlot>) -> Self {
		self.provider_slot = Some(slot);
		self
	}

	/// Host hook the default loader uses for the script strategy.
	pub fn script_injector(mut self, injector: Arc<dyn ScriptInjector>) -> Self {
		self.script_injector = Some(injector);
		self
	}

	/// Document used for auto-identify.
	pub fn document(mut self, document: Arc<dyn Document>) -> Self {
		self.document = Some(document);
		self
	}

	pub fn data_layer(mut self, data_layer: Arc<DataLayer>) -> Self {
		self.data_layer = Some(data_layer);
		self
	}

	/// Maximum number of calls held before boot completes.
	pub fn queue_capacity(mut self, capacity: usize) -> Self {
		self.queue_capacity = capacity;
		self
	}

	pub fn build(self) -> Beacon {
		let provider_slot = self.provider_slot.unwrap_or_default();
		let loader = self.loader.unwrap_or_else(|| {
			let mut loader = DefaultLoader::new(Arc::clone(&provider_slot));
			if let Some(injector) = self.script_injector {
				loader = loader.with_injector(injector);
			}
			Arc::new(loader) as Arc<dyn Loader>
		});

		let inner = Arc::new_cyclic(|weak: &Weak<BeaconInner>| BeaconInner {
			state: Mutex::new(BeaconState::default()),
			queue: CallQueue::new(self.queue_capacity),
			listeners: Arc::new(ListenerRegistry::default()),
			loader,
			provider_slot,
			document: self.document,
			data_layer: self.data_layer.unwrap_or_default(),
			auto_tracker: AutoTracker::new(Arc::new(WeakSink(weak.clone()))),
		});

		Beacon { inner }
	}
}

impl Default for BeaconBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Queue-before-ready analytics client.
///
/// Every method may be called at any point in the lifecycle. Calls made before
/// boot completes are queued and replayed in order once the provider is
/// available. Nothing here returns an error or panics across the API: failures
/// are logged and absorbed.
///
/// `Beacon` is a cheap handle; clones share the same state.
///
/// # Example
///
/// ```
/// use loom_beacon::{Beacon, Properties};
/// use loom_beacon_core::BeaconConfig;
///
/// # tokio_test::block_on(async {
/// let beacon = Beacon::new();
/// beacon.event("click_cta", Properties::new().insert("button", "hero"));
/// assert_eq!(beacon.queue_size(), 1);
///
/// beacon
/// 	.boot(BeaconConfig::new("https://analytics.example.com", "site_1").with_dry_run(true))
/// 	.await;
/// assert!(beacon.is_ready());
/// assert_eq!(beacon.queue_size(), 0);
/// # });
/// ```
#[derive(Clone)]
pub struct Beacon {
	inner: Arc<BeaconInner>,
}

impl Beacon {
	/// A beacon using the default loader over a fresh provider slot.
	pub fn new() -> Self {
		BeaconBuilder::new().build()
	}

	pub fn builder() -> BeaconBuilder {
		BeaconBuilder::new()
	}

	/// Configures the beacon and acquires a provider.
	///
	/// A no-op while already booting or ready. Failures move the beacon to
	/// [`BootState::Failed`] and are logged, never returned.
	#[instrument(
		skip(self, config),
		fields(site_id = %config.site_id, strategy = %config.load_strategy, debug = config.debug, dry_run = config.dry_run)
	)]
	pub async fn boot(&self, config: BeaconConfig) {
		let generation = {
			let mut state = self.inner.state.lock();
			if matches!(state.state, BootState::Booting | BootState::Ready) {
				warn!(state = %state.state, "Beacon already initialized");
				return;
			}
			state.state = BootState::Booting;
			if !config.global_properties.is_empty() {
				state.global_properties = config.global_properties.clone();
			}
			state.config = Some(config.clone());
			state.generation
		};

		let resolved = self.resolve_provider(&config).await;

		// Err carries a provider that resolved after destroy() and must be released.
		let accepted: Result<Arc<dyn Provider>, Option<Arc<dyn Provider>>> = {
			let mut state = self.inner.state.lock();
			if state.generation != generation {
				Err(resolved.ok())
			} else {
				match resolved {
					Ok(provider) => {
						state.state = BootState::Ready;
						state.provider = Some(Arc::clone(&provider));
						Ok(provider)
					}
					Err(e) => {
						state.state = BootState::Failed;
						error!(error = %e, "Boot failed");
						return;
					}
				}
			}
		};

		let provider = match accepted {
			Ok(provider) => provider,
			Err(stale) => {
				debug!("Beacon destroyed during boot, discarding result");
				if let Some(stale) = stale {
					release_provider(stale.as_ref());
				}
				return;
			}
		};
		info!("Beacon ready");

		if config.auto_identify {
			self.auto_identify(provider.as_ref(), &config.identity_selector);
		}

		if config.gtm_bridge {
			self.start_bridge(generation, config.gtm_events.clone());
		}

		if config.auto_track {
			self.inner.auto_tracker.enable();
		}

		self.flush_queue();
		self.fire_ready_callbacks();
	}

	async fn resolve_provider(&self, config: &BeaconConfig) -> Result<Arc<dyn Provider>, LoadError> {
		config.validate()?;

		if config.dry_run {
			info!("Dry-run mode: no actual tracking");
			return Ok(Arc::new(DryRunProvider::new(config.debug)));
		}

		self.inner.loader.load(config).await
	}

	fn auto_identify(&self, provider: &dyn Provider, selector: &str) {
		let Some(document) = self.inner.document.as_ref() else {
			return;
		};
		let Some(user_id) = identity_from_document(document.as_ref(), selector) else {
			return;
		};

		debug!(user_id = %user_id, "Auto-identified user from document");
		if let Some(Err(e)) = run_isolated("auto-identify", || provider.identify(&user_id, None)) {
			warn!(error = %e, "Auto-identify rejected by provider");
		}
	}

	fn start_bridge(&self, generation: u64, allowed_events: Vec<String>) {
		let sink: Arc<dyn EventSink> = Arc::new(WeakSink(Arc::downgrade(&self.inner)));
		let bridge = DataLayerBridge::install(Arc::clone(&self.inner.data_layer), sink, allowed_events);

		let mut state = self.inner.state.lock();
		if state.generation == generation {
			state.bridge = Some(bridge);
			info!("Data layer bridge active");
		}
	}

	fn flush_queue(&self) {
		let Some(provider) = self.ready_provider() else {
			return;
		};

		let replayed = self
			.inner
			.queue
			.flush(|queued| forward(provider.as_ref(), queued.call));
		if replayed > 0 {
			debug!(replayed, "Flushed queued calls");
		}
	}

	fn fire_ready_callbacks(&self) {
		let callbacks = {
			let mut state = self.inner.state.lock();
			if state.state != BootState::Ready {
				return;
			}
			std::mem::take(&mut state.ready_callbacks)
		};

		for callback in callbacks {
			run_isolated("ready callback", callback);
		}
	}

	/// The provider, when the beacon is ready to deliver.
	fn ready_provider(&self) -> Option<Arc<dyn Provider>> {
		let state = self.inner.state.lock();
		match state.state {
			BootState::Ready => state.provider.clone(),
			_ => None,
		}
	}

	/// Forwards to the provider when ready, otherwise queues.
	fn send(&self, call: Call) {
		let Some(provider) = self.ready_provider() else {
			self.inner.queue.enqueue(call);
			return;
		};

		let method = call.method_name();
		match run_isolated("provider call", || forward(provider.as_ref(), call)) {
			Some(Ok(())) => debug!(method, "Delivered call"),
			Some(Err(e)) => warn!(method, error = %e, "Provider rejected call"),
			None => {}
		}
	}

	/// Tracks a custom event.
	///
	/// Global properties are merged under `properties`, every listener is
	/// notified with the merged result, and the event is then queued or sent.
	pub fn event(&self, name: &str, properties: impl Into<Option<Properties>>) {
		if name.is_empty() {
			warn!("Event name is required");
			return;
		}

		let merged = {
			let state = self.inner.state.lock();
			merge_global(&state.global_properties, properties.into())
		};

		self.inner.listeners.notify(name, merged.as_ref());

		self.send(Call::Event {
			name: name.to_string(),
			properties: merged,
		});
	}

	pub fn pageview(&self, path: Option<&str>) {
		self.send(Call::Pageview {
			path: path.map(str::to_string),
		});
	}

	pub fn track_outbound(&self, url: &str, text: Option<&str>, target: Option<&str>) {
		self.send(Call::TrackOutbound {
			url: url.to_string(),
			text: text.map(str::to_string),
			target: target.map(str::to_string),
		});
	}

	/// Reports an error through the provider's error capability, or as an
	/// `error` event carrying the message when the provider has none.
	pub fn track_error(&self, error: ErrorReport, context: Option<Properties>) {
		self.send(Call::TrackError { error, context });
	}

	/// Reports a Rust error value.
	pub fn capture_error<E>(&self, error: &E, context: Option<Properties>)
	where
		E: std::error::Error + ?Sized,
	{
		self.track_error(ErrorReport::from_error(error), context);
	}

	pub fn identify(&self, user_id: &str, traits: Option<Properties>) {
		if user_id.is_empty() {
			warn!("User ID is required for identify()");
			return;
		}
		self.send(Call::Identify {
			user_id: user_id.to_string(),
			traits,
		});
	}

	/// Updates user traits. Dropped silently by providers without trait support.
	pub fn set_traits(&self, traits: Properties) {
		self.send(Call::SetTraits { traits });
	}

	/// Clears the identified user. Not queued: a no-op before ready.
	pub fn clear_user_id(&self) {
		let Some(provider) = self.ready_provider() else {
			return;
		};
		match run_isolated("provider call", || provider.clear_user_id()) {
			Some(Ok(())) => debug!("User ID cleared"),
			Some(Err(e)) => warn!(error = %e, "Provider rejected clearUserId"),
			None => {}
		}
	}

	pub fn user_id(&self) -> Option<String> {
		let provider = self.ready_provider()?;
		run_isolated("provider call", || provider.user_id()).flatten()
	}

	pub fn start_replay(&self) {
		self.with_replay("startReplay", |replay| replay.start());
	}

	pub fn stop_replay(&self) {
		self.with_replay("stopReplay", |replay| replay.stop());
	}

	fn with_replay(
		&self,
		operation: &'static str,
		f: impl FnOnce(&dyn SessionReplay) -> Result<(), ProviderError>,
	) {
		let Some(provider) = self.ready_provider() else {
			return;
		};
		let Some(replay) = provider.session_replay() else {
			debug!(operation, "Provider has no session replay");
			return;
		};
		if let Some(Err(e)) = run_isolated("provider call", || f(replay)) {
			warn!(operation, error = %e, "Provider rejected session replay call");
		}
	}

	pub fn is_replay_active(&self) -> bool {
		self.ready_provider()
			.and_then(|provider| {
				let replay = provider.session_replay()?;
				run_isolated("provider call", || replay.is_active())
			})
			.unwrap_or(false)
	}

	/// Sets a property merged into every subsequent `event()`.
	pub fn set_global_property(&self, key: impl Into<String>, value: impl Into<PropertyValue>) {
		self.inner
			.state
			.lock()
			.global_properties
			.insert(key.into(), value.into());
	}

	pub fn remove_global_property(&self, key: &str) {
		self.inner.state.lock().global_properties.remove(key);
	}

	pub fn global_properties(&self) -> GlobalProperties {
		self.inner.state.lock().global_properties.clone()
	}

	/// Runs `callback` once the beacon is ready.
	///
	/// Fires immediately when already ready; otherwise at the next successful
	/// boot. A failed boot does not fire it.
	pub fn on_ready(&self, callback: impl FnOnce() + Send + 'static) {
		let callback: ReadyCallback = Box::new(callback);
		let run_now = {
			let mut state = self.inner.state.lock();
			if state.state == BootState::Ready {
				Some(callback)
			} else {
				state.ready_callbacks.push(callback);
				None
			}
		};

		if let Some(callback) = run_now {
			run_isolated("ready callback", callback);
		}
	}

	/// Observes every `event()` call, queued or not, with merged properties.
	pub fn on_event(
		&self,
		listener: impl Fn(&str, Option<&Properties>) + Send + Sync + 'static,
	) -> Unsubscribe {
		self.inner.listeners.subscribe(Arc::new(listener))
	}

	/// Subscribes to client-side navigation. Needs a ready provider that
	/// supports page-change notifications; otherwise returns a no-op.
	pub fn on_page_change(
		&self,
		callback: impl Fn(&str, &str) + Send + Sync + 'static,
	) -> Unsubscribe {
		let provider = self.ready_provider();
		match provider.as_ref().and_then(|provider| provider.page_changes()) {
			Some(page_changes) => page_changes.on_page_change(Box::new(callback)),
			None => {
				warn!("onPageChange requires a ready provider with native support");
				Unsubscribe::noop()
			}
		}
	}

	/// True only when ready and a provider is held.
	pub fn is_ready(&self) -> bool {
		let state = self.inner.state.lock();
		state.state == BootState::Ready && state.provider.is_some()
	}

	pub fn state(&self) -> BootState {
		self.inner.state.lock().state
	}

	pub fn config(&self) -> Option<BeaconConfig> {
		self.inner.state.lock().config.clone()
	}

	pub fn queue_size(&self) -> usize {
		self.inner.queue.len()
	}

	pub fn provider_slot(&self) -> &Arc<ProviderSlot> {
		&self.inner.provider_slot
	}

	/// The data layer the bridge observes.
	pub fn data_layer(&self) -> &Arc<DataLayer> {
		&self.inner.data_layer
	}

	/// The beacon's click tracker. Clones share the enabled flag.
	pub fn auto_tracker(&self) -> AutoTracker {
		self.inner.auto_tracker.clone()
	}

	/// Delivers a host click to the auto tracker.
	pub fn handle_click(&self, target: &Arc<dyn Element>) -> bool {
		self.inner.auto_tracker.handle_click(target)
	}

	/// Routes a recorded call through the matching public method.
	pub fn dispatch(&self, call: Call) {
		match call {
			Call::Event { name, properties } => self.event(&name, properties),
			Call::Pageview { path } => self.pageview(path.as_deref()),
			Call::TrackOutbound { url, text, target } => {
				self.track_outbound(&url, text.as_deref(), target.as_deref())
			}
			Call::TrackError { error, context } => self.track_error(error, context),
			Call::Identify { user_id, traits } => self.identify(&user_id, traits),
			Call::SetTraits { traits } => self.set_traits(traits),
		}
	}

	/// Tears everything down and returns to [`BootState::Idle`].
	///
	/// Safe to call repeatedly and on a beacon that never booted. A boot still
	/// in flight discards its result.
	pub fn destroy(&self) {
		let (bridge, provider, callbacks) = {
			let mut state = self.inner.state.lock();
			state.generation = state.generation.wrapping_add(1);
			state.state = BootState::Idle;
			state.config = None;
			state.global_properties.clear();
			(
				state.bridge.take(),
				state.provider.take(),
				std::mem::take(&mut state.ready_callbacks),
			)
		};

		drop(bridge);
		self.inner.auto_tracker.disable();

		if let Some(provider) = provider {
			release_provider(provider.as_ref());
		}

		self.inner.queue.clear();
		self.inner.listeners.clear();
		drop(callbacks);

		info!("Beacon destroyed");
	}
}

impl Default for Beacon {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for Beacon {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.inner.state.lock();
		f.debug_struct("Beacon")
			.field("state", &state.state)
			.field("has_provider", &state.provider.is_some())
			.field("global_properties", &state.global_properties.len())
			.field("ready_callbacks", &state.ready_callbacks.len())
			.field("queue_size", &self.inner.queue.len())
			.finish()
	}
}

impl EventSink for Beacon {
	fn emit(&self, name: &str, properties: Option<Properties>) {
		self.event(name, properties);
	}
}

/// Runs the provider's cleanup hook, if it has one.
fn release_provider(provider: &dyn Provider) {
	if let Some(cleanup) = provider.cleanup_hook() {
		run_isolated("provider cleanup", || cleanup.cleanup());
	}
}

/// Executes one call against the provider.
fn forward(provider: &dyn Provider, call: Call) -> Result<(), ProviderError> {
	match call {
		Call::Event { name, properties } => provider.event(&name, properties.as_ref()),
		Call::Pageview { path } => provider.pageview(path.as_deref()),
		Call::TrackOutbound { url, text, target } => {
			provider.track_outbound(&url, text.as_deref(), target.as_deref())
		}
		Call::TrackError { error, context } => report_error(provider, &error, context),
		Call::Identify { user_id, traits } => provider.identify(&user_id, traits.as_ref()),
		Call::SetTraits { traits } => match provider.traits() {
			Some(capability) => capability.set_traits(&traits),
			None => {
				debug!("Provider has no setTraits, dropping traits");
				Ok(())
			}
		},
	}
}

fn report_error(
	provider: &dyn Provider,
	error: &ErrorReport,
	context: Option<Properties>,
) -> Result<(), ProviderError> {
	if let Some(reporter) = provider.error_reporting() {
		return reporter.error(error, context.as_ref());
	}

	let message = error
		.message
		.clone()
		.unwrap_or_else(|| "Unknown error".to_string());
	let mut properties = Properties::new().insert("message", message);
	if let Some(context) = context {
		properties = properties.merge(context);
	}
	provider.event("error", Some(&properties))
}
