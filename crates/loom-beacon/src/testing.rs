// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Test doubles for code that drives a [`Beacon`](crate::Beacon).

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use loom_beacon_core::{
	BeaconConfig, Call, Cleanup, ErrorCapability, ErrorReport, LoadError, PageChangeCallback,
	PageChanges, Properties, Provider, ProviderError, Result, SessionReplay, TraitsCapability,
	Unsubscribe,
};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::loader::Loader;

type PageChangeSubscriber = Arc<dyn Fn(&str, &str) + Send + Sync>;
type PageChangeSubscribers = Arc<Mutex<Vec<(u64, PageChangeSubscriber)>>>;

/// A provider that records every call it receives as a [`Call`].
///
/// All optional capabilities are present unless switched off.
pub struct RecordingProvider {
	calls: Mutex<Vec<Call>>,
	user_id: Mutex<Option<String>>,
	replay_active: AtomicBool,
	has_traits: bool,
	has_errors: bool,
	has_replay: bool,
	has_page_changes: bool,
	has_cleanup: bool,
	fail_on: Option<String>,
	panic_on: Option<String>,
	next_subscriber: AtomicU64,
	page_change_subscribers: PageChangeSubscribers,
	cleanups: AtomicUsize,
	clears: AtomicUsize,
}

impl RecordingProvider {
	pub fn new() -> Self {
		Self {
			calls: Mutex::new(Vec::new()),
			user_id: Mutex::new(None),
			replay_active: AtomicBool::new(false),
			has_traits: true,
			has_errors: true,
			has_replay: true,
			has_page_changes: true,
			has_cleanup: true,
			fail_on: None,
			panic_on: None,
			next_subscriber: AtomicU64::new(0),
			page_change_subscribers: Arc::new(Mutex::new(Vec::new())),
			cleanups: AtomicUsize::new(0),
			clears: AtomicUsize::new(0),
		}
	}

	pub fn without_error_capability(mut self) -> Self {
		self.has_errors = false;
		self
	}

	pub fn without_traits_capability(mut self) -> Self {
		self.has_traits = false;
		self
	}

	/// Only the required core remains.
	pub fn without_optional_capabilities(mut self) -> Self {
		self.has_traits = false;
		self.has_errors = false;
		self.has_replay = false;
		self.has_page_changes = false;
		self.has_cleanup = false;
		self
	}

	/// Rejects events with this name.
	pub fn fail_on(mut self, event: impl Into<String>) -> Self {
		self.fail_on = Some(event.into());
		self
	}

	/// Panics on events with this name.
	pub fn panic_on(mut self, event: impl Into<String>) -> Self {
		self.panic_on = Some(event.into());
		self
	}

	pub fn calls(&self) -> Vec<Call> {
		self.calls.lock().clone()
	}

	/// Names of the recorded `event` calls, in order.
	pub fn event_names(&self) -> Vec<String> {
		self.calls
			.lock()
			.iter()
			.filter_map(|call| match call {
				Call::Event { name, .. } => Some(name.clone()),
				_ => None,
			})
			.collect()
	}

	pub fn cleanup_count(&self) -> usize {
		self.cleanups.load(Ordering::SeqCst)
	}

	pub fn clear_count(&self) -> usize {
		self.clears.load(Ordering::SeqCst)
	}

	pub fn page_change_subscribers(&self) -> usize {
		self.page_change_subscribers.lock().len()
	}

	/// Simulates a client-side navigation.
	///
	/// Subscribers run against a snapshot, so they may unsubscribe themselves.
	pub fn navigate(&self, path: &str, previous_path: &str) {
		let snapshot: Vec<PageChangeSubscriber> = self
			.page_change_subscribers
			.lock()
			.iter()
			.map(|(_, callback)| Arc::clone(callback))
			.collect();

		for callback in snapshot {
			callback(path, previous_path);
		}
	}

	fn record(&self, call: Call) {
		self.calls.lock().push(call);
	}
}

impl Default for RecordingProvider {
	fn default() -> Self {
		Self::new()
	}
}

impl Provider for RecordingProvider {
	fn pageview(&self, path: Option<&str>) -> Result<()> {
		self.record(Call::Pageview {
			path: path.map(str::to_string),
		});
		Ok(())
	}

	fn event(&self, name: &str, properties: Option<&Properties>) -> Result<()> {
		if self.panic_on.as_deref() == Some(name) {
			panic!("provider panicked on {name}");
		}
		if self.fail_on.as_deref() == Some(name) {
			return Err(ProviderError::rejected("event", format!("refused {name}")));
		}
		self.record(Call::Event {
			name: name.to_string(),
			properties: properties.cloned(),
		});
		Ok(())
	}

	fn track_outbound(&self, url: &str, text: Option<&str>, target: Option<&str>) -> Result<()> {
		self.record(Call::TrackOutbound {
			url: url.to_string(),
			text: text.map(str::to_string),
			target: target.map(str::to_string),
		});
		Ok(())
	}

	fn identify(&self, user_id: &str, traits: Option<&Properties>) -> Result<()> {
		*self.user_id.lock() = Some(user_id.to_string());
		self.record(Call::Identify {
			user_id: user_id.to_string(),
			traits: traits.cloned(),
		});
		Ok(())
	}

	fn clear_user_id(&self) -> Result<()> {
		self.clears.fetch_add(1, Ordering::SeqCst);
		*self.user_id.lock() = None;
		Ok(())
	}

	fn user_id(&self) -> Option<String> {
		self.user_id.lock().clone()
	}

	fn traits(&self) -> Option<&dyn TraitsCapability> {
		self.has_traits.then_some(self as &dyn TraitsCapability)
	}

	fn error_reporting(&self) -> Option<&dyn ErrorCapability> {
		self.has_errors.then_some(self as &dyn ErrorCapability)
	}

	fn session_replay(&self) -> Option<&dyn SessionReplay> {
		self.has_replay.then_some(self as &dyn SessionReplay)
	}

	fn page_changes(&self) -> Option<&dyn PageChanges> {
		self.has_page_changes.then_some(self as &dyn PageChanges)
	}

	fn cleanup_hook(&self) -> Option<&dyn Cleanup> {
		self.has_cleanup.then_some(self as &dyn Cleanup)
	}
}

impl TraitsCapability for RecordingProvider {
	fn set_traits(&self, traits: &Properties) -> Result<()> {
		self.record(Call::SetTraits {
			traits: traits.clone(),
		});
		Ok(())
	}
}

impl ErrorCapability for RecordingProvider {
	fn error(&self, error: &ErrorReport, context: Option<&Properties>) -> Result<()> {
		self.record(Call::TrackError {
			error: error.clone(),
			context: context.cloned(),
		});
		Ok(())
	}
}

impl SessionReplay for RecordingProvider {
	fn start(&self) -> Result<()> {
		self.replay_active.store(true, Ordering::SeqCst);
		Ok(())
	}

	fn stop(&self) -> Result<()> {
		self.replay_active.store(false, Ordering::SeqCst);
		Ok(())
	}

	fn is_active(&self) -> bool {
		self.replay_active.load(Ordering::SeqCst)
	}
}

impl PageChanges for RecordingProvider {
	fn on_page_change(&self, callback: PageChangeCallback) -> Unsubscribe {
		let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
		self.page_change_subscribers
			.lock()
			.push((id, PageChangeSubscriber::from(callback)));

		let subscribers = Arc::clone(&self.page_change_subscribers);
		Unsubscribe::new(move || subscribers.lock().retain(|(existing, _)| *existing != id))
	}
}

impl Cleanup for RecordingProvider {
	fn cleanup(&self) {
		self.cleanups.fetch_add(1, Ordering::SeqCst);
	}
}

/// A loader that hands out a fixed provider, or always fails.
pub struct StaticLoader {
	provider: Option<Arc<dyn Provider>>,
	gate: Option<Arc<Notify>>,
	loads: AtomicUsize,
}

impl StaticLoader {
	pub fn new(provider: Arc<dyn Provider>) -> Self {
		Self {
			provider: Some(provider),
			gate: None,
			loads: AtomicUsize::new(0),
		}
	}

	/// Every load fails with a timeout.
	pub fn failing() -> Self {
		Self {
			provider: None,
			gate: None,
			loads: AtomicUsize::new(0),
		}
	}

	/// Holds each load until `gate` is notified.
	pub fn gated(mut self, gate: Arc<Notify>) -> Self {
		self.gate = Some(gate);
		self
	}

	pub fn load_count(&self) -> usize {
		self.loads.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl Loader for StaticLoader {
	async fn load(&self, config: &BeaconConfig) -> std::result::Result<Arc<dyn Provider>, LoadError> {
		self.loads.fetch_add(1, Ordering::SeqCst);

		if let Some(gate) = &self.gate {
			gate.notified().await;
		}

		self.provider.clone().ok_or(LoadError::Timeout {
			timeout_ms: config.load_timeout_ms,
		})
	}
}
