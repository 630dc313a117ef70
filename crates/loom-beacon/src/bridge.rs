// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tag-manager data-layer bridge.
//!
//! A [`DataLayer`] is the shared, append-only list that tag-manager style
//! integrations push JSON objects onto. Installing a [`DataLayerBridge`]
//! forwards every pushed entry that names an event, first for entries already
//! present and then for each new push, into an [`EventSink`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use loom_beacon_core::{Properties, PropertyValue};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::debug;

use crate::isolation::run_isolated;

/// Receives events lifted out of the data layer.
pub trait EventSink: Send + Sync {
	fn emit(&self, name: &str, properties: Option<Properties>);
}

impl<F> EventSink for F
where
	F: Fn(&str, Option<Properties>) + Send + Sync,
{
	fn emit(&self, name: &str, properties: Option<Properties>) {
		self(name, properties)
	}
}

type Interceptor = Arc<dyn Fn(&Value) + Send + Sync>;

/// The shared list entries are pushed onto.
#[derive(Default)]
pub struct DataLayer {
	entries: Mutex<Vec<Value>>,
	interceptor: RwLock<Option<(u64, Interceptor)>>,
}

impl DataLayer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends an entry and hands it to the installed interceptor.
	pub fn push(&self, entry: Value) {
		self.entries.lock().push(entry.clone());

		let interceptor = self
			.interceptor
			.read()
			.as_ref()
			.map(|(_, interceptor)| Arc::clone(interceptor));
		if let Some(interceptor) = interceptor {
			run_isolated("data layer interceptor", || interceptor(&entry));
		}
	}

	pub fn entries(&self) -> Vec<Value> {
		self.entries.lock().clone()
	}

	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}

	pub fn is_intercepted(&self) -> bool {
		self.interceptor.read().is_some()
	}

	fn set_interceptor(&self, token: u64, interceptor: Interceptor) {
		*self.interceptor.write() = Some((token, interceptor));
	}

	/// Removes the interceptor only if it is still the one `token` installed.
	fn clear_interceptor(&self, token: u64) {
		let mut slot = self.interceptor.write();
		if matches!(slot.as_ref(), Some((current, _)) if *current == token) {
			*slot = None;
		}
	}
}

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// An installed bridge. Dropping it restores the layer's plain behaviour.
pub struct DataLayerBridge {
	data_layer: Arc<DataLayer>,
	token: u64,
}

impl DataLayerBridge {
	/// Forwards existing entries, then intercepts future pushes.
	///
	/// An empty `allowed_events` forwards every non-reserved event.
	pub fn install(
		data_layer: Arc<DataLayer>,
		sink: Arc<dyn EventSink>,
		allowed_events: Vec<String>,
	) -> Self {
		let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
		let allowed = Arc::new(allowed_events);
		let existing = data_layer.entries();

		let forward = {
			let sink = Arc::clone(&sink);
			let allowed = Arc::clone(&allowed);
			move |entry: &Value| {
				if let Some((name, properties)) = translate_entry(entry, &allowed) {
					debug!(event = %name, "Forwarding data layer event");
					sink.emit(&name, properties);
				}
			}
		};
		data_layer.set_interceptor(token, Arc::new(forward));

		for entry in &existing {
			if let Some((name, properties)) = translate_entry(entry, &allowed) {
				run_isolated("data layer replay", || sink.emit(&name, properties));
			}
		}

		debug!(replayed = existing.len(), "Data layer bridge installed");
		Self { data_layer, token }
	}

	pub fn uninstall(self) {
		drop(self);
	}
}

impl Drop for DataLayerBridge {
	fn drop(&mut self) {
		self.data_layer.clear_interceptor(self.token);
	}
}

fn is_reserved_event(name: &str) -> bool {
	name.starts_with("gtm.") || name == "gtag.config" || name == "optimize.activate"
}

fn is_excluded_key(key: &str) -> bool {
	key == "event"
		|| key.starts_with("gtm.")
		|| key == "gtag.config"
		|| key == "eventCallback"
		|| key == "eventTimeout"
}

/// Lifts an event name and scalar properties out of a data-layer entry.
///
/// Returns `None` for entries without a string `event`, for reserved events,
/// and for events missing from a non-empty allow-list.
pub fn translate_entry(entry: &Value, allowed: &[String]) -> Option<(String, Option<Properties>)> {
	let object = entry.as_object()?;
	let name = object.get("event")?.as_str()?;

	if name.is_empty() || is_reserved_event(name) {
		return None;
	}
	if !allowed.is_empty() && !allowed.iter().any(|allowed| allowed == name) {
		return None;
	}

	let properties: Properties = object
		.iter()
		.filter(|(key, _)| !is_excluded_key(key))
		.filter_map(|(key, value)| {
			PropertyValue::from_json(value).map(|scalar| (key.clone(), Value::from(scalar)))
		})
		.collect();

	Some((name.to_string(), properties.non_empty()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	type Emitted = Arc<Mutex<Vec<(String, Option<Properties>)>>>;

	fn recording_sink() -> (Arc<dyn EventSink>, Emitted) {
		let emitted: Emitted = Arc::new(Mutex::new(Vec::new()));
		let captured = Arc::clone(&emitted);
		let sink = move |name: &str, properties: Option<Properties>| {
			captured.lock().push((name.to_string(), properties));
		};
		(Arc::new(sink), emitted)
	}

	#[test]
	fn test_translate_extracts_scalar_properties() {
		let entry = json!({
			"event": "purchase",
			"value": 99.5,
			"currency": "USD",
			"items": [1, 2],
			"meta": {"a": 1},
			"missing": null,
			"eventCallback": "fn",
			"gtm.uniqueEventId": 4,
		});

		let (name, properties) = translate_entry(&entry, &[]).unwrap();
		assert_eq!(name, "purchase");
		assert_eq!(
			properties.unwrap().into_value(),
			json!({"value": 99.5, "currency": "USD"})
		);
	}

	#[test]
	fn test_translate_skips_reserved_events() {
		for name in ["gtm.js", "gtm.dom", "gtag.config", "optimize.activate"] {
			assert!(translate_entry(&json!({"event": name}), &[]).is_none(), "{name}");
		}
	}

	#[test]
	fn test_translate_requires_string_event() {
		assert!(translate_entry(&json!({"value": 1}), &[]).is_none());
		assert!(translate_entry(&json!({"event": 5}), &[]).is_none());
		assert!(translate_entry(&json!(["event", "x"]), &[]).is_none());
	}

	#[test]
	fn test_translate_applies_allow_list() {
		let allowed = vec!["sign_up".to_string()];
		assert!(translate_entry(&json!({"event": "sign_up"}), &allowed).is_some());
		assert!(translate_entry(&json!({"event": "page_scroll"}), &allowed).is_none());
	}

	#[test]
	fn test_translate_empty_properties_are_absent() {
		let (_, properties) = translate_entry(&json!({"event": "ping"}), &[]).unwrap();
		assert!(properties.is_none());
	}

	#[test]
	fn test_install_replays_existing_then_intercepts() {
		let layer = Arc::new(DataLayer::new());
		layer.push(json!({"event": "gtm.js"}));
		layer.push(json!({"event": "early", "step": 1}));

		let (sink, emitted) = recording_sink();
		let bridge = DataLayerBridge::install(Arc::clone(&layer), sink, Vec::new());

		layer.push(json!({"event": "late"}));

		{
			let emitted = emitted.lock();
			let names: Vec<&str> = emitted.iter().map(|(name, _)| name.as_str()).collect();
			assert_eq!(names, vec!["early", "late"]);
		}
		assert_eq!(layer.len(), 3);

		bridge.uninstall();
		assert!(!layer.is_intercepted());
		layer.push(json!({"event": "after_uninstall"}));
		assert_eq!(emitted.lock().len(), 2);
		assert_eq!(layer.len(), 4);
	}

	#[test]
	fn test_stale_bridge_does_not_remove_newer_interceptor() {
		let layer = Arc::new(DataLayer::new());
		let (first_sink, _) = recording_sink();
		let (second_sink, second) = recording_sink();

		let first = DataLayerBridge::install(Arc::clone(&layer), first_sink, Vec::new());
		let _second = DataLayerBridge::install(Arc::clone(&layer), second_sink, Vec::new());
		first.uninstall();

		layer.push(json!({"event": "still_bridged"}));
		assert_eq!(second.lock().len(), 1);
	}

	#[test]
	fn test_panicking_sink_does_not_break_push() {
		let layer = Arc::new(DataLayer::new());
		let sink = |_: &str, _: Option<Properties>| panic!("sink failure");
		let _bridge = DataLayerBridge::install(Arc::clone(&layer), Arc::new(sink), Vec::new());

		layer.push(json!({"event": "x"}));
		assert_eq!(layer.len(), 1);
	}
}
