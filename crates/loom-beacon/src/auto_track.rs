// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Declarative click tracking from element attributes.
//!
//! ```html
//! <button data-beacon-event="click_cta" data-beacon-button-type="primary">Buy</button>
//! ```
//!
//! A click anywhere inside that button emits
//! `event("click_cta", {"button_type": "primary"})`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use loom_beacon_core::Properties;
use tracing::debug;

use crate::bridge::EventSink;
use crate::dom::Element;

pub const ATTR_PREFIX: &str = "data-beacon-";
pub const EVENT_ATTR: &str = "data-beacon-event";

/// Delegated click handler. Starts disabled.
#[derive(Clone)]
pub struct AutoTracker {
	sink: Arc<dyn EventSink>,
	enabled: Arc<AtomicBool>,
}

impl AutoTracker {
	pub fn new(sink: Arc<dyn EventSink>) -> Self {
		Self {
			sink,
			enabled: Arc::new(AtomicBool::new(false)),
		}
	}

	pub fn enable(&self) {
		if !self.enabled.swap(true, Ordering::SeqCst) {
			debug!("Auto-track enabled");
		}
	}

	pub fn disable(&self) {
		if self.enabled.swap(false, Ordering::SeqCst) {
			debug!("Auto-track disabled");
		}
	}

	pub fn is_enabled(&self) -> bool {
		self.enabled.load(Ordering::SeqCst)
	}

	/// Handles a click on `target`. Returns true when an event was emitted.
	pub fn handle_click(&self, target: &Arc<dyn Element>) -> bool {
		if !self.is_enabled() {
			return false;
		}

		let Some(tracked) = closest_tracked(target) else {
			return false;
		};
		let Some((name, properties)) = extract(tracked.as_ref()) else {
			return false;
		};

		debug!(event = %name, "Auto-track click");
		self.sink.emit(&name, properties);
		true
	}
}

/// The target itself or its nearest ancestor carrying [`EVENT_ATTR`].
fn closest_tracked(target: &Arc<dyn Element>) -> Option<Arc<dyn Element>> {
	let mut current = Some(Arc::clone(target));
	while let Some(element) = current {
		if element.attribute(EVENT_ATTR).is_some() {
			return Some(element);
		}
		current = element.parent();
	}
	None
}

/// `data-beacon-button-type` becomes `button_type`.
fn attribute_key(name: &str) -> Option<String> {
	let key = name.strip_prefix(ATTR_PREFIX)?;
	(!key.is_empty()).then(|| key.replace('-', "_"))
}

fn extract(element: &dyn Element) -> Option<(String, Option<Properties>)> {
	let name = element.attribute(EVENT_ATTR).filter(|name| !name.is_empty())?;

	let properties: Properties = element
		.attribute_names()
		.into_iter()
		.filter(|attr| attr != EVENT_ATTR)
		.filter_map(|attr| {
			let key = attribute_key(&attr)?;
			let value = element.attribute(&attr)?;
			Some((key, value))
		})
		.collect();

	Some((name, properties.non_empty()))
}
