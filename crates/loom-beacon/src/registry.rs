// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event listener registry with per-listener failure isolation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use loom_beacon_core::{Properties, Unsubscribe};
use parking_lot::Mutex;

use crate::isolation::run_isolated;

/// Observes every event passed to `Beacon::event`, queued or not, with the
/// merged properties.
pub type EventListener = Arc<dyn Fn(&str, Option<&Properties>) + Send + Sync>;

/// Fired once when the beacon becomes ready.
pub type ReadyCallback = Box<dyn FnOnce() + Send>;

/// Ordered set of event listeners.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
	next_id: AtomicU64,
	listeners: Mutex<Vec<(u64, EventListener)>>,
}

impl ListenerRegistry {
	/// Registers a listener and returns the capability that removes exactly it.
	pub(crate) fn subscribe(self: &Arc<Self>, listener: EventListener) -> Unsubscribe {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		self.listeners.lock().push((id, listener));

		let registry: Weak<Self> = Arc::downgrade(self);
		Unsubscribe::new(move || {
			if let Some(registry) = registry.upgrade() {
				registry.remove(id);
			}
		})
	}

	fn remove(&self, id: u64) {
		self.listeners.lock().retain(|(existing, _)| *existing != id);
	}

	/// Calls every listener in registration order.
	///
	/// Listeners run against a snapshot taken before the first call, without
	/// the registry lock held, so they may subscribe, unsubscribe or emit.
	pub(crate) fn notify(&self, name: &str, properties: Option<&Properties>) {
		let snapshot: Vec<EventListener> = self
			.listeners
			.lock()
			.iter()
			.map(|(_, listener)| Arc::clone(listener))
			.collect();

		for listener in snapshot {
			run_isolated("event listener", || listener(name, properties));
		}
	}

	pub(crate) fn clear(&self) {
		self.listeners.lock().clear();
	}

	pub(crate) fn len(&self) -> usize {
		self.listeners.lock().len()
	}
}
