// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bounded FIFO of calls made before the provider is ready.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use loom_beacon_core::{Call, ProviderError, QueuedCall};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::isolation::run_isolated;

/// Default maximum number of deferred calls.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Drop-oldest queue of deferred calls with a non-reentrant flush.
pub struct CallQueue {
	capacity: usize,
	calls: Mutex<VecDeque<QueuedCall>>,
	flushing: AtomicBool,
}

impl CallQueue {
	/// Creates a queue holding at most `capacity` calls (minimum 1).
	pub fn new(capacity: usize) -> Self {
		let capacity = capacity.max(1);
		Self {
			capacity,
			calls: Mutex::new(VecDeque::with_capacity(capacity)),
			flushing: AtomicBool::new(false),
		}
	}

	/// Appends a call, evicting the oldest one when the queue is full.
	pub fn enqueue(&self, call: Call) {
		let mut calls = self.calls.lock();

		while calls.len() >= self.capacity {
			if let Some(dropped) = calls.pop_front() {
				warn!(
					method = dropped.method_name(),
					capacity = self.capacity,
					"Call queue full, dropping oldest call"
				);
			}
		}

		let method = call.method_name();
		calls.push_back(QueuedCall::new(call));
		debug!(method, queued = calls.len(), "Queued call");
	}

	/// Replays every captured call through `executor` in insertion order.
	///
	/// The buffer is swapped out before replay starts, so calls enqueued by the
	/// executor's side effects land in a fresh queue. A failing or panicking
	/// call is logged and skipped. Returns the number of calls replayed
	/// successfully; a flush already in progress makes this a no-op.
	pub fn flush<F>(&self, mut executor: F) -> usize
	where
		F: FnMut(QueuedCall) -> Result<(), ProviderError>,
	{
		if self.flushing.swap(true, Ordering::SeqCst) {
			return 0;
		}
		let _guard = FlushGuard(&self.flushing);

		let calls = std::mem::take(&mut *self.calls.lock());
		if calls.is_empty() {
			return 0;
		}

		debug!(count = calls.len(), "Flushing queued calls");

		let mut replayed = 0;
		for queued in calls {
			let method = queued.method_name();
			match run_isolated("queued call replay", || executor(queued)) {
				Some(Ok(())) => replayed += 1,
				Some(Err(e)) => warn!(method, error = %e, "Failed to replay queued call"),
				None => warn!(method, "Queued call panicked during replay"),
			}
		}
		replayed
	}

	/// Returns the number of calls currently queued.
	pub fn len(&self) -> usize {
		self.calls.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.calls.lock().is_empty()
	}

	/// Discards every pending call.
	pub fn clear(&self) {
		self.calls.lock().clear();
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	pub fn is_flushing(&self) -> bool {
		self.flushing.load(Ordering::SeqCst)
	}
}

impl Default for CallQueue {
	fn default() -> Self {
		Self::new(DEFAULT_QUEUE_CAPACITY)
	}
}

struct FlushGuard<'a>(&'a AtomicBool);

impl Drop for FlushGuard<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::SeqCst);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn event(name: &str) -> Call {
		Call::Event {
			name: name.to_string(),
			properties: None,
		}
	}

	fn event_name(queued: &QueuedCall) -> String {
		match &queued.call {
			Call::Event { name, .. } => name.clone(),
			other => panic!("unexpected call {other:?}"),
		}
	}

	fn drain(queue: &CallQueue) -> Vec<String> {
		let mut names = Vec::new();
		queue.flush(|queued| {
			names.push(event_name(&queued));
			Ok(())
		});
		names
	}

	#[test]
	fn test_enqueue_single_call() {
		let queue = CallQueue::default();
		queue.enqueue(event("test"));
		assert_eq!(queue.len(), 1);
	}

	#[test]
	fn test_overflow_caps_at_capacity() {
		let queue = CallQueue::default();
		for i in 0..105 {
			queue.enqueue(event(&format!("event{i}")));
		}
		assert_eq!(queue.len(), 100);
	}

	#[test]
	fn test_overflow_drops_oldest() {
		let queue = CallQueue::new(3);
		for i in 0..5 {
			queue.enqueue(event(&format!("event{i}")));
		}

		assert_eq!(drain(&queue), vec!["event2", "event3", "event4"]);
	}

	#[test]
	fn test_flush_preserves_order_and_empties() {
		let queue = CallQueue::default();
		queue.enqueue(event("a"));
		queue.enqueue(Call::Pageview {
			path: Some("/x".into()),
		});
		queue.enqueue(event("b"));

		let mut methods = Vec::new();
		let replayed = queue.flush(|queued| {
			methods.push(queued.method_name());
			Ok(())
		});

		assert_eq!(replayed, 3);
		assert_eq!(methods, vec!["event", "pageview", "event"]);
		assert!(queue.is_empty());
	}

	#[test]
	fn test_flush_empty_queue_is_noop() {
		let queue = CallQueue::default();
		let mut invoked = false;
		assert_eq!(
			queue.flush(|_| {
				invoked = true;
				Ok(())
			}),
			0
		);
		assert!(!invoked);
		assert!(!queue.is_flushing());
	}

	#[test]
	fn test_failed_call_does_not_abort_replay() {
		let queue = CallQueue::default();
		queue.enqueue(event("ok1"));
		queue.enqueue(event("bad"));
		queue.enqueue(event("ok2"));

		let mut seen = Vec::new();
		let replayed = queue.flush(|queued| {
			let name = event_name(&queued);
			seen.push(name.clone());
			if name == "bad" {
				Err(ProviderError::rejected("event", "nope"))
			} else {
				Ok(())
			}
		});

		assert_eq!(replayed, 2);
		assert_eq!(seen, vec!["ok1", "bad", "ok2"]);
	}

	#[test]
	fn test_panicking_call_does_not_abort_replay() {
		let queue = CallQueue::default();
		queue.enqueue(event("boom"));
		queue.enqueue(event("after"));

		let mut seen = Vec::new();
		let replayed = queue.flush(|queued| {
			let name = event_name(&queued);
			if name == "boom" {
				panic!("executor exploded");
			}
			seen.push(name);
			Ok(())
		});

		assert_eq!(replayed, 1);
		assert_eq!(seen, vec!["after"]);
		assert!(!queue.is_flushing());
	}

	#[test]
	fn test_enqueue_during_flush_lands_in_fresh_queue() {
		let queue = CallQueue::default();
		queue.enqueue(event("first"));
		queue.enqueue(event("second"));

		let mut seen = Vec::new();
		queue.flush(|queued| {
			let name = event_name(&queued);
			if name == "first" {
				queue.enqueue(event("side_effect"));
			}
			seen.push(name);
			Ok(())
		});

		assert_eq!(seen, vec!["first", "second"]);
		assert_eq!(queue.len(), 1);
		assert_eq!(drain(&queue), vec!["side_effect"]);
	}

	#[test]
	fn test_reentrant_flush_is_noop() {
		let queue = CallQueue::default();
		queue.enqueue(event("outer"));

		let mut inner_result = None;
		queue.flush(|_| {
			inner_result = Some(queue.flush(|_| Ok(())));
			Ok(())
		});

		assert_eq!(inner_result, Some(0));
	}

	#[test]
	fn test_clear_discards_pending() {
		let queue = CallQueue::default();
		queue.enqueue(event("a"));
		queue.enqueue(event("b"));
		queue.clear();
		assert_eq!(queue.len(), 0);
	}

	#[test]
	fn test_zero_capacity_is_raised_to_one() {
		let queue = CallQueue::new(0);
		queue.enqueue(event("a"));
		queue.enqueue(event("b"));
		assert_eq!(queue.capacity(), 1);
		assert_eq!(drain(&queue), vec!["b"]);
	}

	proptest! {
		#[test]
		fn retains_most_recent_calls_in_order(capacity in 1..50usize, submitted in 0..150usize) {
			let queue = CallQueue::new(capacity);
			for i in 0..submitted {
				queue.enqueue(event(&i.to_string()));
			}

			prop_assert_eq!(queue.len(), submitted.min(capacity));

			let expected: Vec<String> = (submitted.saturating_sub(capacity)..submitted)
				.map(|i| i.to_string())
				.collect();
			prop_assert_eq!(drain(&queue), expected);
		}
	}
}
