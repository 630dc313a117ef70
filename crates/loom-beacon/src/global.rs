// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Process-wide default beacon.
//!
//! Prefer passing a [`Beacon`] explicitly; this accessor exists for call sites
//! that cannot thread one through.

use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::beacon::Beacon;

static GLOBAL: OnceLock<Mutex<Option<Beacon>>> = OnceLock::new();

fn slot() -> &'static Mutex<Option<Beacon>> {
	GLOBAL.get_or_init(|| Mutex::new(None))
}

/// Returns the default beacon, creating it on first use.
pub fn global() -> Beacon {
	slot().lock().get_or_insert_with(Beacon::new).clone()
}

/// Destroys and drops the default beacon. The next [`global`] call creates a
/// fresh one.
pub fn reset_global() {
	let previous = slot().lock().take();
	if let Some(beacon) = previous {
		beacon.destroy();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	// Both assertions share the process-wide slot, so they live in one test.
	#[test]
	fn test_global_lifecycle() {
		reset_global();

		let first = global();
		first.set_global_property("k", "v");
		assert!(global().global_properties().contains_key("k"));

		reset_global();
		assert!(first.global_properties().is_empty());
		assert!(global().global_properties().is_empty());

		reset_global();
	}
}
