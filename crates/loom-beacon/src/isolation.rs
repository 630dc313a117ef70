// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-callback failure boundary.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::warn;

/// Runs `f`, catching a panic so sibling callbacks still run.
///
/// Returns `None` when `f` panicked; the panic is logged under `context`.
pub(crate) fn run_isolated<R>(context: &'static str, f: impl FnOnce() -> R) -> Option<R> {
	match panic::catch_unwind(AssertUnwindSafe(f)) {
		Ok(value) => Some(value),
		Err(payload) => {
			warn!(
				context,
				panic = %panic_message(payload.as_ref()),
				"Callback panicked"
			);
			None
		}
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(s) = payload.downcast_ref::<&str>() {
		(*s).to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"<non-string panic payload>".to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_returns_value_when_no_panic() {
		assert_eq!(run_isolated("test", || 7), Some(7));
	}

	#[test]
	fn test_catches_panic() {
		let result: Option<()> = run_isolated("test", || panic!("listener blew up"));
		assert!(result.is_none());
	}

	#[test]
	fn test_panic_message_variants() {
		let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
		assert_eq!(panic_message(owned.as_ref()), "owned");

		let borrowed: Box<dyn Any + Send> = Box::new("static");
		assert_eq!(panic_message(borrowed.as_ref()), "static");

		let other: Box<dyn Any + Send> = Box::new(42u8);
		assert_eq!(panic_message(other.as_ref()), "<non-string panic payload>");
	}
}
