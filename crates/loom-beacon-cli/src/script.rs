// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! JSON-lines input files.
//!
//! Blank lines and lines starting with `#` are skipped.

use anyhow::{Context, Result};
use loom_beacon_core::Call;
use serde::de::DeserializeOwned;
use serde_json::Value;

fn parse_lines<T: DeserializeOwned>(contents: &str) -> Result<Vec<T>> {
	contents
		.lines()
		.enumerate()
		.map(|(index, line)| (index + 1, line.trim()))
		.filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
		.map(|(number, line)| {
			serde_json::from_str(line).with_context(|| format!("line {number}: invalid JSON entry"))
		})
		.collect()
}

/// Parses a call script, one tagged [`Call`] per line.
pub fn parse_calls(contents: &str) -> Result<Vec<Call>> {
	parse_lines(contents)
}

/// Parses data-layer entries, one JSON value per line.
pub fn parse_data_layer(contents: &str) -> Result<Vec<Value>> {
	parse_lines(contents)
}
