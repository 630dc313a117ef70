// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server-rendered identity lookup.

use crate::dom::Document;

/// Attributes consulted, in order, on the element matched by the identity selector.
pub const IDENTITY_ATTRIBUTES: [&str; 3] = ["data-beacon-user-id", "data-user-id", "content"];

/// Finds a user id rendered into the page.
///
/// The first [`IDENTITY_ATTRIBUTES`] entry present on the element is taken
/// as-is, even when empty; only when none is present does the element's
/// trimmed text apply. An empty result identifies nobody.
pub fn identity_from_document(document: &dyn Document, selector: &str) -> Option<String> {
	let element = document.query_selector(selector)?;

	let user_id = IDENTITY_ATTRIBUTES
		.iter()
		.find_map(|name| element.attribute(name))
		.or_else(|| element.text_content().map(|text| text.trim().to_string()))?;

	(!user_id.is_empty()).then_some(user_id)
}
