// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Minimal document model consumed by auto-tracking and auto-identify.
//!
//! Browser hosts implement [`Element`] and [`Document`] over their real DOM.
//! [`StaticElement`] and [`StaticDocument`] are an in-memory tree for
//! non-browser hosts and tests.

use std::sync::Arc;

/// A node that can carry attributes.
pub trait Element: Send + Sync {
	fn attribute(&self, name: &str) -> Option<String>;

	/// Attribute names in document order.
	fn attribute_names(&self) -> Vec<String>;

	fn text_content(&self) -> Option<String>;

	fn parent(&self) -> Option<Arc<dyn Element>>;
}

pub trait Document: Send + Sync {
	/// First element matching `selector`, if any.
	fn query_selector(&self, selector: &str) -> Option<Arc<dyn Element>>;
}

/// An immutable in-memory element.
#[derive(Debug, Clone, Default)]
pub struct StaticElement {
	tag: String,
	attributes: Vec<(String, String)>,
	text: Option<String>,
	parent: Option<Arc<StaticElement>>,
}

impl StaticElement {
	pub fn new(tag: impl Into<String>) -> Self {
		Self {
			tag: tag.into().to_ascii_lowercase(),
			..Self::default()
		}
	}

	pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		let name = name.into();
		let value = value.into();
		match self.attributes.iter_mut().find(|(existing, _)| *existing == name) {
			Some(slot) => slot.1 = value,
			None => self.attributes.push((name, value)),
		}
		self
	}

	pub fn with_text(mut self, text: impl Into<String>) -> Self {
		self.text = Some(text.into());
		self
	}

	pub fn with_parent(mut self, parent: Arc<StaticElement>) -> Self {
		self.parent = Some(parent);
		self
	}

	pub fn tag(&self) -> &str {
		&self.tag
	}

	fn matches(&self, selector: &Selector) -> bool {
		if let Some(tag) = &selector.tag {
			if *tag != self.tag {
				return false;
			}
		}
		match &selector.attribute {
			None => true,
			Some((name, None)) => self.attribute(name).is_some(),
			Some((name, Some(expected))) => self.attribute(name).as_deref() == Some(expected),
		}
	}
}

impl Element for StaticElement {
	fn attribute(&self, name: &str) -> Option<String> {
		self.attributes
			.iter()
			.find(|(existing, _)| existing == name)
			.map(|(_, value)| value.clone())
	}

	fn attribute_names(&self) -> Vec<String> {
		self.attributes.iter().map(|(name, _)| name.clone()).collect()
	}

	fn text_content(&self) -> Option<String> {
		self.text.clone()
	}

	fn parent(&self) -> Option<Arc<dyn Element>> {
		self.parent
			.as_ref()
			.map(|parent| Arc::clone(parent) as Arc<dyn Element>)
	}
}

/// A flat list of elements queried in insertion order.
#[derive(Debug, Clone, Default)]
pub struct StaticDocument {
	elements: Vec<Arc<StaticElement>>,
}

impl StaticDocument {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_element(mut self, element: StaticElement) -> Self {
		self.elements.push(Arc::new(element));
		self
	}

	pub fn push(&mut self, element: Arc<StaticElement>) {
		self.elements.push(element);
	}
}

impl Document for StaticDocument {
	/// Supports `tag`, `[attr]`, `[attr="value"]` and `tag[attr="value"]`.
	fn query_selector(&self, selector: &str) -> Option<Arc<dyn Element>> {
		let selector = Selector::parse(selector)?;
		self.elements
			.iter()
			.find(|element| element.matches(&selector))
			.map(|element| Arc::clone(element) as Arc<dyn Element>)
	}
}

#[derive(Debug, PartialEq)]
struct Selector {
	tag: Option<String>,
	attribute: Option<(String, Option<String>)>,
}

impl Selector {
	fn parse(selector: &str) -> Option<Self> {
		let selector = selector.trim();
		if selector.is_empty() {
			return None;
		}

		let (tag, rest) = match selector.find('[') {
			Some(idx) => (&selector[..idx], Some(&selector[idx..])),
			None => (selector, None),
		};
		let tag = (!tag.is_empty()).then(|| tag.to_ascii_lowercase());

		let attribute = match rest {
			None => None,
			Some(rest) => {
				let inner = rest.strip_prefix('[')?.strip_suffix(']')?;
				match inner.split_once('=') {
					None => Some((inner.trim().to_string(), None)),
					Some((name, value)) => {
						let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
						Some((name.trim().to_string(), Some(value.to_string())))
					}
				}
			}
		};

		Some(Self { tag, attribute })
	}
}
