// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event properties, scalar property values and global-property merging.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A scalar property value: the only shape allowed for global properties and
/// for values lifted out of the data layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
	Bool(bool),
	Integer(i64),
	Float(f64),
	String(String),
}

impl PropertyValue {
	/// Extracts a scalar from a JSON value, ignoring arrays, objects and null.
	pub fn from_json(value: &Value) -> Option<Self> {
		match value {
			Value::Bool(b) => Some(Self::Bool(*b)),
			Value::Number(n) => n
				.as_i64()
				.map(Self::Integer)
				.or_else(|| n.as_f64().map(Self::Float)),
			Value::String(s) => Some(Self::String(s.clone())),
			_ => None,
		}
	}
}

impl From<PropertyValue> for Value {
	fn from(value: PropertyValue) -> Self {
		match value {
			PropertyValue::Bool(b) => Value::Bool(b),
			PropertyValue::Integer(i) => Value::from(i),
			PropertyValue::Float(f) => Value::from(f),
			PropertyValue::String(s) => Value::String(s),
		}
	}
}

impl From<&str> for PropertyValue {
	fn from(value: &str) -> Self {
		Self::String(value.to_string())
	}
}

impl From<String> for PropertyValue {
	fn from(value: String) -> Self {
		Self::String(value)
	}
}

impl From<bool> for PropertyValue {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<i64> for PropertyValue {
	fn from(value: i64) -> Self {
		Self::Integer(value)
	}
}

impl From<i32> for PropertyValue {
	fn from(value: i32) -> Self {
		Self::Integer(value.into())
	}
}

impl From<u32> for PropertyValue {
	fn from(value: u32) -> Self {
		Self::Integer(value.into())
	}
}

impl From<f64> for PropertyValue {
	fn from(value: f64) -> Self {
		Self::Float(value)
	}
}

/// Global properties merged into every event sent through `Beacon::event`.
pub type GlobalProperties = BTreeMap<String, PropertyValue>;

/// A property bag attached to an event, or the traits attached to a user.
///
/// # Example
///
/// ```
/// use loom_beacon_core::Properties;
///
/// let props = Properties::new()
///     .insert("button", "hero")
///     .insert("price", 99.99)
///     .insert("is_premium", true);
/// assert_eq!(props.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties {
	inner: Map<String, Value>,
}

impl Properties {
	/// Creates a new empty Properties builder.
	pub fn new() -> Self {
		Self { inner: Map::new() }
	}

	/// Inserts a key-value pair into the properties.
	pub fn insert<K, V>(mut self, key: K, value: V) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		self.inner.insert(key.into(), value.into());
		self
	}

	/// Inserts the value only when present.
	pub fn insert_some<K, V>(self, key: K, value: Option<V>) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		match value {
			Some(value) => self.insert(key, value),
			None => self,
		}
	}

	/// Inserts in place.
	pub fn set<K, V>(&mut self, key: K, value: V)
	where
		K: Into<String>,
		V: Into<Value>,
	{
		self.inner.insert(key.into(), value.into());
	}

	/// Removes a key, returning its previous value.
	pub fn remove(&mut self, key: &str) -> Option<Value> {
		self.inner.remove(key)
	}

	/// Merges another Properties into this one.
	///
	/// If both contain the same key, the value from `other` takes precedence.
	pub fn merge(mut self, other: Properties) -> Self {
		for (k, v) in other.inner {
			self.inner.insert(k, v);
		}
		self
	}

	/// Returns true if the properties are empty.
	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	/// Returns the number of properties.
	pub fn len(&self) -> usize {
		self.inner.len()
	}

	/// Gets a value by key.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.inner.get(key)
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.inner.contains_key(key)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
		self.inner.iter()
	}

	/// Returns `None` for an empty bag so callers never send `{}`.
	pub fn non_empty(self) -> Option<Self> {
		if self.is_empty() {
			None
		} else {
			Some(self)
		}
	}

	/// Converts the properties into a `serde_json::Value`.
	pub fn into_value(self) -> Value {
		Value::Object(self.inner)
	}
}

impl From<Properties> for Value {
	fn from(props: Properties) -> Self {
		props.into_value()
	}
}

impl From<Value> for Properties {
	fn from(value: Value) -> Self {
		match value {
			Value::Object(map) => Self { inner: map },
			_ => Self::new(),
		}
	}
}

impl From<Map<String, Value>> for Properties {
	fn from(map: Map<String, Value>) -> Self {
		Self { inner: map }
	}
}

impl From<&GlobalProperties> for Properties {
	fn from(globals: &GlobalProperties) -> Self {
		globals
			.iter()
			.map(|(k, v)| (k.clone(), Value::from(v.clone())))
			.collect()
	}
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Properties {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self {
			inner: iter
				.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		}
	}
}

/// Merges global properties underneath per-call properties.
///
/// Per-call keys win on collision. The result is absent only when there are
/// no globals and the caller passed nothing; a caller-supplied bag is passed
/// through untouched when there are no globals.
pub fn merge_global(
	globals: &GlobalProperties,
	properties: Option<Properties>,
) -> Option<Properties> {
	match (globals.is_empty(), properties) {
		(true, properties) => properties,
		(false, None) => Some(Properties::from(globals)),
		(false, Some(properties)) => Some(Properties::from(globals).merge(properties)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn globals(pairs: &[(&str, &str)]) -> GlobalProperties {
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), PropertyValue::from(*v)))
			.collect()
	}

	#[test]
	fn test_properties_new_is_empty() {
		let props = Properties::new();
		assert!(props.is_empty());
		assert_eq!(props.len(), 0);
	}

	#[test]
	fn test_properties_insert_some_skips_none() {
		let props = Properties::new()
			.insert_some("currency", Some("CZK"))
			.insert_some::<_, f64>("value", None);

		assert_eq!(props.len(), 1);
		assert_eq!(props.get("currency"), Some(&Value::String("CZK".to_string())));
	}

	#[test]
	fn test_properties_merge_other_wins() {
		let props1 = Properties::new().insert("a", 1).insert("b", 2);
		let props2 = Properties::new().insert("b", 20).insert("c", 3);

		let merged = props1.merge(props2);

		assert_eq!(merged.len(), 3);
		assert_eq!(merged.get("b"), Some(&Value::Number(20.into())));
	}

	#[test]
	fn test_non_empty_collapses_empty_bag() {
		assert!(Properties::new().non_empty().is_none());
		assert!(Properties::new().insert("k", "v").non_empty().is_some());
	}

	#[test]
	fn test_properties_from_non_object_value() {
		let props = Properties::from(Value::String("not an object".to_string()));
		assert!(props.is_empty());
	}

	#[test]
	fn test_merge_global_absent_when_both_empty() {
		assert_eq!(merge_global(&GlobalProperties::new(), None), None);
	}

	#[test]
	fn test_merge_global_passes_through_without_globals() {
		let props = Properties::new();
		assert_eq!(
			merge_global(&GlobalProperties::new(), Some(props.clone())),
			Some(props)
		);
	}

	#[test]
	fn test_merge_global_uses_globals_when_call_has_none() {
		let merged = merge_global(&globals(&[("site", "a")]), None).unwrap();
		assert_eq!(merged.get("site"), Some(&Value::String("a".to_string())));
	}

	#[test]
	fn test_merge_global_combines_site_env_and_call_props() {
		let g = globals(&[("site", "a"), ("env", "prod")]);
		let merged = merge_global(&g, Some(Properties::new().insert("button", "hero"))).unwrap();

		assert_eq!(
			merged.into_value(),
			serde_json::json!({"site": "a", "env": "prod", "button": "hero"})
		);
	}

	#[test]
	fn test_merge_global_call_overrides_global() {
		let g = globals(&[("env", "prod")]);
		let merged = merge_global(&g, Some(Properties::new().insert("env", "staging"))).unwrap();
		assert_eq!(merged.get("env"), Some(&Value::String("staging".to_string())));
	}

	#[test]
	fn test_property_value_from_json_rejects_compound() {
		assert_eq!(PropertyValue::from_json(&serde_json::json!([1, 2])), None);
		assert_eq!(PropertyValue::from_json(&serde_json::json!({"a": 1})), None);
		assert_eq!(PropertyValue::from_json(&Value::Null), None);
		assert_eq!(
			PropertyValue::from_json(&serde_json::json!(3)),
			Some(PropertyValue::Integer(3))
		);
		assert_eq!(
			PropertyValue::from_json(&serde_json::json!(1.5)),
			Some(PropertyValue::Float(1.5))
		);
	}

	#[test]
	fn test_property_value_deserializes_untagged() {
		let parsed: GlobalProperties =
			serde_json::from_str(r#"{"a": true, "b": 2, "c": 2.5, "d": "x"}"#).unwrap();
		assert_eq!(parsed["a"], PropertyValue::Bool(true));
		assert_eq!(parsed["b"], PropertyValue::Integer(2));
		assert_eq!(parsed["c"], PropertyValue::Float(2.5));
		assert_eq!(parsed["d"], PropertyValue::String("x".to_string()));
	}

	proptest! {
		#[test]
		fn merged_contains_every_key_with_call_precedence(
			global_keys in proptest::collection::btree_set("[a-z]{1,6}", 1..8),
			call_keys in proptest::collection::btree_set("[a-z]{1,6}", 0..8),
		) {
			let g: GlobalProperties = global_keys
				.iter()
				.map(|k| (k.clone(), PropertyValue::from("global")))
				.collect();
			let call: Properties = call_keys.iter().map(|k| (k.clone(), "call")).collect();

			let merged = merge_global(&g, Some(call)).unwrap();

			let expected_len = global_keys.union(&call_keys).count();
			prop_assert_eq!(merged.len(), expected_len);
			for key in &call_keys {
				prop_assert_eq!(merged.get(key), Some(&Value::String("call".to_string())));
			}
			for key in global_keys.difference(&call_keys) {
				prop_assert_eq!(merged.get(key), Some(&Value::String("global".to_string())));
			}
		}
	}
}
