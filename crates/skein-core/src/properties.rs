// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Builder for event, profile, and group property maps.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

/// Timestamps inside property maps use this format, in UTC.
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// JSON object under construction.
///
/// Later inserts win. Consume with [`Properties::into_value`] when
/// handing the map to a tracker or consumer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
	inner: Map<String, Value>,
}

impl Properties {
	/// Creates an empty property map.
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts a key/value pair, replacing any existing value.
	pub fn insert<K, V>(mut self, key: K, value: V) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		self.inner.insert(key.into(), value.into());
		self
	}

	/// Inserts a timestamp rendered in the API's expected format.
	///
	/// The value is normalized to UTC before formatting, so
	/// offset-carrying datetimes serialize to the same instant.
	pub fn insert_time<K, Tz>(self, key: K, value: DateTime<Tz>) -> Self
	where
		K: Into<String>,
		Tz: TimeZone,
	{
		let formatted = value.with_timezone(&Utc).format(TIME_FORMAT).to_string();
		self.insert(key, formatted)
	}

	/// Merges `other` into `self`; keys from `other` win on conflict.
	pub fn merge(mut self, other: Properties) -> Self {
		for (key, value) in other.inner {
			self.inner.insert(key, value);
		}
		self
	}

	/// Returns the value stored under `key`, if any.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.inner.get(key)
	}

	/// Number of keys in the map.
	pub fn len(&self) -> usize {
		self.inner.len()
	}

	/// True when no keys have been inserted.
	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	/// Borrows the underlying map.
	pub fn as_map(&self) -> &Map<String, Value> {
		&self.inner
	}

	/// Consumes the builder, producing a JSON object.
	pub fn into_value(self) -> Value {
		Value::Object(self.inner)
	}
}

impl From<Map<String, Value>> for Properties {
	fn from(inner: Map<String, Value>) -> Self {
		Self { inner }
	}
}

impl From<Properties> for Value {
	fn from(properties: Properties) -> Self {
		properties.into_value()
	}
}

/// JSON objects convert to their map; any other value yields an empty
/// map.
impl From<Value> for Properties {
	fn from(value: Value) -> Self {
		match value {
			Value::Object(inner) => Self { inner },
			_ => Self::default(),
		}
	}
}

impl<K, V> FromIterator<(K, V)> for Properties
where
	K: Into<String>,
	V: Into<Value>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		let inner = iter
			.into_iter()
			.map(|(key, value)| (key.into(), value.into()))
			.collect();
		Self { inner }
	}
}
