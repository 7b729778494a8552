// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wire types for flag definitions and evaluation results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use skein_core::Properties;

/// Value carried by a flag variant.
///
/// The wire format does not constrain variant payloads, so this is a
/// sum over the JSON scalar shapes plus a catch-all for arrays and
/// objects. Numbers keep their integer-ness through serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariantValue {
	Bool(bool),
	String(String),
	Number(Number),
	Json(Value),
}

impl VariantValue {
	/// True only for the boolean `true` payload. `"true"` and `1` do
	/// not count.
	pub fn is_true(&self) -> bool {
		matches!(self, VariantValue::Bool(true))
	}
}

impl Default for VariantValue {
	fn default() -> Self {
		VariantValue::Json(Value::Null)
	}
}

impl From<bool> for VariantValue {
	fn from(value: bool) -> Self {
		VariantValue::Bool(value)
	}
}

impl From<&str> for VariantValue {
	fn from(value: &str) -> Self {
		VariantValue::String(value.to_string())
	}
}

impl From<String> for VariantValue {
	fn from(value: String) -> Self {
		VariantValue::String(value)
	}
}

impl From<i64> for VariantValue {
	fn from(value: i64) -> Self {
		VariantValue::Number(Number::from(value))
	}
}

impl From<f64> for VariantValue {
	fn from(value: f64) -> Self {
		match Number::from_f64(value) {
			Some(number) => VariantValue::Number(number),
			None => VariantValue::Json(Value::Null),
		}
	}
}

impl From<Value> for VariantValue {
	fn from(value: Value) -> Self {
		match value {
			Value::Bool(b) => VariantValue::Bool(b),
			Value::String(s) => VariantValue::String(s),
			Value::Number(n) => VariantValue::Number(n),
			other => VariantValue::Json(other),
		}
	}
}

impl From<VariantValue> for Value {
	fn from(value: VariantValue) -> Self {
		match value {
			VariantValue::Bool(b) => Value::Bool(b),
			VariantValue::String(s) => Value::String(s),
			VariantValue::Number(n) => Value::Number(n),
			VariantValue::Json(v) => v,
		}
	}
}

/// Outcome of a flag evaluation.
///
/// A fallback result carries only `variant_value`; a real assignment
/// also names the variant and, when the flag belongs to an experiment,
/// its experiment metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectedVariant {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub variant_key: Option<String>,
	#[serde(default)]
	pub variant_value: VariantValue,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub experiment_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub is_experiment_active: Option<bool>,
	/// Set for local assignments: `true` when a QA test-user override
	/// chose the variant, `false` otherwise. Remote results leave it
	/// unset.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub is_qa_tester: Option<bool>,
}

impl SelectedVariant {
	/// Fallback result carrying only a value, used when evaluation
	/// cannot produce a real assignment.
	pub fn fallback(value: impl Into<VariantValue>) -> Self {
		Self {
			variant_value: value.into(),
			..Self::default()
		}
	}
}

/// Inputs for a flag evaluation.
///
/// A flat JSON object. `distinct_id` addresses the user; each flag
/// names the context field it hashes on; runtime evaluation rules read
/// the nested `custom_properties` object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationContext {
	fields: Map<String, Value>,
}

impl EvaluationContext {
	/// Context for the given user.
	pub fn new(distinct_id: impl Into<String>) -> Self {
		Self::default().with_field("distinct_id", distinct_id.into())
	}

	/// Adds an arbitrary context field, replacing any existing value.
	pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.fields.insert(key.into(), value.into());
		self
	}

	/// Sets the `custom_properties` object consumed by runtime
	/// evaluation rules.
	pub fn with_custom_properties(self, properties: Properties) -> Self {
		self.with_field("custom_properties", properties.into_value())
	}

	/// Returns the raw value stored under `key`, if any.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.fields.get(key)
	}

	/// The `distinct_id` field rendered as a string. `None` when the
	/// field is absent or null.
	pub fn distinct_id(&self) -> Option<String> {
		self.fields.get("distinct_id").and_then(value_to_string)
	}

	/// The nested `custom_properties` map, when present and an object.
	pub fn custom_properties(&self) -> Option<&Map<String, Value>> {
		self.fields.get("custom_properties").and_then(Value::as_object)
	}

	/// Compact JSON rendering of the whole context.
	pub(crate) fn to_json_string(&self) -> String {
		Value::Object(self.fields.clone()).to_string()
	}
}

/// Renders a context value the way hashing and test-user lookup see
/// it. Strings pass through, other values render as compact JSON, and
/// null counts as absent.
pub(crate) fn value_to_string(value: &Value) -> Option<String> {
	match value {
		Value::Null => None,
		Value::String(s) => Some(s.clone()),
		other => Some(other.to_string()),
	}
}

/// Server-side definition of a single flag.
///
/// Extra fields in the wire payload (ids, display names, statuses) are
/// ignored on deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagDefinition {
	/// Flag key, unique per project.
	pub key: String,
	/// Context field whose value this flag hashes on, e.g.
	/// `distinct_id`. Contexts without the field are ineligible.
	#[serde(rename = "context")]
	pub context_key: String,
	/// Extra salt mixed into every hash for this flag. Changing it
	/// reshuffles all assignments.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub hash_salt: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub experiment_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub is_experiment_active: Option<bool>,
	#[serde(default)]
	pub ruleset: Ruleset,
}

/// Variants plus the rollout stages that assign them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ruleset {
	#[serde(default)]
	pub variants: Vec<Variant>,
	#[serde(default)]
	pub rollout: Vec<RolloutStage>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub test: Option<TestOverrides>,
}

/// One assignable variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
	pub key: String,
	#[serde(default)]
	pub value: VariantValue,
	/// Share of hashed traffic, in percent. Missing means zero.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub split: Option<f64>,
}

/// One gate in a flag's rollout sequence. Stages are tried in order;
/// the first whose gate and rule both pass assigns the variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RolloutStage {
	/// Share of the population admitted, in percent. The bucket must
	/// be strictly below this share.
	#[serde(default)]
	pub rollout_percentage: f64,
	/// Forces a variant by key, bypassing split hashing.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub variant_override: Option<VariantOverride>,
	/// Per-variant split replacements in percent, keyed by exact
	/// variant key.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub variant_splits: Option<HashMap<String, f64>>,
	/// Predicate over the context's `custom_properties` that must also
	/// pass for this stage to assign.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub runtime_evaluation_rule: Option<Value>,
}

/// Variant forced by a rollout stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantOverride {
	pub key: String,
}

/// QA overrides mapping distinct ids to variant keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestOverrides {
	#[serde(default)]
	pub users: HashMap<String, String>,
}
