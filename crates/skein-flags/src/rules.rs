// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Runtime evaluation rules for rollout stages.
//!
//! Rules arrive as JSON in a small predicate language: an object with
//! a single operator key applied to its arguments, nested arbitrarily.
//! `{"var": "path"}` reads from the parameter map; everything that is
//! not an operator application evaluates to itself.
//!
//! String matching is case-insensitive by construction: the evaluator's
//! callers fold the rule's string leaves with [`lowercase_rule_values`]
//! and the parameter map with [`lowercase_parameters`] before applying,
//! so both sides normalize the same way.

use std::cmp::Ordering;

use serde_json::{Map, Value};
use thiserror::Error;

/// Why a rule could not be evaluated. Callers treat any of these as an
/// unsatisfied rule after reporting it.
#[derive(Debug, Error)]
pub enum RuleError {
	#[error("unsupported operator: {0}")]
	UnsupportedOperator(String),

	#[error("malformed rule: {0}")]
	Malformed(String),
}

/// Case folding used for every string comparison in flag evaluation.
pub(crate) fn fold_case(s: &str) -> String {
	s.to_lowercase()
}

/// Lowercases every string leaf of a rule tree. Object keys, and with
/// them operator names, are left untouched.
pub(crate) fn lowercase_rule_values(value: &Value) -> Value {
	match value {
		Value::Object(map) => Value::Object(
			map.iter()
				.map(|(key, inner)| (key.clone(), lowercase_rule_values(inner)))
				.collect(),
		),
		Value::Array(items) => Value::Array(items.iter().map(lowercase_rule_values).collect()),
		Value::String(s) => Value::String(fold_case(s)),
		other => other.clone(),
	}
}

/// Lowercases both keys and string values, recursively.
pub(crate) fn lowercase_keys_and_values(value: &Value) -> Value {
	match value {
		Value::Object(map) => Value::Object(
			map.iter()
				.map(|(key, inner)| (fold_case(key), lowercase_keys_and_values(inner)))
				.collect(),
		),
		Value::Array(items) => Value::Array(items.iter().map(lowercase_keys_and_values).collect()),
		Value::String(s) => Value::String(fold_case(s)),
		other => other.clone(),
	}
}

/// Folds a parameter map for matching: keys and string values are
/// lowercased at every depth.
pub(crate) fn lowercase_parameters(params: &Map<String, Value>) -> Map<String, Value> {
	params
		.iter()
		.map(|(key, value)| (fold_case(key), lowercase_keys_and_values(value)))
		.collect()
}

/// Only `null` and `false` are falsy; `0`, `""`, `[]`, and `{}` all
/// count as truthy.
pub(crate) fn is_truthy(value: &Value) -> bool {
	!matches!(value, Value::Null | Value::Bool(false))
}

/// Evaluates `rule` against `params` and returns the resulting value.
///
/// Supported operators: `var`, `==`, `!=`, `>`, `>=`, `<`, `<=`,
/// `and`, `or`, `!`, and `in`.
pub(crate) fn apply(rule: &Value, params: &Map<String, Value>) -> Result<Value, RuleError> {
	match rule {
		Value::Object(map) => match map.iter().next() {
			Some((operator, args)) if map.len() == 1 => apply_operator(operator, args, params),
			_ => Ok(rule.clone()),
		},
		Value::Array(items) => {
			let evaluated = items
				.iter()
				.map(|item| apply(item, params))
				.collect::<Result<Vec<_>, _>>()?;
			Ok(Value::Array(evaluated))
		}
		other => Ok(other.clone()),
	}
}

fn apply_operator(
	operator: &str,
	args: &Value,
	params: &Map<String, Value>,
) -> Result<Value, RuleError> {
	if operator == "var" {
		return lookup_var(args, params);
	}

	let args = evaluate_arguments(args, params)?;
	match operator {
		"==" => binary(&args, operator).map(|(a, b)| Value::Bool(loose_eq(a, b))),
		"!=" => binary(&args, operator).map(|(a, b)| Value::Bool(!loose_eq(a, b))),
		">" | ">=" | "<" | "<=" => {
			let (a, b) = binary(&args, operator)?;
			compare(operator, a, b)
		}
		"and" => Ok(conjunction(args)),
		"or" => Ok(disjunction(args)),
		"!" => {
			let value = args.first().unwrap_or(&Value::Null);
			Ok(Value::Bool(!is_truthy(value)))
		}
		"in" => {
			let (needle, haystack) = binary(&args, operator)?;
			contains(needle, haystack)
		}
		other => Err(RuleError::UnsupportedOperator(other.to_string())),
	}
}

/// Arguments are themselves rules. A non-array argument list is a
/// single argument.
fn evaluate_arguments(args: &Value, params: &Map<String, Value>) -> Result<Vec<Value>, RuleError> {
	match args {
		Value::Array(items) => items.iter().map(|item| apply(item, params)).collect(),
		single => Ok(vec![apply(single, params)?]),
	}
}

fn binary<'a>(args: &'a [Value], operator: &str) -> Result<(&'a Value, &'a Value), RuleError> {
	match args {
		[a, b] => Ok((a, b)),
		_ => Err(RuleError::Malformed(format!(
			"operator {operator} expects two arguments, got {}",
			args.len()
		))),
	}
}

/// Equality across the JSON types, with numbers compared by numeric
/// value so `25` equals `25.0`.
fn loose_eq(a: &Value, b: &Value) -> bool {
	match (a, b) {
		(Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
		_ => a == b,
	}
}

fn compare(operator: &str, a: &Value, b: &Value) -> Result<Value, RuleError> {
	let ordering = match (a, b) {
		(Value::Number(x), Value::Number(y)) => x
			.as_f64()
			.zip(y.as_f64())
			.and_then(|(x, y)| x.partial_cmp(&y)),
		(Value::String(x), Value::String(y)) => Some(x.cmp(y)),
		_ => None,
	};
	let Some(ordering) = ordering else {
		return Err(RuleError::Malformed(format!(
			"operator {operator} cannot compare {a} and {b}"
		)));
	};
	let satisfied = match operator {
		">" => ordering == Ordering::Greater,
		">=" => ordering != Ordering::Less,
		"<" => ordering == Ordering::Less,
		_ => ordering != Ordering::Greater,
	};
	Ok(Value::Bool(satisfied))
}

/// `and` returns its first falsy argument, `or` its first truthy one;
/// otherwise the last argument wins.
fn conjunction(args: Vec<Value>) -> Value {
	let mut last = Value::Bool(true);
	for value in args {
		if !is_truthy(&value) {
			return value;
		}
		last = value;
	}
	last
}

fn disjunction(args: Vec<Value>) -> Value {
	let mut last = Value::Bool(false);
	for value in args {
		if is_truthy(&value) {
			return value;
		}
		last = value;
	}
	last
}

/// `in` is substring containment against a string haystack and
/// membership against an array haystack.
fn contains(needle: &Value, haystack: &Value) -> Result<Value, RuleError> {
	match haystack {
		Value::String(text) => match needle {
			Value::String(fragment) => Ok(Value::Bool(text.contains(fragment.as_str()))),
			other => Err(RuleError::Malformed(format!(
				"operator in cannot search a string for {other}"
			))),
		},
		Value::Array(items) => Ok(Value::Bool(items.iter().any(|item| loose_eq(item, needle)))),
		other => Err(RuleError::Malformed(format!(
			"operator in expects a string or array haystack, got {other}"
		))),
	}
}

/// `{"var": "path"}` or `{"var": ["path", default]}`. Dotted paths
/// traverse nested objects; missing paths yield the default, or null.
fn lookup_var(args: &Value, params: &Map<String, Value>) -> Result<Value, RuleError> {
	let (path, default) = match args {
		Value::Array(items) => (items.first(), items.get(1)),
		single => (Some(single), None),
	};
	let Some(Value::String(path)) = path else {
		return Err(RuleError::Malformed(format!(
			"var expects a string path, got {args}"
		)));
	};
	if path.is_empty() {
		return Ok(Value::Object(params.clone()));
	}

	let mut current: Option<&Value> = None;
	for (index, segment) in path.split('.').enumerate() {
		current = match current {
			None if index == 0 => params.get(segment),
			Some(Value::Object(map)) => map.get(segment),
			_ => None,
		};
		if current.is_none() {
			break;
		}
	}

	match current {
		Some(value) => Ok(value.clone()),
		None => Ok(default.cloned().unwrap_or(Value::Null)),
	}
}
