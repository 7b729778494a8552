// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pure evaluation of a flag definition against a context.
//!
//! Evaluation walks a fixed sequence: context eligibility, QA test
//! overrides, rollout stage gating, then variant selection by hashed
//! split. Percentages arrive on a 0-100 scale and buckets live in
//! `[0, 1)`, so both gates divide by 100 before comparing.
//!
//! Everything here is synchronous and deterministic; the only side
//! effect is reporting rule-evaluation failures to the error handler.

use skein_core::{ErrorHandler, SkeinError};

use crate::hash::normalized_hash;
use crate::rules;
use crate::types::{
	value_to_string, EvaluationContext, FlagDefinition, RolloutStage, SelectedVariant, Variant,
};

/// Evaluates one flag against a context.
///
/// `None` means no assignment: the context is missing the flag's
/// context key, no rollout stage admits the hashed bucket, or the flag
/// has no variants to hand out. Callers substitute their fallback.
pub(crate) fn evaluate_flag(
	flag: &FlagDefinition,
	context: &EvaluationContext,
	error_handler: &dyn ErrorHandler,
) -> Option<SelectedVariant> {
	// Present-but-null context values stay eligible and hash as "".
	let context_value = match context.get(&flag.context_key) {
		Some(value) => value_to_string(value).unwrap_or_default(),
		None => return None,
	};

	if let Some(variant) = test_user_override(flag, context) {
		return Some(variant);
	}

	let stage = assigned_stage(flag, &context_value, context, error_handler)?;
	assigned_variant(flag, &context_value, stage)
}

/// QA override: a listed distinct id is forced onto the named variant,
/// flagged as a tester. Unknown variant names fall through to normal
/// rollout.
fn test_user_override(flag: &FlagDefinition, context: &EvaluationContext) -> Option<SelectedVariant> {
	let overrides = flag.ruleset.test.as_ref()?;
	let distinct_id = context.distinct_id()?;
	let forced_key = overrides.users.get(&distinct_id)?;
	let mut variant = variant_by_key(flag, forced_key)?;
	variant.is_qa_tester = Some(true);
	Some(variant)
}

/// Finds a variant by key, case-insensitively.
fn variant_by_key(flag: &FlagDefinition, key: &str) -> Option<SelectedVariant> {
	let wanted = rules::fold_case(key);
	let variant = flag
		.ruleset
		.variants
		.iter()
		.find(|variant| rules::fold_case(&variant.key) == wanted)?;
	Some(selected(flag, variant, None))
}

fn selected(flag: &FlagDefinition, variant: &Variant, is_qa_tester: Option<bool>) -> SelectedVariant {
	SelectedVariant {
		variant_key: Some(variant.key.clone()),
		variant_value: variant.value.clone(),
		experiment_id: flag.experiment_id.clone(),
		is_experiment_active: flag.is_experiment_active,
		is_qa_tester,
	}
}

/// First rollout stage whose population gate and runtime rule both
/// pass.
///
/// Salted flags mix the stage index into the gate hash, so each stage
/// draws an independent bucket; unsalted flags share one `rollout`
/// bucket across stages.
fn assigned_stage<'a>(
	flag: &'a FlagDefinition,
	context_value: &str,
	context: &EvaluationContext,
	error_handler: &dyn ErrorHandler,
) -> Option<&'a RolloutStage> {
	for (index, stage) in flag.ruleset.rollout.iter().enumerate() {
		let salt = match &flag.hash_salt {
			Some(hash_salt) => format!("{}{}{}", flag.key, hash_salt, index),
			None => format!("{}rollout", flag.key),
		};
		let bucket = normalized_hash(context_value, &salt);
		if bucket < stage.rollout_percentage / 100.0
			&& runtime_rule_satisfied(stage, context, error_handler)
		{
			return Some(stage);
		}
	}
	None
}

/// A stage without a rule always passes. A stage with a rule requires
/// a `custom_properties` object in the context; evaluation failures
/// count as unsatisfied after reporting.
fn runtime_rule_satisfied(
	stage: &RolloutStage,
	context: &EvaluationContext,
	error_handler: &dyn ErrorHandler,
) -> bool {
	let Some(rule) = &stage.runtime_evaluation_rule else {
		return true;
	};
	let Some(custom_properties) = context.custom_properties() else {
		return false;
	};

	let rule = rules::lowercase_rule_values(rule);
	let params = rules::lowercase_parameters(custom_properties);
	match rules::apply(&rule, &params) {
		Ok(result) => rules::is_truthy(&result),
		Err(error) => {
			error_handler.handle(&SkeinError::Rule(error.to_string()));
			false
		}
	}
}

/// Picks the variant for an admitted stage.
///
/// A stage override wins outright when it names a real variant. Split
/// hashing otherwise walks the variants in order, accumulating each
/// one's share; stage-level `variant_splits` replace a variant's share
/// only under its exact key. Splits summing under 100 leave the tail
/// buckets on the last variant.
fn assigned_variant(
	flag: &FlagDefinition,
	context_value: &str,
	stage: &RolloutStage,
) -> Option<SelectedVariant> {
	if let Some(override_) = &stage.variant_override {
		if let Some(mut variant) = variant_by_key(flag, &override_.key) {
			variant.is_qa_tester = Some(false);
			return Some(variant);
		}
	}

	let variants = &flag.ruleset.variants;
	if variants.is_empty() {
		return None;
	}

	let salt = format!("{}{}variant", flag.key, flag.hash_salt.as_deref().unwrap_or(""));
	let bucket = normalized_hash(context_value, &salt);

	let mut chosen = &variants[0];
	let mut cumulative = 0.0_f64;
	for variant in variants {
		chosen = variant;
		let split = stage
			.variant_splits
			.as_ref()
			.and_then(|splits| splits.get(&variant.key).copied())
			.or(variant.split)
			.unwrap_or(0.0);
		cumulative += split / 100.0;
		if bucket < cumulative {
			break;
		}
	}

	Some(selected(flag, chosen, Some(false)))
}
