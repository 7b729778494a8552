// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Local flag evaluation against polled definitions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use skein_core::{Result, SharedErrorHandler, SharedEventSink};

use crate::cache::DefinitionCache;
use crate::config::LocalFlagsConfig;
use crate::engine;
use crate::poller::{self, DefinitionPoller};
use crate::provider::{EvaluationMode, FlagsEndpoint};
use crate::types::{EvaluationContext, SelectedVariant, VariantValue};

/// Evaluates flags in-process against a cached definition set.
///
/// Definitions are fetched from the flags API and refreshed by a
/// background poller; every evaluation is then a pure in-memory
/// computation. Before the first successful fetch, every lookup
/// returns its fallback.
pub struct LocalFlagsProvider {
	endpoint: Arc<FlagsEndpoint>,
	config: LocalFlagsConfig,
	cache: DefinitionCache,
	poller: Mutex<DefinitionPoller>,
	error_handler: SharedErrorHandler,
}

impl LocalFlagsProvider {
	/// Provider for `token`. Exposure events go to `event_sink`;
	/// swallowed errors go to `error_handler`. Pass the NoOp
	/// implementations to disable either.
	pub fn new(
		token: impl Into<String>,
		config: LocalFlagsConfig,
		event_sink: SharedEventSink,
		error_handler: SharedErrorHandler,
	) -> Result<Self> {
		let endpoint = FlagsEndpoint::new(
			token.into(),
			config.api_host.clone(),
			config.request_timeout(),
			EvaluationMode::Local,
			event_sink,
			Arc::clone(&error_handler),
		)?;
		Ok(Self {
			endpoint: Arc::new(endpoint),
			config,
			cache: DefinitionCache::new(),
			poller: Mutex::new(DefinitionPoller::new()),
			error_handler,
		})
	}

	/// Fetches definitions immediately, then keeps them fresh in the
	/// background when polling is enabled.
	///
	/// Safe to call again: an already-running poller is left alone and
	/// only the immediate refresh happens.
	pub async fn start_polling(&self) {
		poller::refresh_once(&self.endpoint, &self.cache, &self.error_handler).await;
		if !self.config.enable_polling {
			return;
		}
		let mut poller = self.poller.lock().await;
		poller.start(
			self.config.polling_interval(),
			Arc::clone(&self.endpoint),
			self.cache.clone(),
			Arc::clone(&self.error_handler),
		);
	}

	/// Stops background polling and waits for the loop to exit.
	/// Cached definitions keep serving.
	pub async fn stop_polling(&self) {
		self.poller.lock().await.stop().await;
	}

	/// Evaluates `flag_key` for `context`.
	///
	/// Returns `fallback` when the flag is unknown, the context lacks
	/// the flag's context key, or no rollout stage admits the hashed
	/// bucket. Exposure is reported only for real assignments, and
	/// only when `report_exposure` is set.
	pub async fn get_variant(
		&self,
		flag_key: &str,
		fallback: SelectedVariant,
		context: &EvaluationContext,
		report_exposure: bool,
	) -> SelectedVariant {
		let definitions = self.cache.snapshot().await;
		let Some(flag) = definitions.get(flag_key) else {
			debug!(flag_key, "flag not in cached definitions");
			return fallback;
		};

		match engine::evaluate_flag(flag, context, self.error_handler.as_ref()) {
			Some(variant) => {
				if report_exposure {
					self.endpoint.track_exposure(flag_key, &variant, context, None).await;
				}
				variant
			}
			None => fallback,
		}
	}

	/// Like [`LocalFlagsProvider::get_variant`], returning only the
	/// value.
	pub async fn get_variant_value(
		&self,
		flag_key: &str,
		fallback_value: impl Into<VariantValue>,
		context: &EvaluationContext,
		report_exposure: bool,
	) -> VariantValue {
		self.get_variant(
			flag_key,
			SelectedVariant::fallback(fallback_value),
			context,
			report_exposure,
		)
		.await
		.variant_value
	}

	/// True when the flag evaluates to the boolean `true`. Reports
	/// exposure for real assignments.
	pub async fn is_enabled(&self, flag_key: &str, context: &EvaluationContext) -> bool {
		self.get_variant_value(flag_key, false, context, true).await.is_true()
	}

	/// Evaluates every cached flag against one definition snapshot.
	/// Flags that do not assign are omitted. Never reports exposure.
	pub async fn get_all_variants(
		&self,
		context: &EvaluationContext,
	) -> HashMap<String, SelectedVariant> {
		let definitions = self.cache.snapshot().await;
		let mut variants = HashMap::with_capacity(definitions.len());
		for (key, flag) in definitions.iter() {
			if let Some(variant) = engine::evaluate_flag(flag, context, self.error_handler.as_ref())
			{
				variants.insert(key.clone(), variant);
			}
		}
		variants
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use serde_json::{json, Value};
	use wiremock::matchers::{header, header_exists, method, path, query_param};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	use skein_core::{NoOpErrorHandler, NoOpEventSink, SkeinError};

	use super::*;
	use crate::provider::EXPOSURE_EVENT;
	use crate::testutil::{RecordingHandler, RecordingSink};

	/// Flag "test_flag" hashing on distinct_id, 50/50
	/// control/treatment, full rollout, one QA user. The wire payload
	/// carries the extra server fields on purpose.
	fn test_flag() -> Value {
		json!({
			"id": 1,
			"name": "Test Flag",
			"status": "active",
			"project_id": 123,
			"key": "test_flag",
			"context": "distinct_id",
			"ruleset": {
				"variants": [
					{"key": "control", "value": "control_value", "split": 50.0, "is_control": true},
					{"key": "treatment", "value": "treatment_value", "split": 50.0}
				],
				"rollout": [{"rollout_percentage": 100.0}],
				"test": {"users": {"qa_user": "treatment"}}
			}
		})
	}

	async fn mount_definitions(server: &MockServer, flags: Vec<Value>) {
		Mock::given(method("GET"))
			.and(path("/flags/definitions"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"flags": flags})))
			.mount(server)
			.await;
	}

	fn config_for(server: &MockServer) -> LocalFlagsConfig {
		LocalFlagsConfig {
			api_host: server.uri(),
			enable_polling: false,
			..LocalFlagsConfig::default()
		}
	}

	fn provider_with(
		config: LocalFlagsConfig,
		sink: SharedEventSink,
		handler: SharedErrorHandler,
	) -> LocalFlagsProvider {
		LocalFlagsProvider::new("test_token", config, sink, handler).unwrap()
	}

	async fn started_provider(server: &MockServer) -> LocalFlagsProvider {
		let provider = provider_with(
			config_for(server),
			Arc::new(NoOpEventSink),
			Arc::new(NoOpErrorHandler),
		);
		provider.start_polling().await;
		provider
	}

	fn ctx(distinct_id: &str) -> EvaluationContext {
		EvaluationContext::new(distinct_id)
	}

	fn fallback() -> SelectedVariant {
		SelectedVariant::fallback("fallback_value")
	}

	#[tokio::test]
	async fn returns_fallback_before_any_fetch() {
		let server = MockServer::start().await;
		mount_definitions(&server, vec![test_flag()]).await;
		let provider = provider_with(
			config_for(&server),
			Arc::new(NoOpEventSink),
			Arc::new(NoOpErrorHandler),
		);

		let result = provider.get_variant("test_flag", fallback(), &ctx("user123"), false).await;
		assert_eq!(result, fallback());
	}

	#[tokio::test]
	async fn fetch_failure_reports_and_serves_fallback() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/flags/definitions"))
			.respond_with(ResponseTemplate::new(500).set_body_string("upstream sad"))
			.mount(&server)
			.await;
		let handler = Arc::new(RecordingHandler::default());
		let provider = provider_with(config_for(&server), Arc::new(NoOpEventSink), handler.clone());

		provider.start_polling().await;

		let errors = handler.errors.lock().unwrap().len();
		assert_eq!(errors, 1);
		assert!(matches!(
			handler.errors.lock().unwrap()[0],
			SkeinError::Server(_)
		));
		let result = provider.get_variant("test_flag", fallback(), &ctx("user123"), false).await;
		assert_eq!(result, fallback());
	}

	#[tokio::test]
	async fn unparseable_definitions_report_and_serve_fallback() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/flags/definitions"))
			.respond_with(ResponseTemplate::new(200).set_body_string("not json"))
			.mount(&server)
			.await;
		let handler = Arc::new(RecordingHandler::default());
		let provider = provider_with(config_for(&server), Arc::new(NoOpEventSink), handler.clone());

		provider.start_polling().await;

		assert!(matches!(
			handler.errors.lock().unwrap()[0],
			SkeinError::Server(_)
		));
	}

	#[tokio::test]
	async fn assigns_variants_by_hash_after_fetch() {
		let server = MockServer::start().await;
		mount_definitions(&server, vec![test_flag()]).await;
		let provider = started_provider(&server).await;

		// user123 buckets at 0.62, carol at 0.38.
		let result = provider.get_variant("test_flag", fallback(), &ctx("user123"), false).await;
		assert_eq!(result.variant_key.as_deref(), Some("treatment"));
		assert_eq!(result.variant_value, VariantValue::from("treatment_value"));

		let result = provider.get_variant("test_flag", fallback(), &ctx("carol"), false).await;
		assert_eq!(result.variant_key.as_deref(), Some("control"));
	}

	#[tokio::test]
	async fn unknown_flag_returns_fallback() {
		let server = MockServer::start().await;
		mount_definitions(&server, vec![test_flag()]).await;
		let provider = started_provider(&server).await;

		let result = provider.get_variant("other_flag", fallback(), &ctx("user123"), false).await;
		assert_eq!(result, fallback());
	}

	#[tokio::test]
	async fn context_without_flag_context_key_returns_fallback() {
		let server = MockServer::start().await;
		let mut flag = test_flag();
		flag["context"] = json!("company_id");
		mount_definitions(&server, vec![flag]).await;
		let provider = started_provider(&server).await;

		let result = provider.get_variant("test_flag", fallback(), &ctx("user123"), false).await;
		assert_eq!(result, fallback());
	}

	#[tokio::test]
	async fn test_user_gets_forced_variant() {
		let server = MockServer::start().await;
		mount_definitions(&server, vec![test_flag()]).await;
		let provider = started_provider(&server).await;

		let result = provider.get_variant("test_flag", fallback(), &ctx("qa_user"), false).await;
		assert_eq!(result.variant_key.as_deref(), Some("treatment"));
		assert_eq!(result.is_qa_tester, Some(true));
	}

	#[tokio::test]
	async fn zero_percent_rollout_returns_fallback() {
		let server = MockServer::start().await;
		let mut flag = test_flag();
		flag["ruleset"]["rollout"] = json!([{"rollout_percentage": 0.0}]);
		mount_definitions(&server, vec![flag]).await;
		let provider = started_provider(&server).await;

		let result = provider.get_variant("test_flag", fallback(), &ctx("user123"), false).await;
		assert_eq!(result, fallback());
	}

	#[tokio::test]
	async fn variant_splits_reroute_traffic() {
		let server = MockServer::start().await;
		let mut flag = test_flag();
		flag["ruleset"]["rollout"] = json!([{
			"rollout_percentage": 100.0,
			"variant_splits": {"control": 0.0, "treatment": 100.0}
		}]);
		mount_definitions(&server, vec![flag]).await;
		let provider = started_provider(&server).await;

		// carol would hash to control under the stored 50/50 splits.
		let result = provider.get_variant("test_flag", fallback(), &ctx("carol"), false).await;
		assert_eq!(result.variant_key.as_deref(), Some("treatment"));
	}

	#[tokio::test]
	async fn runtime_rule_gates_assignment() {
		let server = MockServer::start().await;
		let mut flag = test_flag();
		flag["ruleset"]["rollout"] = json!([{
			"rollout_percentage": 100.0,
			"runtime_evaluation_rule": {
				"and": [
					{"==": [{"var": "plan"}, "Premium"]},
					{">": [{"var": "queries_ran"}, 25]}
				]
			}
		}]);
		mount_definitions(&server, vec![flag]).await;
		let provider = started_provider(&server).await;

		let qualified = ctx("user123").with_custom_properties(
			skein_core::Properties::new()
				.insert("Plan", "premium")
				.insert("queries_ran", 30),
		);
		let result = provider.get_variant("test_flag", fallback(), &qualified, false).await;
		assert_eq!(result.variant_key.as_deref(), Some("treatment"));

		let unqualified = ctx("user123").with_custom_properties(
			skein_core::Properties::new()
				.insert("plan", "premium")
				.insert("queries_ran", 10),
		);
		let result = provider.get_variant("test_flag", fallback(), &unqualified, false).await;
		assert_eq!(result, fallback());

		let missing = ctx("user123");
		let result = provider.get_variant("test_flag", fallback(), &missing, false).await;
		assert_eq!(result, fallback());
	}

	#[tokio::test]
	async fn invalid_rule_operator_reports_and_returns_fallback() {
		let server = MockServer::start().await;
		let mut flag = test_flag();
		flag["ruleset"]["rollout"] = json!([{
			"rollout_percentage": 100.0,
			"runtime_evaluation_rule": {"=oops=": [1, 1]}
		}]);
		mount_definitions(&server, vec![flag]).await;
		let handler = Arc::new(RecordingHandler::default());
		let provider = provider_with(config_for(&server), Arc::new(NoOpEventSink), handler.clone());
		provider.start_polling().await;

		let context = ctx("user123")
			.with_custom_properties(skein_core::Properties::new().insert("plan", "premium"));
		let result = provider.get_variant("test_flag", fallback(), &context, false).await;

		assert_eq!(result, fallback());
		assert!(matches!(
			handler.errors.lock().unwrap()[0],
			SkeinError::Rule(_)
		));
	}

	#[tokio::test]
	async fn exposure_is_reported_once_with_assignment_properties() {
		let server = MockServer::start().await;
		mount_definitions(&server, vec![test_flag()]).await;
		let sink = Arc::new(RecordingSink::default());
		let provider =
			provider_with(config_for(&server), sink.clone(), Arc::new(NoOpErrorHandler));
		provider.start_polling().await;

		provider.get_variant("test_flag", fallback(), &ctx("user123"), true).await;

		let events = sink.events.lock().unwrap();
		assert_eq!(events.len(), 1);
		assert_eq!(events[0].event, EXPOSURE_EVENT);
		assert_eq!(events[0].distinct_id, "user123");
		assert_eq!(events[0].properties["Experiment name"], json!("test_flag"));
		assert_eq!(events[0].properties["Variant name"], json!("treatment"));
		assert_eq!(events[0].properties["$experiment_type"], json!("feature_flag"));
		assert_eq!(events[0].properties["Flag evaluation mode"], json!("local"));
		assert!(events[0].properties.get("Variant fetch latency (ms)").is_none());
	}

	#[tokio::test]
	async fn no_exposure_for_fallbacks_or_unrequested_evaluations() {
		let server = MockServer::start().await;
		mount_definitions(&server, vec![test_flag()]).await;
		let sink = Arc::new(RecordingSink::default());
		let provider =
			provider_with(config_for(&server), sink.clone(), Arc::new(NoOpErrorHandler));
		provider.start_polling().await;

		// Assignment without the report flag.
		provider.get_variant("test_flag", fallback(), &ctx("user123"), false).await;
		// Fallback with the report flag.
		provider.get_variant("missing_flag", fallback(), &ctx("user123"), true).await;

		assert!(sink.events.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn get_variant_value_unwraps_the_assignment() {
		let server = MockServer::start().await;
		mount_definitions(&server, vec![test_flag()]).await;
		let provider = started_provider(&server).await;

		let value = provider
			.get_variant_value("test_flag", "default", &ctx("user123"), false)
			.await;
		assert_eq!(value, VariantValue::from("treatment_value"));

		let value = provider
			.get_variant_value("missing_flag", "default", &ctx("user123"), false)
			.await;
		assert_eq!(value, VariantValue::from("default"));
	}

	#[tokio::test]
	async fn is_enabled_requires_the_boolean_true() {
		let server = MockServer::start().await;
		let boolean_flag = json!({
			"key": "bool_flag",
			"context": "distinct_id",
			"ruleset": {
				"variants": [{"key": "on", "value": true, "split": 100.0}],
				"rollout": [{"rollout_percentage": 100.0}]
			}
		});
		let stringy_flag = json!({
			"key": "stringy_flag",
			"context": "distinct_id",
			"ruleset": {
				"variants": [{"key": "on", "value": "true", "split": 100.0}],
				"rollout": [{"rollout_percentage": 100.0}]
			}
		});
		let numeric_flag = json!({
			"key": "numeric_flag",
			"context": "distinct_id",
			"ruleset": {
				"variants": [{"key": "on", "value": 1, "split": 100.0}],
				"rollout": [{"rollout_percentage": 100.0}]
			}
		});
		mount_definitions(&server, vec![boolean_flag, stringy_flag, numeric_flag]).await;
		let provider = started_provider(&server).await;

		assert!(provider.is_enabled("bool_flag", &ctx("user123")).await);
		assert!(!provider.is_enabled("stringy_flag", &ctx("user123")).await);
		assert!(!provider.is_enabled("numeric_flag", &ctx("user123")).await);
		assert!(!provider.is_enabled("missing_flag", &ctx("user123")).await);
	}

	#[tokio::test]
	async fn get_all_variants_covers_the_snapshot_without_exposure() {
		let server = MockServer::start().await;
		let mut company_flag = test_flag();
		company_flag["key"] = json!("company_flag");
		company_flag["context"] = json!("company_id");
		mount_definitions(&server, vec![test_flag(), company_flag]).await;
		let sink = Arc::new(RecordingSink::default());
		let provider =
			provider_with(config_for(&server), sink.clone(), Arc::new(NoOpErrorHandler));
		provider.start_polling().await;

		// Only test_flag is eligible for this context.
		let variants = provider.get_all_variants(&ctx("user123")).await;
		assert_eq!(variants.len(), 1);
		assert!(variants.contains_key("test_flag"));

		let both = provider
			.get_all_variants(&ctx("user123").with_field("company_id", "acme"))
			.await;
		assert_eq!(both.len(), 2);

		assert!(sink.events.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn get_all_variants_is_empty_before_any_fetch() {
		let server = MockServer::start().await;
		mount_definitions(&server, vec![test_flag()]).await;
		let provider = provider_with(
			config_for(&server),
			Arc::new(NoOpEventSink),
			Arc::new(NoOpErrorHandler),
		);

		assert!(provider.get_all_variants(&ctx("user123")).await.is_empty());
	}

	#[tokio::test]
	async fn requests_carry_auth_identification_and_tracing() {
		let server = MockServer::start().await;
		// "test_token:" base64-encoded.
		Mock::given(method("GET"))
			.and(path("/flags/definitions"))
			.and(header("authorization", "Basic dGVzdF90b2tlbjo="))
			.and(header("content-type", "application/json"))
			.and(header_exists("traceparent"))
			.and(query_param("mp_lib", "rust"))
			.and(query_param("$lib_version", env!("CARGO_PKG_VERSION")))
			.and(query_param("token", "test_token"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"flags": []})))
			.expect(1)
			.mount(&server)
			.await;
		let provider = provider_with(
			config_for(&server),
			Arc::new(NoOpEventSink),
			Arc::new(NoOpErrorHandler),
		);

		provider.start_polling().await;
		server.verify().await;
	}

	#[tokio::test]
	async fn polling_picks_up_new_definitions() {
		let server = MockServer::start().await;
		let mut v2 = test_flag();
		v2["ruleset"]["rollout"] = json!([{
			"rollout_percentage": 100.0,
			"variant_splits": {"control": 100.0, "treatment": 0.0}
		}]);
		// First fetch serves v1, every later poll serves v2.
		Mock::given(method("GET"))
			.and(path("/flags/definitions"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"flags": [test_flag()]})))
			.up_to_n_times(1)
			.mount(&server)
			.await;
		Mock::given(method("GET"))
			.and(path("/flags/definitions"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"flags": [v2]})))
			.mount(&server)
			.await;
		let config = LocalFlagsConfig {
			api_host: server.uri(),
			enable_polling: true,
			polling_interval_in_seconds: 0.05,
			..LocalFlagsConfig::default()
		};
		let provider = provider_with(config, Arc::new(NoOpEventSink), Arc::new(NoOpErrorHandler));

		provider.start_polling().await;
		let before = provider.get_variant("test_flag", fallback(), &ctx("user123"), false).await;
		assert_eq!(before.variant_key.as_deref(), Some("treatment"));

		tokio::time::sleep(Duration::from_millis(200)).await;

		let after = provider.get_variant("test_flag", fallback(), &ctx("user123"), false).await;
		assert_eq!(after.variant_key.as_deref(), Some("control"));

		provider.stop_polling().await;
	}

	#[tokio::test]
	async fn stop_polling_halts_background_refreshes() {
		let server = MockServer::start().await;
		mount_definitions(&server, vec![test_flag()]).await;
		let config = LocalFlagsConfig {
			api_host: server.uri(),
			enable_polling: true,
			polling_interval_in_seconds: 0.05,
			..LocalFlagsConfig::default()
		};
		let provider = provider_with(config, Arc::new(NoOpEventSink), Arc::new(NoOpErrorHandler));

		provider.start_polling().await;
		tokio::time::sleep(Duration::from_millis(120)).await;
		provider.stop_polling().await;

		let at_stop = server.received_requests().await.unwrap().len();
		tokio::time::sleep(Duration::from_millis(200)).await;
		let after_wait = server.received_requests().await.unwrap().len();

		assert_eq!(at_stop, after_wait);
		// Cached definitions keep serving after the poller stops.
		let result = provider.get_variant("test_flag", fallback(), &ctx("user123"), false).await;
		assert_eq!(result.variant_key.as_deref(), Some("treatment"));
	}

	#[tokio::test]
	async fn polling_can_restart_after_stop() {
		let server = MockServer::start().await;
		mount_definitions(&server, vec![test_flag()]).await;
		let config = LocalFlagsConfig {
			api_host: server.uri(),
			enable_polling: true,
			polling_interval_in_seconds: 0.05,
			..LocalFlagsConfig::default()
		};
		let provider = provider_with(config, Arc::new(NoOpEventSink), Arc::new(NoOpErrorHandler));

		provider.start_polling().await;
		provider.stop_polling().await;
		let stopped = server.received_requests().await.unwrap().len();

		provider.start_polling().await;
		tokio::time::sleep(Duration::from_millis(120)).await;
		let restarted = server.received_requests().await.unwrap().len();
		provider.stop_polling().await;

		assert!(restarted > stopped, "polling did not resume: {stopped} -> {restarted}");
	}
}
