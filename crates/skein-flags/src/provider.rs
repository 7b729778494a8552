// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared HTTP plumbing for the flags providers.
//!
//! Both providers authenticate with the project token over basic auth,
//! send the library identification query parameters, and stamp every
//! request with a fresh W3C `traceparent`. Exposure events ride out
//! through the configured [`skein_core::EventSink`].

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use skein_core::{Properties, Result, SharedErrorHandler, SharedEventSink, SkeinError};

use crate::cache::Definitions;
use crate::types::{EvaluationContext, FlagDefinition, SelectedVariant};

/// Event recorded when a flag assignment is exposed to analytics.
pub const EXPOSURE_EVENT: &str = "$experiment_started";

const LIB_NAME: &str = "rust";
const LIB_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Which endpoint and evaluation style a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EvaluationMode {
	Local,
	Remote,
}

impl EvaluationMode {
	fn endpoint(self) -> &'static str {
		match self {
			EvaluationMode::Local => "/flags/definitions",
			EvaluationMode::Remote => "/flags",
		}
	}

	fn label(self) -> &'static str {
		match self {
			EvaluationMode::Local => "local",
			EvaluationMode::Remote => "remote",
		}
	}
}

/// Authenticated client for one flags endpoint, plus the exposure side
/// channel.
pub(crate) struct FlagsEndpoint {
	client: reqwest::Client,
	token: String,
	api_host: String,
	mode: EvaluationMode,
	event_sink: SharedEventSink,
	error_handler: SharedErrorHandler,
}

impl FlagsEndpoint {
	pub fn new(
		token: String,
		api_host: String,
		timeout: Duration,
		mode: EvaluationMode,
		event_sink: SharedEventSink,
		error_handler: SharedErrorHandler,
	) -> Result<Self> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.connect_timeout(timeout)
			.build()
			.map_err(|e| SkeinError::Connection(format!("could not build HTTP client: {e}")))?;
		Ok(Self {
			client,
			token,
			api_host,
			mode,
			event_sink,
			error_handler,
		})
	}

	/// Fully qualified endpoint URL. Hosts without a scheme are
	/// treated as HTTPS.
	fn url(&self) -> String {
		if self.api_host.starts_with("http://") || self.api_host.starts_with("https://") {
			format!("{}{}", self.api_host, self.mode.endpoint())
		} else {
			format!("https://{}{}", self.api_host, self.mode.endpoint())
		}
	}

	/// Issues an authenticated GET and decodes the JSON response.
	///
	/// Non-success statuses and unparseable bodies map to
	/// [`SkeinError::Server`], transport failures to
	/// [`SkeinError::Connection`].
	pub async fn call<T>(&self, additional_params: &[(&str, String)]) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut params: Vec<(&str, String)> = vec![
			("mp_lib", LIB_NAME.to_string()),
			("$lib_version", LIB_VERSION.to_string()),
			("token", self.token.clone()),
		];
		params.extend(additional_params.iter().map(|(key, value)| (*key, value.clone())));

		let response = self
			.client
			.get(self.url())
			.query(&params)
			.basic_auth(&self.token, Some(""))
			.header(CONTENT_TYPE, "application/json")
			.header("traceparent", generate_traceparent())
			.send()
			.await?;

		let status = response.status();
		let body = response.text().await?;
		if !status.is_success() {
			return Err(SkeinError::Server(format!("HTTP {}: {}", status.as_u16(), body)));
		}
		serde_json::from_str(&body)
			.map_err(|e| SkeinError::Server(format!("invalid JSON response: {e}")))
	}

	/// Fetches the full definition set for local evaluation.
	pub async fn fetch_definitions(&self) -> Result<Definitions> {
		let response: DefinitionsResponse = self.call(&[]).await?;
		Ok(response
			.flags
			.into_iter()
			.map(|flag| (flag.key.clone(), flag))
			.collect())
	}

	/// Records an exposure event for an assignment.
	///
	/// Best-effort: contexts without a `distinct_id` are skipped
	/// silently, and sink failures go to the error handler.
	pub async fn track_exposure(
		&self,
		flag_key: &str,
		variant: &SelectedVariant,
		context: &EvaluationContext,
		latency_ms: Option<u64>,
	) {
		let Some(distinct_id) = context.distinct_id() else {
			return;
		};

		let mut properties = Properties::new()
			.insert("distinct_id", distinct_id.as_str())
			.insert("Experiment name", flag_key)
			.insert("Variant name", variant.variant_key.clone())
			.insert("$experiment_type", "feature_flag")
			.insert("Flag evaluation mode", self.mode.label());
		if let Some(ms) = latency_ms {
			properties = properties.insert("Variant fetch latency (ms)", ms);
		}
		if let Some(experiment_id) = &variant.experiment_id {
			properties = properties.insert("$experiment_id", experiment_id.as_str());
		}
		if let Some(active) = variant.is_experiment_active {
			properties = properties.insert("$is_experiment_active", active);
		}
		if let Some(qa) = variant.is_qa_tester {
			properties = properties.insert("$is_qa_tester", qa);
		}

		if let Err(error) = self
			.event_sink
			.track(&distinct_id, EXPOSURE_EVENT, properties.into_value())
			.await
		{
			debug!(error = %error, flag_key, "exposure event delivery failed");
			self.error_handler.handle(&error);
		}
	}
}

#[derive(Debug, serde::Deserialize)]
struct DefinitionsResponse {
	#[serde(default)]
	flags: Vec<FlagDefinition>,
}

/// W3C traceparent with a fresh trace and span id, always sampled.
fn generate_traceparent() -> String {
	let trace_id = Uuid::new_v4().simple().to_string();
	let span_id = format!("{:016x}", fastrand::u64(..));
	format!("00-{trace_id}-{span_id}-01")
}
