// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Remote flag evaluation, one API round trip per lookup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use tracing::debug;

use skein_core::{Result, SharedErrorHandler, SharedEventSink};

use crate::config::RemoteFlagsConfig;
use crate::provider::{EvaluationMode, FlagsEndpoint};
use crate::types::{EvaluationContext, SelectedVariant, VariantValue};

/// Wire shape of the remote evaluation endpoint: variants already
/// selected by the server, keyed by flag.
#[derive(Debug, Deserialize)]
struct RemoteFlagsResponse {
	#[serde(default)]
	flags: HashMap<String, SelectedVariant>,
}

/// Asks the flags API to evaluate on every call.
///
/// No definitions are cached and no hashing happens in-process, so
/// assignments always reflect the server's current state. Each lookup
/// costs a network round trip; use [`crate::LocalFlagsProvider`] when
/// that is too slow.
pub struct RemoteFlagsProvider {
	endpoint: FlagsEndpoint,
	error_handler: SharedErrorHandler,
}

impl RemoteFlagsProvider {
	/// Provider for `token`. Exposure events go to `event_sink`;
	/// swallowed errors go to `error_handler`.
	pub fn new(
		token: impl Into<String>,
		config: RemoteFlagsConfig,
		event_sink: SharedEventSink,
		error_handler: SharedErrorHandler,
	) -> Result<Self> {
		let timeout = config.request_timeout();
		let endpoint = FlagsEndpoint::new(
			token.into(),
			config.api_host,
			timeout,
			EvaluationMode::Remote,
			event_sink,
			Arc::clone(&error_handler),
		)?;
		Ok(Self { endpoint, error_handler })
	}

	async fn fetch(
		&self,
		context: &EvaluationContext,
		flag_key: Option<&str>,
	) -> Result<RemoteFlagsResponse> {
		let mut params = vec![("context", context.to_json_string())];
		if let Some(key) = flag_key {
			params.push(("flag_key", key.to_string()));
		}
		self.endpoint.call(&params).await
	}

	/// Evaluates `flag_key` for `context` on the server.
	///
	/// Returns `fallback` when the call fails or the server does not
	/// assign a variant. Exposure is reported only for real
	/// assignments, and only when `report_exposure` is set; the
	/// exposure event carries the observed fetch latency.
	pub async fn get_variant(
		&self,
		flag_key: &str,
		fallback: SelectedVariant,
		context: &EvaluationContext,
		report_exposure: bool,
	) -> SelectedVariant {
		let started = Instant::now();
		let response = match self.fetch(context, Some(flag_key)).await {
			Ok(response) => response,
			Err(error) => {
				debug!(flag_key, %error, "remote flag evaluation failed");
				self.error_handler.handle(&error);
				return fallback;
			}
		};
		let latency_ms = started.elapsed().as_millis() as u64;

		let Some(variant) = response.flags.get(flag_key).cloned() else {
			return fallback;
		};
		if report_exposure {
			self.endpoint
				.track_exposure(flag_key, &variant, context, Some(latency_ms))
				.await;
		}
		variant
	}

	/// Like [`RemoteFlagsProvider::get_variant`], returning only the
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

	/// Evaluates every flag for `context` in one round trip.
	///
	/// `None` on failure so callers can tell an outage from an empty
	/// assignment set. Never reports exposure.
	pub async fn get_all_variants(
		&self,
		context: &EvaluationContext,
	) -> Option<HashMap<String, SelectedVariant>> {
		match self.fetch(context, None).await {
			Ok(response) => Some(response.flags),
			Err(error) => {
				debug!(%error, "remote flag evaluation failed");
				self.error_handler.handle(&error);
				None
			}
		}
	}
}
