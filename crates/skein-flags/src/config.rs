// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provider configuration.

use std::time::Duration;

/// API host used when none is configured.
pub const DEFAULT_API_HOST: &str = "api.mixpanel.com";

const DEFAULT_REQUEST_TIMEOUT_SECS: f64 = 10.0;
const DEFAULT_POLLING_INTERVAL_SECS: f64 = 60.0;

/// Configuration for [`crate::LocalFlagsProvider`].
#[derive(Debug, Clone)]
pub struct LocalFlagsConfig {
	/// Flags API host. A bare host implies HTTPS; a full
	/// `http(s)://` URL is used as given.
	pub api_host: String,
	/// Per-request timeout, in seconds.
	pub request_timeout_in_seconds: f64,
	/// Whether `start_polling` keeps refreshing definitions in the
	/// background after the initial fetch.
	pub enable_polling: bool,
	/// Delay between background refreshes, in seconds.
	pub polling_interval_in_seconds: f64,
}

impl Default for LocalFlagsConfig {
	fn default() -> Self {
		Self {
			api_host: DEFAULT_API_HOST.to_string(),
			request_timeout_in_seconds: DEFAULT_REQUEST_TIMEOUT_SECS,
			enable_polling: true,
			polling_interval_in_seconds: DEFAULT_POLLING_INTERVAL_SECS,
		}
	}
}

impl LocalFlagsConfig {
	pub(crate) fn request_timeout(&self) -> Duration {
		duration_or(self.request_timeout_in_seconds, DEFAULT_REQUEST_TIMEOUT_SECS)
	}

	pub(crate) fn polling_interval(&self) -> Duration {
		duration_or(self.polling_interval_in_seconds, DEFAULT_POLLING_INTERVAL_SECS)
	}
}

/// Configuration for [`crate::RemoteFlagsProvider`].
#[derive(Debug, Clone)]
pub struct RemoteFlagsConfig {
	/// Flags API host. A bare host implies HTTPS; a full
	/// `http(s)://` URL is used as given.
	pub api_host: String,
	/// Per-request timeout, in seconds.
	pub request_timeout_in_seconds: f64,
}

impl Default for RemoteFlagsConfig {
	fn default() -> Self {
		Self {
			api_host: DEFAULT_API_HOST.to_string(),
			request_timeout_in_seconds: DEFAULT_REQUEST_TIMEOUT_SECS,
		}
	}
}

impl RemoteFlagsConfig {
	pub(crate) fn request_timeout(&self) -> Duration {
		duration_or(self.request_timeout_in_seconds, DEFAULT_REQUEST_TIMEOUT_SECS)
	}
}

/// Negative, non-finite, or absurdly large values fall back to the
/// default rather than panicking in `Duration` construction.
fn duration_or(seconds: f64, default_seconds: f64) -> Duration {
	Duration::try_from_secs_f64(seconds)
		.unwrap_or_else(|_| Duration::from_secs_f64(default_seconds))
}
