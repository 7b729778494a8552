// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error taxonomy shared by the analytics and flags crates.
//!
//! Every failure the SDK can surface is collapsed into [`SkeinError`].
//! Callers that prefer fire-and-forget semantics install an
//! [`ErrorHandler`] and receive the errors the SDK would otherwise
//! swallow.

use std::sync::Arc;

use thiserror::Error;

/// Errors raised while talking to the ingestion and flags APIs.
#[derive(Debug, Clone, Error)]
pub enum SkeinError {
	/// The request never completed: DNS, TCP, TLS, or a timeout.
	#[error("connection error: {0}")]
	Connection(String),

	/// The server answered with a non-success status or an
	/// uninterpretable body.
	#[error("server error: {0}")]
	Server(String),

	/// A runtime evaluation rule was malformed or used an unsupported
	/// operator.
	#[error("rule evaluation error: {0}")]
	Rule(String),
}

impl From<reqwest::Error> for SkeinError {
	fn from(err: reqwest::Error) -> Self {
		if err.is_timeout() {
			SkeinError::Connection(format!("request timeout: {err}"))
		} else if err.is_decode() {
			SkeinError::Server(format!("invalid response body: {err}"))
		} else {
			SkeinError::Connection(format!("network error: {err}"))
		}
	}
}

/// Result alias used across the SDK crates.
pub type Result<T> = std::result::Result<T, SkeinError>;

/// Receives errors from delivery paths that do not return them.
///
/// Tracker, profile, and group operations report success as `bool`;
/// background flag polling has no caller at all. Both routes their
/// failures through the installed handler. The default
/// [`NoOpErrorHandler`] discards everything, matching the behavior of
/// an unconfigured client.
pub trait ErrorHandler: Send + Sync {
	fn handle(&self, error: &SkeinError);
}

/// Shared, cheaply cloneable handler reference.
pub type SharedErrorHandler = Arc<dyn ErrorHandler>;

/// Handler that ignores every error.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpErrorHandler;

impl ErrorHandler for NoOpErrorHandler {
	fn handle(&self, _error: &SkeinError) {}
}
