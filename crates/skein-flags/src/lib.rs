// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Feature flags Rust SDK for Skein.
//!
//! This crate evaluates Mixpanel feature flags and experiments. Flags
//! can be evaluated locally against a polled definition set, or
//! remotely with one API call per lookup.
//!
//! # Features
//!
//! - **Local Evaluation**: FNV-1a bucketing over cached definitions, no
//!   network on the hot path
//! - **Remote Evaluation**: Server-side assignment for flags that must
//!   reflect live state
//! - **Background Polling**: Definitions refresh on an interval until
//!   stopped
//! - **Runtime Rules**: JsonLogic-style predicates gate rollout stages
//!   on context properties
//! - **Exposure Tracking**: Assignments report `$experiment_started`
//!   through a pluggable event sink
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use skein_core::{NoOpErrorHandler, NoOpEventSink};
//! use skein_flags::{EvaluationContext, LocalFlagsConfig, LocalFlagsProvider, SelectedVariant};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Initialize the provider and prime the definition cache
//!     let provider = LocalFlagsProvider::new(
//!         "YOUR_PROJECT_TOKEN",
//!         LocalFlagsConfig::default(),
//!         Arc::new(NoOpEventSink),
//!         Arc::new(NoOpErrorHandler),
//!     )?;
//!     provider.start_polling().await;
//!
//!     // Build evaluation context
//!     let context = EvaluationContext::new("user123");
//!
//!     // Evaluate flags
//!     let enabled = provider.is_enabled("feature.new_flow", &context).await;
//!     let variant = provider
//!         .get_variant("ui.theme", SelectedVariant::fallback("light"), &context, true)
//!         .await;
//!
//!     provider.stop_polling().await;
//!     Ok(())
//! }
//! ```

mod cache;
mod config;
mod engine;
mod hash;
mod local;
mod poller;
mod provider;
mod remote;
mod rules;
mod types;

#[cfg(test)]
mod testutil;

pub use config::{LocalFlagsConfig, RemoteFlagsConfig, DEFAULT_API_HOST};
pub use hash::{fnv1a_64, normalized_hash};
pub use local::LocalFlagsProvider;
pub use provider::EXPOSURE_EVENT;
pub use remote::RemoteFlagsProvider;
pub use types::{
	EvaluationContext, FlagDefinition, RolloutStage, Ruleset, SelectedVariant, TestOverrides,
	Variant, VariantOverride, VariantValue,
};

// Re-export core types for convenience
pub use skein_core::{
	ErrorHandler, EventSink, NoOpErrorHandler, NoOpEventSink, Properties, Result,
	SharedErrorHandler, SharedEventSink, SkeinError,
};
