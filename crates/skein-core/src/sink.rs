// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event delivery seam between the flags and analytics crates.
//!
//! Flag exposure tracking emits analytics events, but the flags crate
//! must not depend on a concrete tracker. [`EventSink`] is that seam:
//! `skein_analytics::Tracker` implements it, tests substitute
//! recording sinks, and [`NoOpEventSink`] disables exposure tracking
//! entirely.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Destination for analytics events emitted by the SDK itself.
#[async_trait]
pub trait EventSink: Send + Sync {
	/// Records `event` for `distinct_id` with the given JSON object of
	/// properties.
	async fn track(&self, distinct_id: &str, event: &str, properties: Value) -> Result<()>;
}

/// Shared, cheaply cloneable sink reference.
pub type SharedEventSink = Arc<dyn EventSink>;

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
	async fn track(&self, _distinct_id: &str, _event: &str, _properties: Value) -> Result<()> {
		Ok(())
	}
}
