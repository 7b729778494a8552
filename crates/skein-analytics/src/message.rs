// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The unit of delivery between trackers and consumers.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use skein_core::Result;

/// Which ingestion API a message is destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageRoute {
	/// Event ingestion (`/track`).
	Event,
	/// User profile updates (`/engage`).
	ProfileUpdate,
	/// Group profile updates (`/groups`).
	GroupUpdate,
	/// Historical event import (`/import`).
	Import,
}

/// A routed JSON payload ready for delivery.
///
/// `data` is the exact object the ingestion API expects for the
/// route; consumers serialize it without inspecting it.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
	pub route: MessageRoute,
	pub data: Value,
}

impl Message {
	pub fn new(route: MessageRoute, data: Value) -> Self {
		Self { route, data }
	}
}

/// Destination for tracked messages.
///
/// [`crate::Consumer`] writes each message straight to the ingestion
/// API; [`crate::BufferedConsumer`] coalesces them first. Tests
/// substitute recording sinks.
#[async_trait]
pub trait MessageSink: Send + Sync {
	/// Delivers one message to its route.
	async fn deliver(&self, message: &Message) -> Result<()>;
}

/// Shared, cheaply cloneable sink reference.
pub type SharedMessageSink = Arc<dyn MessageSink>;
