// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event tracking entry point.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use skein_core::{EventSink, NoOpErrorHandler, Properties, Result, SharedErrorHandler};

use crate::consumer::Consumer;
use crate::groups::Groups;
use crate::message::{Message, MessageRoute, MessageSink, SharedMessageSink};
use crate::people::People;

/// Tracks events and exposes profile and group update surfaces.
///
/// ```ignore
/// let tracker = skein_analytics::Tracker::new("YOUR_PROJECT_TOKEN")?;
///
/// tracker.track("user123", "Signed Up", Properties::new()
///     .insert("plan", "Premium"))
///     .await;
/// tracker.people().set("user123", Properties::new()
///     .insert("company", "Acme"))
///     .await;
/// ```
///
/// Delivery runs synchronously per call through the configured
/// message sink; substitute a [`crate::BufferedConsumer`] via
/// [`Tracker::with_sink`] to batch. Operations return `true` on
/// delivery and `false` after a swallowed error.
pub struct Tracker {
	token: String,
	sink: SharedMessageSink,
	error_handler: SharedErrorHandler,
	people: People,
	groups: Groups,
}

impl Tracker {
	/// Tracker that writes each message straight to the ingestion
	/// API.
	pub fn new(token: impl Into<String>) -> Result<Self> {
		let consumer = Consumer::new()?;
		Ok(Self::with_sink(token, Arc::new(consumer)))
	}

	/// Tracker with a custom delivery sink and no error reporting.
	pub fn with_sink(token: impl Into<String>, sink: SharedMessageSink) -> Self {
		Self::with_error_handler(token, sink, Arc::new(NoOpErrorHandler))
	}

	/// Tracker with a custom delivery sink and error handler. The
	/// handler sees every delivery failure the `bool` returns
	/// compress away.
	pub fn with_error_handler(
		token: impl Into<String>,
		sink: SharedMessageSink,
		error_handler: SharedErrorHandler,
	) -> Self {
		let token = token.into();
		let people = People::new(
			token.clone(),
			Arc::clone(&sink),
			Arc::clone(&error_handler),
		);
		let groups = Groups::new(
			token.clone(),
			Arc::clone(&sink),
			Arc::clone(&error_handler),
		);
		Self { token, sink, error_handler, people, groups }
	}

	/// Profile update surface sharing this tracker's token and sink.
	pub fn people(&self) -> &People {
		&self.people
	}

	/// Group update surface sharing this tracker's token and sink.
	pub fn groups(&self) -> &Groups {
		&self.groups
	}

	/// Records `event` for `distinct_id`.
	pub async fn track(&self, distinct_id: &str, event: &str, properties: Properties) -> bool {
		self.send_event(distinct_id, event, properties, None).await
	}

	/// Like [`Tracker::track`], attributing the event to `ip` for
	/// geolocation instead of the sending server's address.
	pub async fn track_with_ip(
		&self,
		distinct_id: &str,
		event: &str,
		properties: Properties,
		ip: &str,
	) -> bool {
		self.send_event(distinct_id, event, properties, Some(ip)).await
	}

	/// Creates a distinct-id alias. Events and updates under
	/// `alias_id` are attributed to `real_id`'s profile. A `real_id`
	/// that has tracked events should never itself become an alias.
	pub async fn alias(&self, alias_id: &str, real_id: &str) -> bool {
		self.track(
			real_id,
			"$create_alias",
			Properties::new().insert("alias", alias_id),
		)
		.await
	}

	async fn send_event(
		&self,
		distinct_id: &str,
		event: &str,
		properties: Properties,
		ip: Option<&str>,
	) -> bool {
		// Identification fields win over caller-supplied ones.
		let mut properties = properties
			.insert("distinct_id", distinct_id)
			.insert("token", self.token.as_str());
		if let Some(ip) = ip {
			properties = properties.insert("ip", ip);
		}
		let data = json!({
			"event": event,
			"properties": Value::from(properties),
		});
		let message = Message::new(MessageRoute::Event, data);

		match self.sink.deliver(&message).await {
			Ok(()) => true,
			Err(error) => {
				debug!(event, error = %error, "event delivery failed");
				self.error_handler.handle(&error);
				false
			}
		}
	}
}

/// Lets the flags SDK report exposure events through a tracker.
///
/// Delivery failures are routed to this tracker's own error handler
/// rather than returned, so flag evaluation never observes them.
#[async_trait]
impl EventSink for Tracker {
	async fn track(&self, distinct_id: &str, event: &str, properties: Value) -> Result<()> {
		self.send_event(distinct_id, event, Properties::from(properties), None).await;
		Ok(())
	}
}
