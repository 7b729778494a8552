// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Group profile updates for the groups API.

use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;

use skein_core::{Properties, SharedErrorHandler};

use crate::message::{Message, MessageRoute, MessageSink, SharedMessageSink};

/// Formats group updates and hands them to the message sink.
///
/// Obtained from [`crate::Tracker::groups`]. Group profiles are
/// addressed by a `group_key` naming the grouping (say `"Company"`)
/// and a `group_id` naming the member. Every operation returns `true`
/// on delivery and `false` after a swallowed error.
pub struct Groups {
	token: String,
	sink: SharedMessageSink,
	error_handler: SharedErrorHandler,
}

impl Groups {
	pub(crate) fn new(
		token: String,
		sink: SharedMessageSink,
		error_handler: SharedErrorHandler,
	) -> Self {
		Self { token, sink, error_handler }
	}

	/// Sets properties on a group, overwriting existing values.
	pub async fn set(&self, group_key: &str, group_id: &str, properties: Properties) -> bool {
		self.update(verb_message(group_key, group_id, "$set", properties)).await
	}

	/// Sets properties only where the group has no value yet.
	pub async fn set_once(&self, group_key: &str, group_id: &str, properties: Properties) -> bool {
		self.update(verb_message(group_key, group_id, "$set_once", properties)).await
	}

	/// Merges values into list-valued properties, deduplicating.
	pub async fn union(&self, group_key: &str, group_id: &str, properties: Properties) -> bool {
		self.update(verb_message(group_key, group_id, "$union", properties)).await
	}

	/// Removes one property and its value from a group. Use
	/// [`Groups::update`] with a `$unset` list to remove several at
	/// once.
	pub async fn unset(&self, group_key: &str, group_id: &str, property: &str) -> bool {
		self.update(verb_message(group_key, group_id, "$unset", json!([property]))).await
	}

	/// Permanently deletes a group profile.
	pub async fn delete_group(&self, group_key: &str, group_id: &str) -> bool {
		self.update(
			Properties::new()
				.insert("$group_key", group_key)
				.insert("$group_id", group_id)
				.insert("$delete", ""),
		)
		.await
	}

	/// Sends a caller-formatted groups message.
	///
	/// The project token and a millisecond timestamp are filled in,
	/// but `message` overrides both.
	pub async fn update(&self, message: Properties) -> bool {
		let data = Properties::new()
			.insert("$token", self.token.as_str())
			.insert("$time", Utc::now().timestamp_millis())
			.merge(message);
		let message = Message::new(MessageRoute::GroupUpdate, Value::from(data));

		match self.sink.deliver(&message).await {
			Ok(()) => true,
			Err(error) => {
				debug!(error = %error, "group update failed");
				self.error_handler.handle(&error);
				false
			}
		}
	}
}

fn verb_message(
	group_key: &str,
	group_id: &str,
	operation: &str,
	value: impl Into<Value>,
) -> Properties {
	Properties::new()
		.insert("$group_key", group_key)
		.insert("$group_id", group_id)
		.insert(operation, value.into())
}
