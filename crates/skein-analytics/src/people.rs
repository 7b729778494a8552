// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User profile updates for the engage API.

use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;

use skein_core::{Properties, SharedErrorHandler};

use crate::message::{Message, MessageRoute, MessageSink, SharedMessageSink};

/// Formats profile updates and hands them to the message sink.
///
/// Obtained from [`crate::Tracker::people`] rather than constructed
/// directly. Every operation returns `true` on delivery and `false`
/// after a swallowed error.
///
/// ```ignore
/// let tracker = skein_analytics::Tracker::new("YOUR_PROJECT_TOKEN")?;
/// tracker.people().set("12345", Properties::new()
///     .insert("company", "Acme")
///     .insert("plan", "Premium"))
///     .await;
/// ```
pub struct People {
	token: String,
	sink: SharedMessageSink,
	error_handler: SharedErrorHandler,
}

impl People {
	pub(crate) fn new(
		token: String,
		sink: SharedMessageSink,
		error_handler: SharedErrorHandler,
	) -> Self {
		Self { token, sink, error_handler }
	}

	/// Sets properties on a profile, overwriting existing values.
	pub async fn set(&self, distinct_id: &str, properties: Properties) -> bool {
		self.update(verb_message(distinct_id, "$set", properties)).await
	}

	/// Sets properties only where the profile has no value yet.
	pub async fn set_once(&self, distinct_id: &str, properties: Properties) -> bool {
		self.update(verb_message(distinct_id, "$set_once", properties)).await
	}

	/// Adds numeric deltas to profile properties. Negative deltas
	/// subtract; missing properties count from zero.
	pub async fn increment(&self, distinct_id: &str, properties: Properties) -> bool {
		self.update(verb_message(distinct_id, "$add", properties)).await
	}

	/// Increments one property by one.
	pub async fn plus_one(&self, distinct_id: &str, property: &str) -> bool {
		self.increment(distinct_id, Properties::new().insert(property, 1)).await
	}

	/// Appends values to list-valued properties, creating the lists
	/// on first use.
	pub async fn append(&self, distinct_id: &str, properties: Properties) -> bool {
		self.update(verb_message(distinct_id, "$append", properties)).await
	}

	/// Merges values into list-valued properties, deduplicating.
	pub async fn union(&self, distinct_id: &str, properties: Properties) -> bool {
		self.update(verb_message(distinct_id, "$union", properties)).await
	}

	/// Removes one property and its value from a profile. Use
	/// [`People::update`] with a `$unset` list to remove several at
	/// once.
	pub async fn unset(&self, distinct_id: &str, property: &str) -> bool {
		self.update(verb_message(distinct_id, "$unset", json!([property]))).await
	}

	/// Records a payment on the profile for the revenue report.
	///
	/// Extra transaction fields (such as a `$time` override) ride
	/// along in `properties`; the amount always wins over any
	/// `$amount` supplied there.
	pub async fn track_charge(
		&self,
		distinct_id: &str,
		amount: f64,
		properties: Properties,
	) -> bool {
		let transaction = properties.insert("$amount", amount);
		self.append(
			distinct_id,
			Properties::new().insert("$transactions", transaction),
		)
		.await
	}

	/// Clears every recorded charge from a profile.
	pub async fn clear_charges(&self, distinct_id: &str) -> bool {
		self.unset(distinct_id, "$transactions").await
	}

	/// Permanently deletes a profile.
	pub async fn delete_user(&self, distinct_id: &str) -> bool {
		self.update(
			Properties::new()
				.insert("$distinct_id", distinct_id)
				.insert("$delete", ""),
		)
		.await
	}

	/// Sends a caller-formatted engage message.
	///
	/// The project token and a millisecond timestamp are filled in,
	/// but `message` overrides both, and may carry fields no wrapper
	/// exists for (`$ip`, `$ignore_time`, `$ignore_alias`).
	pub async fn update(&self, message: Properties) -> bool {
		let data = Properties::new()
			.insert("$token", self.token.as_str())
			.insert("$time", Utc::now().timestamp_millis())
			.merge(message);
		let message = Message::new(MessageRoute::ProfileUpdate, Value::from(data));

		match self.sink.deliver(&message).await {
			Ok(()) => true,
			Err(error) => {
				debug!(error = %error, "profile update failed");
				self.error_handler.handle(&error);
				false
			}
		}
	}
}

fn verb_message(distinct_id: &str, operation: &str, value: impl Into<Value>) -> Properties {
	Properties::new()
		.insert("$distinct_id", distinct_id)
		.insert(operation, value.into())
}
