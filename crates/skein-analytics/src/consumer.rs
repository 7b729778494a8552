// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Message delivery to the ingestion API, direct and buffered.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::warn;

use skein_core::{Result, SkeinError};

use crate::message::{Message, MessageRoute, MessageSink, SharedMessageSink};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Ingestion API URLs, one per route.
#[derive(Debug, Clone)]
pub struct ConsumerEndpoints {
	pub events: String,
	pub profile_updates: String,
	pub group_updates: String,
	pub imports: String,
}

impl Default for ConsumerEndpoints {
	fn default() -> Self {
		Self::rooted_at("https://api.mixpanel.com")
	}
}

impl ConsumerEndpoints {
	/// All four routes under one base URL, as for an ingestion proxy.
	pub fn rooted_at(base: &str) -> Self {
		let base = base.trim_end_matches('/');
		Self {
			events: format!("{base}/track"),
			profile_updates: format!("{base}/engage"),
			group_updates: format!("{base}/groups"),
			imports: format!("{base}/import"),
		}
	}
}

/// Verbose-mode reply from the ingestion API.
#[derive(Debug, Deserialize)]
struct IngestionResponse {
	status: Option<i64>,
	error: Option<String>,
}

/// Writes each message synchronously to the ingestion API.
pub struct Consumer {
	client: reqwest::Client,
	endpoints: ConsumerEndpoints,
}

impl Consumer {
	pub fn new() -> Result<Self> {
		Self::with_endpoints(ConsumerEndpoints::default())
	}

	pub fn with_endpoints(endpoints: ConsumerEndpoints) -> Result<Self> {
		let client = reqwest::Client::builder()
			.timeout(REQUEST_TIMEOUT)
			.connect_timeout(REQUEST_TIMEOUT)
			.build()
			.map_err(|e| SkeinError::Connection(format!("could not build HTTP client: {e}")))?;
		Ok(Self { client, endpoints })
	}

	fn endpoint(&self, route: MessageRoute) -> &str {
		match route {
			MessageRoute::Event => &self.endpoints.events,
			MessageRoute::ProfileUpdate => &self.endpoints.profile_updates,
			MessageRoute::GroupUpdate => &self.endpoints.group_updates,
			MessageRoute::Import => &self.endpoints.imports,
		}
	}
}

#[async_trait]
impl MessageSink for Consumer {
	/// POSTs the payload base64-encoded in verbose mode.
	///
	/// The API can reply `200 OK` while still rejecting the payload,
	/// so acceptance requires the body's `status` field to be `1`.
	async fn deliver(&self, message: &Message) -> Result<()> {
		let encoded = STANDARD.encode(message.data.to_string());
		let form = [("data", encoded.as_str()), ("verbose", "1")];

		let response = self
			.client
			.post(self.endpoint(message.route))
			.form(&form)
			.send()
			.await?;
		let status = response.status();
		let body = response.text().await?;

		if status == StatusCode::OK {
			let parsed: IngestionResponse = serde_json::from_str(&body).map_err(|_| {
				SkeinError::Server(format!("could not interpret server response: '{body}'"))
			})?;
			if parsed.status == Some(1) {
				return Ok(());
			}
			warn!(error = parsed.error.as_deref(), "ingestion API rejected payload");
		}

		Err(SkeinError::Server(format!(
			"could not write to ingestion API, server responded with {} returning: '{}'",
			status.as_u16(),
			body
		)))
	}
}

/// Largest batch the ingestion API accepts per request.
pub const MAX_BUFFER_LENGTH: usize = 50;

const BUFFERED_ROUTES: [MessageRoute; 3] = [
	MessageRoute::Event,
	MessageRoute::ProfileUpdate,
	MessageRoute::GroupUpdate,
];

/// Coalesces messages per route and writes them in batches.
///
/// Buffers flush when they reach the configured length or on an
/// explicit [`BufferedConsumer::flush`]. A failed flush keeps the
/// buffered payloads for the next attempt. Imports bypass buffering
/// entirely.
pub struct BufferedConsumer {
	sink: SharedMessageSink,
	max_buffer_length: usize,
	buffers: Mutex<[Vec<Value>; 3]>,
}

impl BufferedConsumer {
	pub fn new(sink: SharedMessageSink) -> Self {
		Self::with_buffer_length(sink, MAX_BUFFER_LENGTH)
	}

	/// `max_buffer_length` is clamped to `1..=MAX_BUFFER_LENGTH`.
	pub fn with_buffer_length(sink: SharedMessageSink, max_buffer_length: usize) -> Self {
		Self {
			sink,
			max_buffer_length: max_buffer_length.clamp(1, MAX_BUFFER_LENGTH),
			buffers: Mutex::new([Vec::new(), Vec::new(), Vec::new()]),
		}
	}

	/// Writes out every buffered message, all routes.
	pub async fn flush(&self) -> Result<()> {
		let mut buffers = self.buffers.lock().await;
		for (index, route) in BUFFERED_ROUTES.into_iter().enumerate() {
			self.flush_route(&mut buffers, route, index).await?;
		}
		Ok(())
	}

	/// Delivers `buffers[index]` in batches of at most
	/// `max_buffer_length`, clearing it only once every batch went
	/// through.
	async fn flush_route(
		&self,
		buffers: &mut [Vec<Value>; 3],
		route: MessageRoute,
		index: usize,
	) -> Result<()> {
		if buffers[index].is_empty() {
			return Ok(());
		}
		for chunk in buffers[index].chunks(self.max_buffer_length) {
			let batch = Message::new(route, Value::Array(chunk.to_vec()));
			self.sink.deliver(&batch).await?;
		}
		buffers[index].clear();
		Ok(())
	}
}

#[async_trait]
impl MessageSink for BufferedConsumer {
	async fn deliver(&self, message: &Message) -> Result<()> {
		let Some(index) = BUFFERED_ROUTES.iter().position(|r| *r == message.route) else {
			return self.sink.deliver(message).await;
		};

		let mut buffers = self.buffers.lock().await;
		buffers[index].push(message.data.clone());
		if buffers[index].len() >= self.max_buffer_length {
			self.flush_route(&mut buffers, message.route, index).await?;
		}
		Ok(())
	}
}
