// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Test doubles shared by the provider tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use skein_core::{ErrorHandler, EventSink, Result, SkeinError};

pub(crate) struct RecordedEvent {
	pub distinct_id: String,
	pub event: String,
	pub properties: Value,
}

/// Sink that captures every tracked event, with a failure toggle.
#[derive(Default)]
pub(crate) struct RecordingSink {
	pub events: Mutex<Vec<RecordedEvent>>,
	pub fail_with_server_error: AtomicBool,
}

#[async_trait]
impl EventSink for RecordingSink {
	async fn track(&self, distinct_id: &str, event: &str, properties: Value) -> Result<()> {
		if self.fail_with_server_error.load(Ordering::SeqCst) {
			return Err(SkeinError::Server("sink unavailable".to_string()));
		}
		self.events.lock().unwrap().push(RecordedEvent {
			distinct_id: distinct_id.to_string(),
			event: event.to_string(),
			properties,
		});
		Ok(())
	}
}

/// Handler that captures every reported error.
#[derive(Default)]
pub(crate) struct RecordingHandler {
	pub errors: Mutex<Vec<SkeinError>>,
}

impl ErrorHandler for RecordingHandler {
	fn handle(&self, error: &SkeinError) {
		self.errors.lock().unwrap().push(error.clone());
	}
}
