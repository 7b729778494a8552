// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Test doubles shared by the tracker, people, and groups tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use tokio::sync::Mutex;

use skein_core::{ErrorHandler, Result, SkeinError};

use crate::message::{Message, MessageSink};

/// Sink that captures every delivered message, with a failure toggle.
#[derive(Default)]
pub(crate) struct RecordingSink {
	messages: Mutex<Vec<Message>>,
	should_fail: AtomicBool,
}

impl RecordingSink {
	pub async fn recorded(&self) -> Vec<Message> {
		self.messages.lock().await.clone()
	}

	pub fn set_should_fail(&self, fail: bool) {
		self.should_fail.store(fail, Ordering::SeqCst);
	}
}

#[async_trait]
impl MessageSink for RecordingSink {
	async fn deliver(&self, message: &Message) -> Result<()> {
		if self.should_fail.load(Ordering::SeqCst) {
			return Err(SkeinError::Server("sink unavailable".to_string()));
		}
		self.messages.lock().await.push(message.clone());
		Ok(())
	}
}

/// Handler that captures every reported error.
#[derive(Default)]
pub(crate) struct RecordingHandler {
	pub errors: StdMutex<Vec<SkeinError>>,
}

impl ErrorHandler for RecordingHandler {
	fn handle(&self, error: &SkeinError) {
		self.errors.lock().unwrap().push(error.clone());
	}
}
