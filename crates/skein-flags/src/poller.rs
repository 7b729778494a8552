// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background refresh loop for flag definitions.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use skein_core::SharedErrorHandler;

use crate::cache::DefinitionCache;
use crate::provider::FlagsEndpoint;

/// Fetches definitions once and stores them on success.
///
/// Failures go to the error handler and the previous snapshot keeps
/// serving.
pub(crate) async fn refresh_once(
	endpoint: &FlagsEndpoint,
	cache: &DefinitionCache,
	error_handler: &SharedErrorHandler,
) {
	match endpoint.fetch_definitions().await {
		Ok(definitions) => {
			debug!(count = definitions.len(), "flag definitions refreshed");
			cache.replace(definitions).await;
		}
		Err(error) => {
			warn!(error = %error, "flag definition refresh failed");
			error_handler.handle(&error);
		}
	}
}

/// Handle to the polling task.
///
/// `start` is a no-op while a task is live; `stop` shuts the loop down
/// and waits for it. Dropping a running poller aborts the task.
#[derive(Default)]
pub(crate) struct DefinitionPoller {
	task_handle: Option<JoinHandle<()>>,
	shutdown_tx: Option<mpsc::Sender<()>>,
}

impl DefinitionPoller {
	pub fn new() -> Self {
		Self::default()
	}

	/// Spawns the polling loop unless one is already running.
	pub fn start(
		&mut self,
		interval: Duration,
		endpoint: Arc<FlagsEndpoint>,
		cache: DefinitionCache,
		error_handler: SharedErrorHandler,
	) {
		if self.task_handle.is_some() {
			return;
		}

		let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
		self.shutdown_tx = Some(shutdown_tx);

		let handle = tokio::spawn(async move {
			debug!(
				interval_secs = interval.as_secs_f64(),
				"flag definition polling started"
			);
			loop {
				tokio::select! {
					_ = tokio::time::sleep(interval) => {}
					_ = shutdown_rx.recv() => {
						debug!("flag definition polling stopped");
						break;
					}
				}
				refresh_once(&endpoint, &cache, &error_handler).await;
			}
		});
		self.task_handle = Some(handle);
	}

	/// Signals the loop to exit and waits for the task to finish. The
	/// signal wakes the interval sleep, so a stop during the sleep
	/// returns promptly; a stop during a fetch waits the fetch out.
	pub async fn stop(&mut self) {
		if let Some(shutdown_tx) = self.shutdown_tx.take() {
			let _ = shutdown_tx.send(()).await;
		}
		if let Some(handle) = self.task_handle.take() {
			let _ = handle.await;
		}
	}
}

impl Drop for DefinitionPoller {
	fn drop(&mut self) {
		if let Some(handle) = self.task_handle.take() {
			handle.abort();
		}
	}
}
