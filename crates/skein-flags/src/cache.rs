// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Snapshot cache of flag definitions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::types::FlagDefinition;

/// Definitions keyed by flag key.
pub(crate) type Definitions = HashMap<String, FlagDefinition>;

/// Holds the latest fetched definition set.
///
/// Readers take an `Arc` snapshot, so evaluation never blocks on a
/// concurrent refresh and a multi-flag evaluation sees one consistent
/// set. Refreshes replace the set wholesale; flags absent from the new
/// payload disappear.
#[derive(Debug, Clone, Default)]
pub(crate) struct DefinitionCache {
	inner: Arc<RwLock<Arc<Definitions>>>,
}

impl DefinitionCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Current definitions. The snapshot stays valid across later
	/// replacements.
	pub async fn snapshot(&self) -> Arc<Definitions> {
		self.inner.read().await.clone()
	}

	/// Replaces the cached definitions wholesale.
	pub async fn replace(&self, definitions: Definitions) {
		*self.inner.write().await = Arc::new(definitions);
	}
}
