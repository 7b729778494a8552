// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Product analytics Rust SDK for Skein.
//!
//! This crate formats Mixpanel ingestion messages and delivers them,
//! either synchronously per call or batched through a buffering
//! consumer.
//!
//! # Features
//!
//! - **Event Tracking**: `track`, IP attribution, and distinct-id
//!   aliasing
//! - **Profile Updates**: set, increment, append, union, charges, and
//!   deletion on user profiles
//! - **Group Updates**: the same update surface for group profiles
//! - **Buffered Delivery**: per-route batching up to the ingestion
//!   API's batch limit
//! - **Pluggable Sinks**: route messages to a queue or test double
//!   instead of the wire
//!
//! # Example
//!
//! ```ignore
//! use skein_analytics::Tracker;
//! use skein_core::Properties;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tracker = Tracker::new("YOUR_PROJECT_TOKEN")?;
//!
//!     tracker.track("user123", "Signed Up", Properties::new()
//!         .insert("plan", "Premium"))
//!         .await;
//!
//!     tracker.people().set("user123", Properties::new()
//!         .insert("company", "Acme"))
//!         .await;
//!
//!     Ok(())
//! }
//! ```

mod consumer;
mod groups;
mod message;
mod people;
mod tracker;

#[cfg(test)]
mod testutil;

pub use consumer::{BufferedConsumer, Consumer, ConsumerEndpoints, MAX_BUFFER_LENGTH};
pub use groups::Groups;
pub use message::{Message, MessageRoute, MessageSink, SharedMessageSink};
pub use people::People;
pub use tracker::Tracker;

// Re-export core types for convenience
pub use skein_core::{
	ErrorHandler, EventSink, NoOpErrorHandler, Properties, Result, SharedErrorHandler,
	SkeinError,
};
