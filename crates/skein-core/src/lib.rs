// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared foundation for the Skein SDK crates.
//!
//! `skein-core` holds the pieces both `skein-analytics` and
//! `skein-flags` build on:
//!
//! - [`SkeinError`] and the [`Result`] alias, the SDK-wide error
//!   taxonomy
//! - [`ErrorHandler`], the callback for errors the SDK swallows on
//!   fire-and-forget paths
//! - [`EventSink`], the delivery seam that lets flag exposure events
//!   flow into any tracker implementation
//! - [`Properties`], the builder for JSON property maps
//!
//! Application code normally depends on `skein-analytics` or
//! `skein-flags` and uses the re-exports those crates provide.

mod error;
mod properties;
mod sink;

pub use error::{ErrorHandler, NoOpErrorHandler, Result, SharedErrorHandler, SkeinError};
pub use properties::Properties;
pub use sink::{EventSink, NoOpEventSink, SharedEventSink};
