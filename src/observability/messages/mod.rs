// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for the human-readable line and
//! [`StructuredLog`] to emit it at its documented level with structured fields.
//!
//! # Usage Pattern
//!
//! ```rust
//! use operator_graph::observability::messages::engine::ExecutionStarted;
//!
//! let msg = ExecutionStarted {
//!     strategy: "work_queue",
//!     node_count: 5,
//!     max_workers: 4,
//! };
//!
//! tracing::info!("{}", msg);
//! ```

use tracing::Span;

pub mod compiler;
pub mod engine;
pub mod graph;
pub mod model;
pub mod trace;

/// Emit a message as a structured `tracing` event, or open a span carrying its fields.
pub trait StructuredLog {
    fn log(&self);

    fn span(&self, name: &str) -> Span;
}
