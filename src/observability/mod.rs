// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing spans.
//!
//! This module provides centralized message types for all diagnostic and operational
//! logging throughout the engine. Message types follow a struct-based pattern
//! with `Display` trait implementation to:
//!
//! * Eliminate magic strings scattered throughout the codebase
//! * Keep field names consistent between the human-readable text and structured fields
//! * Provide consistent, structured logging output
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::graph` - graph construction events
//! * `messages::compiler` - plan compilation and plan cache events
//! * `messages::trace` - tracing and jit events
//! * `messages::engine` - scheduler lifecycle and per-node execution events
//! * `messages::model` - model invocation retries
//!
//! The library only emits events; installing a subscriber is left to the
//! binary (see `main.rs`).
//!
//! # Usage
//!
//! ```rust
//! use operator_graph::observability::messages::engine::NodeFailed;
//! use operator_graph::observability::messages::StructuredLog;
//!
//! let error = std::io::Error::new(std::io::ErrorKind::Other, "test error");
//! NodeFailed {
//!     node_id: "judge",
//!     error: &error,
//! }
//! .log();
//! ```

pub mod messages;
