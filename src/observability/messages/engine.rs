// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for scheduler lifecycle and execution events.
//!
//! This module contains message types for logging events related to:
//! * Run lifecycle (start, completion, failure, cancellation)
//! * Per-node dispatch, completion and failure
//! * Wave boundaries for the level-by-level executor

use crate::errors::CancelReason;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Run started with specified strategy and configuration.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use operator_graph::observability::messages::engine::ExecutionStarted;
///
/// let msg = ExecutionStarted {
///     strategy: "work_queue",
///     node_count: 5,
///     max_workers: 4,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ExecutionStarted<'a> {
    pub strategy: &'a str,
    pub node_count: usize,
    pub max_workers: usize,
}

impl Display for ExecutionStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting run with {} strategy: {} nodes, max_workers={}",
            self.strategy, self.node_count, self.max_workers
        )
    }
}

impl StructuredLog for ExecutionStarted<'_> {
    fn log(&self) {
        tracing::info!(
            strategy = self.strategy,
            node_count = self.node_count,
            max_workers = self.max_workers,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "execution",
            span_name = name,
            strategy = self.strategy,
            node_count = self.node_count,
            max_workers = self.max_workers,
        )
    }
}

/// Run reached a terminal state for every node.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use operator_graph::observability::messages::engine::ExecutionCompleted;
/// use std::time::Duration;
///
/// let msg = ExecutionCompleted {
///     strategy: "work_queue",
///     completed: 4,
///     failed: 1,
///     duration: Duration::from_millis(250),
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ExecutionCompleted<'a> {
    pub strategy: &'a str,
    pub completed: usize,
    pub failed: usize,
    pub duration: std::time::Duration,
}

impl Display for ExecutionCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Run completed with {} strategy: {} completed, {} failed in {:?}",
            self.strategy, self.completed, self.failed, self.duration
        )
    }
}

impl StructuredLog for ExecutionCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            strategy = self.strategy,
            completed = self.completed,
            failed = self.failed,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "execution_completed",
            span_name = name,
            strategy = self.strategy,
            completed = self.completed,
            failed = self.failed,
            duration = ?self.duration,
        )
    }
}

/// Run failed because a requested output could not be produced.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct ExecutionFailed<'a> {
    pub strategy: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ExecutionFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Run failed with {} strategy: {}", self.strategy, self.error)
    }
}

impl StructuredLog for ExecutionFailed<'_> {
    fn log(&self) {
        tracing::error!(strategy = self.strategy, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "execution_failed",
            span_name = name,
            strategy = self.strategy,
            error = %self.error,
        )
    }
}

/// Run cancelled; in-flight nodes aborted and nothing further dispatched.
///
/// # Log Level
/// `warn!` - Run did not finish
pub struct ExecutionCancelled<'a> {
    pub strategy: &'a str,
    pub reason: CancelReason,
    pub in_flight: usize,
}

impl Display for ExecutionCancelled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Run cancelled with {} strategy ({}); aborting {} in-flight nodes",
            self.strategy, self.reason, self.in_flight
        )
    }
}

impl StructuredLog for ExecutionCancelled<'_> {
    fn log(&self) {
        tracing::warn!(
            strategy = self.strategy,
            reason = %self.reason,
            in_flight = self.in_flight,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "execution_cancelled",
            span_name = name,
            strategy = self.strategy,
            reason = %self.reason,
        )
    }
}

/// Node dispatched to a worker.
///
/// # Log Level
/// `debug!` - Per-node detail
pub struct NodeDispatched<'a> {
    pub node_id: &'a str,
    pub operator: &'a str,
    pub in_flight: usize,
}

impl Display for NodeDispatched<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dispatching node '{}' ({}), {} in flight",
            self.node_id, self.operator, self.in_flight
        )
    }
}

impl StructuredLog for NodeDispatched<'_> {
    fn log(&self) {
        tracing::debug!(
            node_id = self.node_id,
            operator = self.operator,
            in_flight = self.in_flight,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "node",
            span_name = name,
            node_id = self.node_id,
            operator = self.operator,
        )
    }
}

/// Node completed and its result was stored.
///
/// # Log Level
/// `debug!` - Per-node detail
pub struct NodeCompleted<'a> {
    pub node_id: &'a str,
    pub newly_ready: usize,
}

impl Display for NodeCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' completed, {} dependents became ready",
            self.node_id, self.newly_ready
        )
    }
}

impl StructuredLog for NodeCompleted<'_> {
    fn log(&self) {
        tracing::debug!(node_id = self.node_id, newly_ready = self.newly_ready, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("node_completed", span_name = name, node_id = self.node_id)
    }
}

/// Node's operator returned an error.
///
/// # Log Level
/// `warn!` - The failure is contained to the node's branch
pub struct NodeFailed<'a> {
    pub node_id: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for NodeFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Node '{}' failed: {}", self.node_id, self.error)
    }
}

impl StructuredLog for NodeFailed<'_> {
    fn log(&self) {
        tracing::warn!(node_id = self.node_id, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "node_failed",
            span_name = name,
            node_id = self.node_id,
            error = %self.error,
        )
    }
}

/// Descendants of a failed node marked failed without being dispatched.
///
/// # Log Level
/// `debug!` - Propagation detail
pub struct DescendantsSkipped<'a> {
    pub cause: &'a str,
    pub skipped: &'a [String],
}

impl Display for DescendantsSkipped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Skipping {} descendants of failed node '{}': [{}]",
            self.skipped.len(),
            self.cause,
            self.skipped.join(", ")
        )
    }
}

impl StructuredLog for DescendantsSkipped<'_> {
    fn log(&self) {
        tracing::debug!(cause = self.cause, skipped = self.skipped.len(), "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("descendants_skipped", span_name = name, cause = self.cause)
    }
}

/// Wave started by the level-by-level executor.
///
/// # Log Level
/// `debug!` - Scheduling detail
pub struct WaveStarted {
    pub wave: usize,
    pub node_count: usize,
}

impl Display for WaveStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Starting wave {} with {} nodes", self.wave, self.node_count)
    }
}

impl StructuredLog for WaveStarted {
    fn log(&self) {
        tracing::debug!(wave = self.wave, node_count = self.node_count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("wave", span_name = name, wave = self.wave)
    }
}
