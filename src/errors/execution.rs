// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors for plan execution: per-node operator failures and the aggregate run outcome.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use super::ModelError;

/// Error raised by a single operator invocation.
///
/// Attached to the node whose operator raised it and propagated to that
/// node's descendants only.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperatorError {
    /// The operator could not interpret its input.
    #[error("invalid operator input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    /// The operator task panicked; the panic was contained to its node.
    #[error("operator panicked: {0}")]
    Panicked(String),

    /// The invocation was aborted because the run was cancelled.
    #[error("operator invocation cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),
}

impl OperatorError {
    pub fn failed(message: impl Into<String>) -> Self {
        OperatorError::Failed(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        OperatorError::InvalidInput(message.into())
    }
}

/// Why a node ended in the `Failed` state.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeFailure {
    /// The node's own operator returned an error.
    Operator(OperatorError),
    /// The node was never dispatched because `cause` (an ancestor) failed.
    Upstream { cause: String },
}

impl fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeFailure::Operator(err) => write!(f, "{}", err),
            NodeFailure::Upstream { cause } => write!(f, "upstream node '{}' failed", cause),
        }
    }
}

/// One requested output that could not be produced.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFailure {
    /// The requested output node.
    pub output: String,
    /// The node whose operator actually failed (the output itself, or an ancestor).
    pub cause_node: String,
    /// The error raised by `cause_node`.
    pub error: OperatorError,
}

impl fmt::Display for OutputFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.output == self.cause_node {
            write!(f, "'{}': {}", self.output, self.error)
        } else {
            write!(
                f,
                "'{}': upstream '{}' failed: {}",
                self.output, self.cause_node, self.error
            )
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Timeout(Duration),
    Requested,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Timeout(after) => write!(f, "timed out after {:?}", after),
            CancelReason::Requested => write!(f, "cancellation requested"),
        }
    }
}

/// Aggregate outcome of a failed run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunError {
    /// At least one requested output failed, directly or through an ancestor.
    #[error("{} requested output(s) failed: {}", failures.len(), join_failures(failures))]
    OutputsFailed { failures: Vec<OutputFailure> },

    /// The run was cancelled before every output reached a terminal state.
    #[error("run cancelled: {reason}")]
    Cancelled { reason: CancelReason },

    /// A requested output is not a node of the plan.
    #[error("requested output '{0}' is not a node of the plan")]
    UnknownOutput(String),
}

impl RunError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunError::Cancelled { .. })
    }
}

fn join_failures(failures: &[OutputFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
