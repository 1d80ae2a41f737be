// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised while building a graph or compiling it into a plan.
//!
//! Both families are surfaced synchronously to the caller and are never retried:
//! a failed call leaves no partial graph or plan behind.

use thiserror::Error;

/// Errors that can occur while constructing a [`crate::graph::Graph`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A node with the same id was already added.
    #[error("duplicate node id '{id}'")]
    DuplicateId { id: String },

    /// An edge or output referenced a node that does not exist.
    #[error("unknown node '{id}'")]
    UnknownNode { id: String },

    /// Adding the edge `from -> to` would close a cycle.
    ///
    /// `path` is the existing route from `to` back to `from`, so the full
    /// cycle reads `from -> path...`.
    #[error("edge '{from}' -> '{to}' would create a cycle: {}", format_cycle(from, path))]
    Cycle {
        from: String,
        to: String,
        path: Vec<String>,
    },

    /// The graph was sealed and can no longer be mutated.
    #[error("graph is sealed")]
    Sealed,
}

fn format_cycle(from: &str, path: &[String]) -> String {
    let mut parts = vec![from.to_string()];
    parts.extend(path.iter().cloned());
    parts.join(" -> ")
}

/// Errors returned by [`crate::compiler::compile`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// Only sealed graphs can be compiled.
    #[error("graph must be sealed before compilation")]
    NotSealed,

    /// The graph has no nodes.
    #[error("graph has no nodes")]
    EmptyGraph,

    /// The graph contains a cycle.
    #[error("cyclic dependency detected: {}", cycle.join(" -> "))]
    Cycle { cycle: Vec<String> },
}
