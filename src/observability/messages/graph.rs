// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for graph construction events.

use crate::graph::Fingerprint;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Graph sealed; no further mutation allowed.
///
/// # Log Level
/// `debug!` - Construction detail
pub struct GraphSealed {
    pub node_count: usize,
    pub edge_count: usize,
    pub fingerprint: Fingerprint,
}

impl Display for GraphSealed {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Graph sealed: {} nodes, {} edges, fingerprint={}",
            self.node_count, self.edge_count, self.fingerprint
        )
    }
}

impl StructuredLog for GraphSealed {
    fn log(&self) {
        tracing::debug!(
            node_count = self.node_count,
            edge_count = self.edge_count,
            fingerprint = %self.fingerprint,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "graph_sealed",
            span_name = name,
            node_count = self.node_count,
            edge_count = self.edge_count,
            fingerprint = %self.fingerprint,
        )
    }
}

/// Edge rejected because it would close a cycle.
///
/// # Log Level
/// `warn!` - Caller error surfaced synchronously
pub struct EdgeRejected<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub path: &'a [String],
}

impl Display for EdgeRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Rejected edge '{}' -> '{}': '{}' already reaches '{}' via {}",
            self.from,
            self.to,
            self.to,
            self.from,
            self.path.join(" -> ")
        )
    }
}

impl StructuredLog for EdgeRejected<'_> {
    fn log(&self) {
        tracing::warn!(from = self.from, to = self.to, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("edge_rejected", span_name = name, from = self.from, to = self.to)
    }
}
