// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for plan compilation and the plan cache.

use crate::graph::Fingerprint;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Plan compiled from a graph.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use operator_graph::observability::messages::compiler::PlanCompiled;
/// use operator_graph::graph::Fingerprint;
///
/// let msg = PlanCompiled {
///     fingerprint: Fingerprint::from(0xabcd),
///     node_count: 7,
///     wave_count: 3,
/// };
///
/// assert_eq!(msg.to_string(), "Compiled plan 000000000000abcd: 7 nodes in 3 waves");
/// ```
pub struct PlanCompiled {
    pub fingerprint: Fingerprint,
    pub node_count: usize,
    pub wave_count: usize,
}

impl Display for PlanCompiled {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Compiled plan {}: {} nodes in {} waves",
            self.fingerprint, self.node_count, self.wave_count
        )
    }
}

impl StructuredLog for PlanCompiled {
    fn log(&self) {
        tracing::info!(
            fingerprint = %self.fingerprint,
            node_count = self.node_count,
            wave_count = self.wave_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "plan_compiled",
            span_name = name,
            fingerprint = %self.fingerprint,
            node_count = self.node_count,
            wave_count = self.wave_count,
        )
    }
}

/// Compilation failed.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct CompileFailed<'a> {
    pub error: &'a dyn std::error::Error,
}

impl Display for CompileFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Plan compilation failed: {}", self.error)
    }
}

impl StructuredLog for CompileFailed<'_> {
    fn log(&self) {
        tracing::error!(error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("compile_failed", span_name = name, error = %self.error)
    }
}

/// Plan cache lookup outcome.
///
/// # Log Level
/// `debug!` - Cache detail
pub struct CacheLookup {
    pub fingerprint: Fingerprint,
    pub hit: bool,
    pub entries: usize,
}

impl Display for CacheLookup {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let outcome = if self.hit { "hit" } else { "miss" };
        write!(
            f,
            "Plan cache {} for {} ({} cached plans)",
            outcome, self.fingerprint, self.entries
        )
    }
}

impl StructuredLog for CacheLookup {
    fn log(&self) {
        tracing::debug!(
            fingerprint = %self.fingerprint,
            hit = self.hit,
            entries = self.entries,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "cache_lookup",
            span_name = name,
            fingerprint = %self.fingerprint,
            hit = self.hit,
        )
    }
}

/// Least recently used plan evicted from a bounded cache.
///
/// # Log Level
/// `debug!` - Cache detail
pub struct CacheEvicted {
    pub fingerprint: Fingerprint,
    pub capacity: usize,
}

impl Display for CacheEvicted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Evicted plan {} (capacity {})",
            self.fingerprint, self.capacity
        )
    }
}

impl StructuredLog for CacheEvicted {
    fn log(&self) {
        tracing::debug!(
            fingerprint = %self.fingerprint,
            capacity = self.capacity,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("cache_evicted", span_name = name, fingerprint = %self.fingerprint)
    }
}
