// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for tracing imperative code into graphs.

use crate::graph::Fingerprint;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Trace pass finished and produced a sealed graph.
///
/// # Log Level
/// `info!` - Important operational event
pub struct TraceCompleted {
    pub node_count: usize,
    pub edge_count: usize,
    pub fingerprint: Fingerprint,
}

impl Display for TraceCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Traced {} operator calls into {} edges, fingerprint={}",
            self.node_count, self.edge_count, self.fingerprint
        )
    }
}

impl StructuredLog for TraceCompleted {
    fn log(&self) {
        tracing::info!(
            node_count = self.node_count,
            edge_count = self.edge_count,
            fingerprint = %self.fingerprint,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("trace", span_name = name, fingerprint = %self.fingerprint)
    }
}

/// Trace aborted by a failing operator call.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct TraceAborted<'a> {
    pub calls_recorded: usize,
    pub error: &'a dyn std::error::Error,
}

impl Display for TraceAborted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Trace aborted after {} calls: {}",
            self.calls_recorded, self.error
        )
    }
}

impl StructuredLog for TraceAborted<'_> {
    fn log(&self) {
        tracing::error!(calls_recorded = self.calls_recorded, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("trace_aborted", span_name = name, error = %self.error)
    }
}

/// Jit wrapper decided how to serve a call.
///
/// # Log Level
/// `debug!` - Dispatch detail
pub struct JitDispatch<'a> {
    pub function: &'a str,
    pub shape: &'a str,
    pub traced: bool,
}

impl Display for JitDispatch<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.traced {
            write!(f, "Tracing '{}' for input shape {}", self.function, self.shape)
        } else {
            write!(
                f,
                "Reusing compiled plan of '{}' for input shape {}",
                self.function, self.shape
            )
        }
    }
}

impl StructuredLog for JitDispatch<'_> {
    fn log(&self) {
        tracing::debug!(
            function = self.function,
            shape = self.shape,
            traced = self.traced,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("jit", span_name = name, function = self.function)
    }
}
