// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for model invocation.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// Transient model failure; another attempt is scheduled.
///
/// # Log Level
/// `warn!` - Recoverable problem
pub struct ModelRetry<'a> {
    pub model_id: &'a str,
    pub attempt: u32,
    pub max_attempts: u32,
    pub backoff: Duration,
    pub error: &'a dyn std::error::Error,
}

impl Display for ModelRetry<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Model '{}' attempt {}/{} failed: {}; retrying in {:?}",
            self.model_id, self.attempt, self.max_attempts, self.error, self.backoff
        )
    }
}

impl StructuredLog for ModelRetry<'_> {
    fn log(&self) {
        tracing::warn!(
            model_id = self.model_id,
            attempt = self.attempt,
            max_attempts = self.max_attempts,
            backoff_ms = self.backoff.as_millis() as u64,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "model_retry",
            span_name = name,
            model_id = self.model_id,
            attempt = self.attempt,
        )
    }
}
