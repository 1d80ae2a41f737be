// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::time::Duration;
use thiserror::Error;

/// Failures reported by a [`crate::models::ModelService`].
///
/// The engine never inspects these beyond wrapping them in an
/// [`super::OperatorError`]; retry policy belongs to the service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("model '{0}' is not registered")]
    UnknownModel(String),

    #[error("model '{model_id}' timed out after {after:?}")]
    Timeout { model_id: String, after: Duration },

    #[error("model '{model_id}' failed: {message}")]
    Provider { model_id: String, message: String },

    #[error("model '{model_id}' failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        model_id: String,
        attempts: u32,
        last: Box<ModelError>,
    },
}

impl ModelError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ModelError::Timeout { .. } | ModelError::Provider { .. })
    }
}
