// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Boundary to the model invocation service.
//!
//! Operators that call models depend on a [`ModelService`] handle passed in
//! at construction. A [`ModelRegistry`] is the usual handle: it is built once
//! at startup, maps model ids to providers and is shared by reference, so
//! there is no process-wide registry.

mod registry;
mod retry;
mod stub;

pub use registry::ModelRegistry;
pub use retry::{RetryPolicy, RetryingService};
pub use stub::StaticModelService;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::ModelError;

/// Something that can turn a prompt into a model response.
///
/// Implementations own their timeout, retry and rate-limit policy; the
/// engine treats every error as an ordinary operator failure.
#[async_trait]
pub trait ModelService: Send + Sync {
    async fn invoke(&self, model_id: &str, prompt: &str, params: &Value)
        -> Result<String, ModelError>;
}
