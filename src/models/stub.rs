// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::ModelService;
use crate::errors::ModelError;

/// Canned provider for tests and demos.
///
/// Models with a configured response return it verbatim, models configured
/// to fail return a provider error, and every other model echoes the prompt
/// as `"[<model>] <prompt>"`.
#[derive(Debug, Default)]
pub struct StaticModelService {
    responses: HashMap<String, String>,
    failures: HashMap<String, String>,
    calls: AtomicUsize,
}

impl StaticModelService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, model_id: impl Into<String>, response: impl Into<String>) -> Self {
        self.responses.insert(model_id.into(), response.into());
        self
    }

    pub fn with_failure(mut self, model_id: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.insert(model_id.into(), message.into());
        self
    }

    /// Number of invocations served so far, failures included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelService for StaticModelService {
    async fn invoke(
        &self,
        model_id: &str,
        prompt: &str,
        _params: &Value,
    ) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.failures.get(model_id) {
            return Err(ModelError::Provider {
                model_id: model_id.to_string(),
                message: message.clone(),
            });
        }
        Ok(self
            .responses
            .get(model_id)
            .cloned()
            .unwrap_or_else(|| format!("[{}] {}", model_id, prompt)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_canned_echo_and_failure() {
        let service = StaticModelService::new()
            .with_response("fixed", "42")
            .with_failure("broken", "quota exceeded");

        assert_eq!(service.invoke("fixed", "q", &Value::Null).await.unwrap(), "42");
        assert_eq!(service.invoke("other", "q", &Value::Null).await.unwrap(), "[other] q");
        let err = service.invoke("broken", "q", &Value::Null).await.unwrap_err();
        assert_eq!(err.to_string(), "model 'broken' failed: quota exceeded");
        assert_eq!(service.calls(), 3);
    }
}
