// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::ModelService;
use crate::errors::ModelError;

/// Maps model ids to the provider serving them.
#[derive(Default, Clone)]
pub struct ModelRegistry {
    providers: HashMap<String, Arc<dyn ModelService>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `model_id` to `provider`, replacing any previous registration.
    pub fn register(&mut self, model_id: impl Into<String>, provider: Arc<dyn ModelService>) {
        self.providers.insert(model_id.into(), provider);
    }

    pub fn with_model(mut self, model_id: impl Into<String>, provider: Arc<dyn ModelService>) -> Self {
        self.register(model_id, provider);
        self
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.providers.contains_key(model_id)
    }

    /// Registered ids, sorted.
    pub fn model_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.model_ids())
            .finish()
    }
}

#[async_trait]
impl ModelService for ModelRegistry {
    async fn invoke(
        &self,
        model_id: &str,
        prompt: &str,
        params: &Value,
    ) -> Result<String, ModelError> {
        let provider = self
            .providers
            .get(model_id)
            .ok_or_else(|| ModelError::UnknownModel(model_id.to_string()))?;
        provider.invoke(model_id, prompt, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StaticModelService;

    #[tokio::test]
    async fn test_routes_to_registered_provider() {
        let registry = ModelRegistry::new()
            .with_model("a", Arc::new(StaticModelService::new().with_response("a", "from a")))
            .with_model("b", Arc::new(StaticModelService::new()));

        assert_eq!(registry.invoke("a", "hi", &Value::Null).await.unwrap(), "from a");
        assert_eq!(registry.invoke("b", "hi", &Value::Null).await.unwrap(), "[b] hi");
        assert_eq!(registry.model_ids(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_unknown_model() {
        let registry = ModelRegistry::new();
        assert_eq!(
            registry.invoke("ghost", "hi", &Value::Null).await.unwrap_err(),
            ModelError::UnknownModel("ghost".into())
        );
    }
}
