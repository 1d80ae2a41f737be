// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::task::JoinSet;

use super::model_call::effective_params;
use super::PromptTemplate;
use crate::errors::OperatorError;
use crate::models::ModelService;
use crate::traits::{Operator, OperatorInput};

/// Sends the same rendered prompt to several models concurrently.
///
/// Output: `{"responses": [...]}` in the order the models were given,
/// regardless of which answered first. Any model failure fails the operator.
pub struct Ensemble {
    models: Vec<String>,
    service: Arc<dyn ModelService>,
    template: PromptTemplate,
    params: Value,
}

impl Ensemble {
    pub fn new<I, S>(models: I, service: Arc<dyn ModelService>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            models: models.into_iter().map(Into::into).collect(),
            service,
            template: PromptTemplate::default(),
            params: Value::Null,
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }
}

#[async_trait]
impl Operator for Ensemble {
    async fn forward(&self, input: OperatorInput) -> Result<Value, OperatorError> {
        if self.models.is_empty() {
            return Err(OperatorError::invalid_input("ensemble has no models"));
        }
        let prompt: Arc<str> = self.template.render(&input)?.into();
        let params = Arc::new(effective_params(&input.params, &self.params).clone());

        let mut calls = JoinSet::new();
        for (index, model_id) in self.models.iter().enumerate() {
            let service = self.service.clone();
            let model_id = model_id.clone();
            let prompt = prompt.clone();
            let params = params.clone();
            calls.spawn(async move {
                let response = service.invoke(&model_id, &prompt, &params).await;
                (index, response)
            });
        }

        let mut responses: Vec<Option<String>> = vec![None; self.models.len()];
        while let Some(joined) = calls.join_next().await {
            let (index, response) = joined.map_err(|e| {
                OperatorError::failed(format!("ensemble member task failed: {}", e))
            })?;
            responses[index] = Some(response?);
        }

        let responses: Vec<String> = responses.into_iter().flatten().collect();
        Ok(json!({ "responses": responses }))
    }

    fn name(&self) -> &str {
        "ensemble"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StaticModelService;

    #[tokio::test]
    async fn test_responses_follow_model_order() {
        let service = StaticModelService::new()
            .with_response("m1", "A")
            .with_response("m2", "B")
            .with_response("m3", "A");
        let op = Ensemble::new(["m1", "m2", "m3"], Arc::new(service));

        let out = op
            .forward(OperatorInput::new(json!({"query": "pick"})))
            .await
            .unwrap();
        assert_eq!(out, json!({"responses": ["A", "B", "A"]}));
    }

    #[tokio::test]
    async fn test_one_failing_member_fails_the_ensemble() {
        let service = StaticModelService::new().with_failure("m2", "boom");
        let op = Ensemble::new(["m1", "m2"], Arc::new(service));
        let err = op
            .forward(OperatorInput::new(json!({"query": "q"})))
            .await
            .unwrap_err();
        assert!(matches!(err, OperatorError::Model(_)));
    }

    #[tokio::test]
    async fn test_empty_ensemble_is_rejected() {
        let op = Ensemble::new(Vec::<String>::new(), Arc::new(StaticModelService::new()));
        assert!(op.forward(OperatorInput::new(json!({"query": "q"}))).await.is_err());
    }
}
