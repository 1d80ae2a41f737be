// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::PromptTemplate;
use crate::errors::OperatorError;
use crate::models::ModelService;
use crate::traits::{Operator, OperatorInput};

/// Single model invocation. Output: `{"response": <text>}`.
pub struct ModelCall {
    model_id: String,
    service: Arc<dyn ModelService>,
    template: PromptTemplate,
    params: Value,
}

impl ModelCall {
    pub fn new(model_id: impl Into<String>, service: Arc<dyn ModelService>) -> Self {
        Self {
            model_id: model_id.into(),
            service,
            template: PromptTemplate::default(),
            params: Value::Null,
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Invocation parameters (temperature, max tokens, ...) forwarded to the service.
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Node params take precedence over the operator's own.
pub(crate) fn effective_params<'a>(node: &'a Value, own: &'a Value) -> &'a Value {
    if node.is_null() {
        own
    } else {
        node
    }
}

#[async_trait]
impl Operator for ModelCall {
    async fn forward(&self, input: OperatorInput) -> Result<Value, OperatorError> {
        let prompt = self.template.render(&input)?;
        let params = effective_params(&input.params, &self.params);
        let response = self.service.invoke(&self.model_id, &prompt, params).await?;
        Ok(json!({ "response": response }))
    }

    fn name(&self) -> &str {
        "model_call"
    }
}
