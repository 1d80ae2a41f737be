// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::model_call::effective_params;
use super::PromptTemplate;
use crate::errors::OperatorError;
use crate::models::ModelService;
use crate::traits::{Operator, OperatorInput};

const DEFAULT_TEMPLATE: &str = "We have multiple advisors who proposed different answers.\n\
Query: {query}\n\
Proposed answers:\n\
{responses}\n\
Examine them, reason about which is most accurate, and reply with the final answer.";

/// Reads candidate `responses` and asks a model to synthesize one answer.
///
/// `responses` must be an array of strings, taken from the bound input or
/// from the first upstream output that has it (e.g. an [`super::Ensemble`]).
/// In the template `{responses}` renders as a numbered list.
/// Output: `{"final_answer": <text>}`.
pub struct Judge {
    model_id: String,
    service: Arc<dyn ModelService>,
    template: PromptTemplate,
    params: Value,
}

impl Judge {
    pub fn new(model_id: impl Into<String>, service: Arc<dyn ModelService>) -> Self {
        Self {
            model_id: model_id.into(),
            service,
            template: PromptTemplate::new(DEFAULT_TEMPLATE),
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
}

pub(crate) fn responses(input: &OperatorInput) -> Result<Vec<&str>, OperatorError> {
    let value = input
        .field("responses")
        .ok_or_else(|| OperatorError::invalid_input("missing 'responses'"))?;
    let items = value
        .as_array()
        .ok_or_else(|| OperatorError::invalid_input("'responses' must be an array"))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .ok_or_else(|| OperatorError::invalid_input("'responses' must contain strings"))
        })
        .collect()
}

#[async_trait]
impl Operator for Judge {
    async fn forward(&self, input: OperatorInput) -> Result<Value, OperatorError> {
        let numbered = responses(&input)?
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}. {}", i + 1, r))
            .collect::<Vec<_>>()
            .join("\n");

        // Render against the bound value with `responses` replaced by the numbered list.
        let mut context = match &input.value {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        context.insert("responses".to_string(), Value::String(numbered));
        let render_input = OperatorInput {
            value: Value::Object(context),
            upstream: input.upstream.clone(),
            params: Value::Null,
        };
        let prompt = self.template.render(&render_input)?;

        let params = effective_params(&input.params, &self.params);
        let answer = self.service.invoke(&self.model_id, &prompt, params).await?;
        Ok(json!({ "final_answer": answer.trim() }))
    }

    fn name(&self) -> &str {
        "judge"
    }
}
