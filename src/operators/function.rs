// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::OperatorError;
use crate::traits::{Operator, OperatorInput};

/// Custom operator backed by a synchronous closure.
///
/// ```
/// use operator_graph::operators::FnOperator;
/// use serde_json::json;
///
/// let upper = FnOperator::new("upper", |input| {
///     let text = input.value.as_str().unwrap_or_default();
///     Ok(json!(text.to_uppercase()))
/// });
/// ```
pub struct FnOperator<F> {
    name: String,
    function: F,
}

impl<F> FnOperator<F>
where
    F: Fn(OperatorInput) -> Result<Value, OperatorError> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, function: F) -> Self {
        Self {
            name: name.into(),
            function,
        }
    }
}

#[async_trait]
impl<F> Operator for FnOperator<F>
where
    F: Fn(OperatorInput) -> Result<Value, OperatorError> + Send + Sync + 'static,
{
    async fn forward(&self, input: OperatorInput) -> Result<Value, OperatorError> {
        (self.function)(input)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
