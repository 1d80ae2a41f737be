// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::OperatorError;

/// Input handed to an operator for one invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperatorInput {
    /// The node's bound input.
    ///
    /// Traced nodes receive their recorded input expression evaluated against
    /// the run inputs and predecessor outputs. Hand-built nodes receive the
    /// run's global inputs.
    pub value: Value,
    /// Predecessor outputs in edge-insertion order.
    pub upstream: Vec<Value>,
    /// Static parameters attached to the node.
    pub params: Value,
}

impl OperatorInput {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            upstream: Vec::new(),
            params: Value::Null,
        }
    }

    pub fn with_upstream(mut self, upstream: Vec<Value>) -> Self {
        self.upstream = upstream;
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// Look up `key` in the bound value, falling back to the upstream outputs
    /// in order.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.value
            .get(key)
            .or_else(|| self.upstream.iter().find_map(|v| v.get(key)))
    }
}

/// A unit of computation with a single structured input and a single
/// structured output.
///
/// Operators must be callable from any worker task; the engine may invoke
/// the same operator concurrently for different nodes or runs.
#[async_trait]
pub trait Operator: Send + Sync {
    async fn forward(&self, input: OperatorInput) -> Result<Value, OperatorError>;

    /// Operator identity. Two nodes with the same name and params are
    /// considered structurally identical when fingerprinting.
    fn name(&self) -> &str;
}
