// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;

use super::judge::responses;
use crate::errors::OperatorError;
use crate::traits::{Operator, OperatorInput};

/// Majority vote over `responses`. Ties go to the response seen first.
/// Output: `{"final_answer": <text>}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MostCommon;

impl MostCommon {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Operator for MostCommon {
    async fn forward(&self, input: OperatorInput) -> Result<Value, OperatorError> {
        let candidates = responses(&input)?;
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for candidate in &candidates {
            *counts.entry(*candidate).or_default() += 1;
        }

        let mut best: Option<(&str, usize)> = None;
        for candidate in &candidates {
            let count = counts[candidate];
            if best.map_or(true, |(_, top)| count > top) {
                best = Some((*candidate, count));
            }
        }

        let (answer, _) =
            best.ok_or_else(|| OperatorError::invalid_input("'responses' is empty"))?;
        Ok(json!({ "final_answer": answer }))
    }

    fn name(&self) -> &str {
        "most_common"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn vote(responses: Value) -> Result<Value, OperatorError> {
        MostCommon
            .forward(OperatorInput::new(json!({ "responses": responses })))
            .await
    }

    #[tokio::test]
    async fn test_majority_wins() {
        assert_eq!(
            vote(json!(["b", "a", "b"])).await.unwrap(),
            json!({"final_answer": "b"})
        );
    }

    #[tokio::test]
    async fn test_tie_goes_to_earliest() {
        assert_eq!(
            vote(json!(["x", "y", "y", "x"])).await.unwrap(),
            json!({"final_answer": "x"})
        );
    }

    #[tokio::test]
    async fn test_empty_responses() {
        assert!(vote(json!([])).await.is_err());
    }
}
