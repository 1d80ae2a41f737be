// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::ModelService;
use crate::errors::ModelError;
use crate::observability::messages::model::ModelRetry;
use crate::observability::messages::StructuredLog;

/// Attempt limit, backoff and per-attempt timeout for model calls.
///
/// # Example
/// ```yaml
/// model_retry:
///   max_attempts: 3
///   initial_backoff_ms: 1000
///   max_backoff_ms: 10000
///   attempt_timeout_ms: 30000
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first. Clamped to at least 1.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// `None` lets an attempt run as long as the provider takes.
    pub attempt_timeout_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 10_000,
            attempt_timeout_ms: None,
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt number `attempt` (1-based): doubles each time, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let millis = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_ms.map(Duration::from_millis)
    }
}

/// Wraps a service with retries on transient errors.
///
/// Timeouts and provider errors are retried with exponential backoff;
/// anything else (e.g. an unknown model) fails immediately.
pub struct RetryingService<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: ModelService> RetryingService<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn attempt(
        &self,
        model_id: &str,
        prompt: &str,
        params: &Value,
    ) -> Result<String, ModelError> {
        let call = self.inner.invoke(model_id, prompt, params);
        match self.policy.attempt_timeout() {
            Some(after) => tokio::time::timeout(after, call)
                .await
                .unwrap_or_else(|_| {
                    Err(ModelError::Timeout {
                        model_id: model_id.to_string(),
                        after,
                    })
                }),
            None => call.await,
        }
    }
}

#[async_trait]
impl<S: ModelService> ModelService for RetryingService<S> {
    async fn invoke(
        &self,
        model_id: &str,
        prompt: &str,
        params: &Value,
    ) -> Result<String, ModelError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let error = match self.attempt(model_id, prompt, params).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            if !error.is_transient() {
                return Err(error);
            }
            if attempt >= max_attempts {
                if max_attempts == 1 {
                    return Err(error);
                }
                return Err(ModelError::RetriesExhausted {
                    model_id: model_id.to_string(),
                    attempts: attempt,
                    last: Box::new(error),
                });
            }

            let backoff = self.policy.backoff(attempt);
            ModelRetry {
                model_id,
                attempt,
                max_attempts,
                backoff,
                error: &error,
            }
            .log();
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}
