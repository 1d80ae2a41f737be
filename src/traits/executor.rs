// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;

use crate::compiler::Plan;
use crate::engine::{RunOptions, RunOutput};
use crate::errors::RunError;

#[async_trait]
pub trait PlanExecutor: Send + Sync {
    /// Execute a compiled plan against `inputs`.
    ///
    /// - `plan`: compiled, read-only plan (safe to share across concurrent runs)
    /// - `inputs`: globally-visible run inputs
    /// - `options`: requested outputs, timeout and cancellation
    ///
    /// Returns the requested output values, or a [`RunError`] if any
    /// requested output failed or the run was cancelled. Failures on branches
    /// the outputs do not depend on are reported in [`RunOutput::failures`].
    async fn execute(
        &self,
        plan: &Plan,
        inputs: Value,
        options: RunOptions,
    ) -> Result<RunOutput, RunError>;

    /// Execute with default options: designated outputs, no timeout.
    async fn run(&self, plan: &Plan, inputs: Value) -> Result<RunOutput, RunError> {
        self.execute(plan, inputs, RunOptions::default()).await
    }

    /// Strategy name, for logging.
    fn strategy(&self) -> &'static str;

    fn max_workers(&self) -> usize;
}
