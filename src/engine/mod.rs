// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Plan executors.
//!
//! Both strategies implement [`PlanExecutor`] with identical result and
//! failure semantics; they differ only in how eagerly they overlap work.

pub mod context;
pub mod factory;
pub mod level_by_level;
pub mod priority_work_queue;
pub mod work_queue;
#[cfg(test)]
mod integration_tests;

pub use context::{ExecutionContext, NodeState, RunOptions, RunOutput};
pub use factory::ExecutorFactory;
pub use level_by_level::LevelByLevelExecutor;
pub use work_queue::WorkQueueExecutor;

use serde_json::Value;

use crate::compiler::Plan;
use crate::errors::RunError;
use crate::traits::PlanExecutor;

/// Worker pool size used when the caller does not choose one.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Run `plan` against `inputs` with the default work-queue strategy and
/// default options (designated outputs, no timeout).
pub async fn run(plan: &Plan, inputs: Value, max_workers: usize) -> Result<RunOutput, RunError> {
    WorkQueueExecutor::new(max_workers).run(plan, inputs).await
}
