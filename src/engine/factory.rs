// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use crate::config::{EngineConfig, Strategy};
use crate::engine::level_by_level::LevelByLevelExecutor;
use crate::engine::work_queue::WorkQueueExecutor;
use crate::traits::PlanExecutor;

/// Factory for creating plan executors from configuration
pub struct ExecutorFactory;

impl ExecutorFactory {
    /// Create a plan executor based on the configured strategy
    pub fn from_config(cfg: &EngineConfig) -> Arc<dyn PlanExecutor> {
        Self::create(cfg.strategy, cfg.max_workers)
    }

    pub fn create(strategy: Strategy, max_workers: usize) -> Arc<dyn PlanExecutor> {
        match strategy {
            Strategy::WorkQueue => Arc::new(WorkQueueExecutor::new(max_workers)),
            Strategy::Level => Arc::new(LevelByLevelExecutor::new(max_workers)),
        }
    }
}
