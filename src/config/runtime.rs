// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::compiler::{Plan, PlanCache};
use crate::config::EngineConfig;
use crate::engine::factory::ExecutorFactory;
use crate::engine::{RunOptions, RunOutput};
use crate::errors::{CompileError, RunError, TraceError};
use crate::graph::Graph;
use crate::models::{ModelService, RetryPolicy, RetryingService};
use crate::tracer::{JitFunction, Traced, Tracer};
use crate::traits::PlanExecutor;

/// Engine builder - wires an executor and a plan cache from configuration.
///
/// # Examples
///
/// ```
/// use operator_graph::config::{EngineBuilder, EngineConfig, Strategy};
///
/// let config = EngineConfig {
///     strategy: Strategy::Level,
///     max_workers: 2,
///     ..EngineConfig::default()
/// };
///
/// let engine = EngineBuilder::from_config(&config).build();
/// assert_eq!(engine.executor().strategy(), "level");
/// assert_eq!(engine.executor().max_workers(), 2);
/// ```
pub struct EngineBuilder {
    config: EngineConfig,
    executor: Option<Arc<dyn PlanExecutor>>,
    cache: Option<Arc<PlanCache>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::from_config(&EngineConfig::default())
    }

    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            config: cfg.clone(),
            executor: None,
            cache: None,
        }
    }

    /// Use a caller-built executor instead of the configured strategy.
    pub fn with_executor(mut self, executor: Arc<dyn PlanExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Share an existing plan cache instead of creating one.
    pub fn with_cache(mut self, cache: Arc<PlanCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> Engine {
        let executor = self
            .executor
            .unwrap_or_else(|| ExecutorFactory::from_config(&self.config));
        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(match self.config.plan_cache.max_entries {
                Some(capacity) => PlanCache::with_capacity(capacity),
                None => PlanCache::new(),
            })
        });
        Engine {
            executor,
            cache,
            timeout: self.config.timeout(),
            retry: self.config.model_retry,
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Executor plus plan cache, with the configured run deadline applied.
#[derive(Clone)]
pub struct Engine {
    executor: Arc<dyn PlanExecutor>,
    cache: Arc<PlanCache>,
    timeout: Option<Duration>,
    retry: RetryPolicy,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn executor(&self) -> &Arc<dyn PlanExecutor> {
        &self.executor
    }

    pub fn cache(&self) -> &Arc<PlanCache> {
        &self.cache
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Compile through the plan cache.
    pub fn compile(&self, graph: &Graph) -> Result<Plan, CompileError> {
        self.cache.compile(graph)
    }

    /// Execute `plan`. The configured timeout applies unless `options` sets its own.
    pub async fn execute(
        &self,
        plan: &Plan,
        inputs: Value,
        mut options: RunOptions,
    ) -> Result<RunOutput, RunError> {
        if options.timeout.is_none() {
            options.timeout = self.timeout;
        }
        self.executor.execute(plan, inputs, options).await
    }

    pub async fn run(&self, plan: &Plan, inputs: Value) -> Result<RunOutput, RunError> {
        self.execute(plan, inputs, RunOptions::default()).await
    }

    /// Wrap a traced function so it compiles into this engine's cache and
    /// runs on this engine's executor.
    pub fn jit<F, Fut>(&self, name: impl Into<String>, function: F) -> JitFunction<F>
    where
        F: Fn(Tracer) -> Fut + Send + Sync,
        Fut: Future<Output = Result<Vec<Traced>, TraceError>> + Send,
    {
        JitFunction::new(name, self.executor.clone(), function).with_cache(self.cache.clone())
    }

    /// Wrap a model service with the configured retry policy.
    pub fn retrying<S: ModelService>(&self, service: S) -> RetryingService<S> {
        RetryingService::new(service, self.retry.clone())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("strategy", &self.executor.strategy())
            .field("max_workers", &self.executor.max_workers())
            .field("cache", &self.cache.stats())
            .field("timeout", &self.timeout)
            .finish()
    }
}
