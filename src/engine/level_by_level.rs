// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use crate::compiler::Plan;
use crate::errors::{CancelReason, RunError};
use crate::observability::messages::engine::{
    DescendantsSkipped, ExecutionCancelled, ExecutionCompleted, ExecutionFailed,
    ExecutionStarted, NodeCompleted, NodeFailed, WaveStarted,
};
use crate::observability::messages::StructuredLog;
use crate::traits::PlanExecutor;

use super::context::{ExecutionContext, InFlight, NodeState, RunOptions, RunOutput};
use super::DEFAULT_MAX_WORKERS;

const STRATEGY: &str = "level";

/// Level-by-level executor that runs the plan one wave at a time.
///
/// Every node of wave `k` finishes (or fails) before any node of wave `k + 1`
/// is dispatched. Within a wave, at most `max_workers` nodes run concurrently
/// in plan order. Failure and result semantics match [`super::WorkQueueExecutor`]:
/// a failure fails its undispatched descendants and nothing else.
///
/// ## When to use it
///
/// The wave barrier gives up overlap between a slow node and the next wave's
/// unrelated nodes, in exchange for a run whose progress is easy to read in
/// logs: every wave boundary is a `WaveStarted` event.
pub struct LevelByLevelExecutor {
    /// Maximum number of concurrent operator invocations within a wave
    max_workers: usize,
}

impl LevelByLevelExecutor {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    /// Run the still-runnable nodes of one wave to completion.
    ///
    /// Nodes already failed by an upstream failure are skipped. Returns the
    /// cancel reason if the run is cancelled mid-wave.
    async fn execute_wave<F>(
        &self,
        plan: &Plan,
        wave: &[String],
        ctx: &mut ExecutionContext,
        cancelled: &mut Pin<&mut F>,
    ) -> Result<(), CancelReason>
    where
        F: Future<Output = CancelReason>,
    {
        let runnable: Vec<String> = wave
            .iter()
            .filter(|id| ctx.state(id) == Some(NodeState::Ready))
            .cloned()
            .collect();
        let mut pending = runnable.iter();
        let mut in_flight = InFlight::default();

        loop {
            while in_flight.len() < self.max_workers {
                let Some(node_id) = pending.next() else {
                    break;
                };
                let Some(node) = plan.node(node_id) else {
                    continue;
                };
                let input = ctx.operator_input(plan, node_id);
                ctx.mark_running(node_id);
                in_flight.spawn(node_id.clone(), node.operator().clone(), input);
            }

            if in_flight.is_empty() {
                return Ok(());
            }

            let next = tokio::select! {
                biased;
                reason = cancelled.as_mut() => {
                    ExecutionCancelled {
                        strategy: STRATEGY,
                        reason,
                        in_flight: in_flight.abort_all(),
                    }
                    .log();
                    return Err(reason);
                }
                next = in_flight.next() => next,
            };

            match next {
                Some((node_id, Ok(value))) => {
                    // Dependents live in later waves; readiness is tracked for the states report.
                    let ready = ctx.complete(plan, &node_id, value);
                    NodeCompleted {
                        node_id: &node_id,
                        newly_ready: ready.len(),
                    }
                    .log();
                }
                Some((node_id, Err(error))) => {
                    NodeFailed {
                        node_id: &node_id,
                        error: &error,
                    }
                    .log();
                    let skipped = ctx.fail(plan, &node_id, error);
                    if !skipped.is_empty() {
                        DescendantsSkipped {
                            cause: &node_id,
                            skipped: &skipped,
                        }
                        .log();
                    }
                }
                None => return Ok(()),
            }
        }
    }
}

impl Default for LevelByLevelExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORKERS)
    }
}

#[async_trait]
impl PlanExecutor for LevelByLevelExecutor {
    async fn execute(
        &self,
        plan: &Plan,
        inputs: Value,
        options: RunOptions,
    ) -> Result<RunOutput, RunError> {
        let requested = options.requested_outputs(plan)?;
        let started = Instant::now();
        ExecutionStarted {
            strategy: STRATEGY,
            node_count: plan.len(),
            max_workers: self.max_workers,
        }
        .log();

        let mut ctx = ExecutionContext::new(plan, inputs);
        let cancelled = options.cancelled();
        tokio::pin!(cancelled);

        for (index, wave) in plan.waves().iter().enumerate() {
            if options.is_cancelled() {
                let reason = CancelReason::Requested;
                ExecutionCancelled {
                    strategy: STRATEGY,
                    reason,
                    in_flight: 0,
                }
                .log();
                return Err(RunError::Cancelled { reason });
            }

            WaveStarted {
                wave: index,
                node_count: wave.len(),
            }
            .log();
            self.execute_wave(plan, wave, &mut ctx, &mut cancelled)
                .await
                .map_err(|reason| RunError::Cancelled { reason })?;
        }

        let (completed, failed) = (ctx.completed_count(), ctx.failed_count());
        let result = ctx.finish(plan, &requested);
        match &result {
            Ok(_) => ExecutionCompleted {
                strategy: STRATEGY,
                completed,
                failed,
                duration: started.elapsed(),
            }
            .log(),
            Err(error) => ExecutionFailed {
                strategy: STRATEGY,
                error,
            }
            .log(),
        }
        result
    }

    fn strategy(&self) -> &'static str {
        STRATEGY
    }

    fn max_workers(&self) -> usize {
        self.max_workers
    }
}
