// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Work queue executor: dependency counting with node-level readiness.
//!
//! The executor keeps a priority queue of ready nodes and a counter of unmet
//! dependencies per node. Whenever a node completes, each dependent's counter
//! is decremented and dependents reaching zero join the queue. At most
//! `max_workers` operator invocations are in flight at any time.
//!
//! Unlike the level-by-level strategy there is no barrier between waves: a
//! node starts as soon as its own predecessors are done, regardless of how
//! slow unrelated nodes of the same depth are.
//!
//! # Failure policy
//!
//! A failing node fails only its own branch. Its undispatched descendants are
//! marked failed immediately and never run; every other node still runs to
//! completion. The run fails only if a requested output is among the failed
//! nodes.
//!
//! ```text
//!     a
//!    / \
//!   b   c        b fails:
//!   |   |          d is failed without being dispatched
//!   d   e          c and e still run; requesting e succeeds
//! ```
//!
//! # Execution flow
//!
//! 1. Resolve requested outputs and seed the queue with source nodes
//! 2. Dispatch queued nodes while fewer than `max_workers` are in flight
//! 3. Wait for the next completion (or cancellation / timeout)
//! 4. Propagate the result: enqueue newly ready dependents or fail descendants
//! 5. When nothing is queued or in flight, extract the requested outputs
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use operator_graph::compiler::compile;
//! use operator_graph::engine::WorkQueueExecutor;
//! use operator_graph::graph::Graph;
//! use operator_graph::operators::FnOperator;
//! use operator_graph::traits::PlanExecutor;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let double = Arc::new(FnOperator::new("double", |input| {
//!     let n = input.upstream.first().unwrap_or(&input.value).as_i64().unwrap_or(0);
//!     Ok(json!(n * 2))
//! }));
//!
//! let mut graph = Graph::new();
//! graph.add_node(double.clone(), "first")?;
//! graph.add_node(double, "second")?;
//! graph.add_edge("first", "second")?;
//! graph.seal()?;
//!
//! let plan = compile(&graph)?;
//! let output = WorkQueueExecutor::new(4).run(&plan, json!(3)).await?;
//! assert_eq!(output.output("second"), Some(&json!(12)));
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::time::Instant;

use crate::compiler::Plan;
use crate::errors::RunError;
use crate::observability::messages::engine::{
    DescendantsSkipped, ExecutionCancelled, ExecutionCompleted, ExecutionFailed,
    ExecutionStarted, NodeCompleted, NodeFailed,
};
use crate::observability::messages::StructuredLog;
use crate::traits::PlanExecutor;

use super::context::{ExecutionContext, InFlight, RunOptions, RunOutput};
use super::priority_work_queue::{PrioritizedTask, PriorityWorkQueue};
use super::DEFAULT_MAX_WORKERS;

const STRATEGY: &str = "work_queue";

/// Default executor: dispatches each node as soon as its dependencies complete.
#[derive(Debug, Clone)]
pub struct WorkQueueExecutor {
    /// Upper bound on concurrently running operator invocations.
    max_workers: usize,
}

impl WorkQueueExecutor {
    /// `max_workers` is clamped to at least 1.
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }
}

impl Default for WorkQueueExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORKERS)
    }
}

fn enqueue(queue: &mut PriorityWorkQueue, plan: &Plan, ids: Vec<String>) {
    queue.extend(ids.into_iter().map(|id| {
        let position = plan.position(&id).unwrap_or(usize::MAX);
        PrioritizedTask::new(id, position)
    }));
}

#[async_trait]
impl PlanExecutor for WorkQueueExecutor {
    async fn execute(
        &self,
        plan: &Plan,
        inputs: Value,
        options: RunOptions,
    ) -> Result<RunOutput, RunError> {
        // === SETUP ===
        let requested = options.requested_outputs(plan)?;
        let started = Instant::now();
        ExecutionStarted {
            strategy: STRATEGY,
            node_count: plan.len(),
            max_workers: self.max_workers,
        }
        .log();

        let mut ctx = ExecutionContext::new(plan, inputs);
        let mut queue = PriorityWorkQueue::new();
        enqueue(&mut queue, plan, ctx.initially_ready(plan));

        let mut in_flight = InFlight::default();
        let cancelled = options.cancelled();
        tokio::pin!(cancelled);

        // === MAIN LOOP ===
        loop {
            if options.is_cancelled() {
                let reason = crate::errors::CancelReason::Requested;
                ExecutionCancelled {
                    strategy: STRATEGY,
                    reason,
                    in_flight: in_flight.abort_all(),
                }
                .log();
                return Err(RunError::Cancelled { reason });
            }

            while in_flight.len() < self.max_workers {
                let Some(node_id) = queue.pop() else {
                    break;
                };
                let Some(node) = plan.node(&node_id) else {
                    tracing::warn!(node_id = %node_id, "ready node missing from plan");
                    continue;
                };
                let input = ctx.operator_input(plan, &node_id);
                ctx.mark_running(&node_id);
                in_flight.spawn(node_id, node.operator().clone(), input);
            }

            if in_flight.is_empty() {
                // Nothing running and nothing ready: every node is terminal.
                break;
            }

            let next = tokio::select! {
                biased;
                reason = &mut cancelled => {
                    queue.clear();
                    ExecutionCancelled {
                        strategy: STRATEGY,
                        reason,
                        in_flight: in_flight.abort_all(),
                    }
                    .log();
                    return Err(RunError::Cancelled { reason });
                }
                next = in_flight.next() => next,
            };

            // === RESULT PROPAGATION ===
            match next {
                Some((node_id, Ok(value))) => {
                    let ready = ctx.complete(plan, &node_id, value);
                    NodeCompleted {
                        node_id: &node_id,
                        newly_ready: ready.len(),
                    }
                    .log();
                    enqueue(&mut queue, plan, ready);
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
                None => break,
            }
        }

        // === RESULT EXTRACTION ===
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
