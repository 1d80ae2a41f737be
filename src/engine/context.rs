// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-run execution state shared by both scheduling strategies.
//!
//! An [`ExecutionContext`] is created by one `execute` call and owned by that
//! call's scheduling loop; it is never shared across runs. Operator tasks do
//! not touch it: they receive an owned [`OperatorInput`] when dispatched and
//! hand their result back through the task join, so the write of a node's
//! result always happens-before any dependent reads it.

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::compiler::Plan;
use crate::errors::{CancelReason, NodeFailure, OperatorError, OutputFailure, RunError};
use crate::observability::messages::engine::NodeDispatched;
use crate::observability::messages::StructuredLog;
use crate::traits::{Operator, OperatorInput};

/// Lifecycle of one node within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// Waiting on at least one predecessor.
    Pending,
    /// All predecessors completed; queued for dispatch.
    Ready,
    /// Dispatched to a worker.
    Running,
    Completed,
    Failed,
}

impl NodeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeState::Completed | NodeState::Failed)
    }
}

/// Caller-supplied knobs for a single run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Nodes whose results to return. `None` uses the plan's designated outputs.
    pub outputs: Option<Vec<String>>,
    /// Cancel the run if it has not finished after this long.
    pub timeout: Option<Duration>,
    /// External cancellation signal.
    pub cancellation: Option<CancellationToken>,
}

impl RunOptions {
    pub fn with_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = Some(outputs.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Resolve the requested outputs against `plan`, rejecting unknown ids.
    pub(crate) fn requested_outputs(&self, plan: &Plan) -> Result<Vec<String>, RunError> {
        let requested = match &self.outputs {
            Some(ids) => ids.clone(),
            None => plan.outputs().to_vec(),
        };
        if let Some(unknown) = requested.iter().find(|id| !plan.contains(id)) {
            return Err(RunError::UnknownOutput(unknown.clone()));
        }
        Ok(requested)
    }

    /// Future resolving once the run should stop: external cancellation or timeout.
    pub(crate) fn cancelled(&self) -> impl std::future::Future<Output = CancelReason> {
        let token = self.cancellation.clone().unwrap_or_default();
        let timeout = self.timeout;
        async move {
            match timeout {
                Some(after) => tokio::select! {
                    _ = token.cancelled() => CancelReason::Requested,
                    _ = tokio::time::sleep(after) => CancelReason::Timeout(after),
                },
                None => {
                    token.cancelled().await;
                    CancelReason::Requested
                }
            }
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false)
    }
}

/// Successful run result.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    /// Requested output values, in request order.
    pub outputs: IndexMap<String, Value>,
    /// Nodes whose own operator failed, in plan order. Only failures on
    /// branches the requested outputs do not depend on can appear here.
    pub failures: IndexMap<String, OperatorError>,
    /// Terminal state of every node, in plan order.
    pub states: IndexMap<String, NodeState>,
}

impl RunOutput {
    pub fn output(&self, id: &str) -> Option<&Value> {
        self.outputs.get(id)
    }

    /// Consume the output and return the first requested value.
    pub fn into_first(self) -> Option<Value> {
        self.outputs.into_iter().next().map(|(_, v)| v)
    }
}

/// Mutable state of one run.
#[derive(Debug)]
pub struct ExecutionContext {
    inputs: Value,
    /// Write-once per node.
    results: HashMap<String, Value>,
    remaining: HashMap<String, usize>,
    states: HashMap<String, NodeState>,
    failures: HashMap<String, NodeFailure>,
}

impl ExecutionContext {
    pub fn new(plan: &Plan, inputs: Value) -> Self {
        let mut remaining = HashMap::with_capacity(plan.len());
        let mut states = HashMap::with_capacity(plan.len());
        for id in plan.order() {
            let count = plan.predecessors(id).len();
            remaining.insert(id.clone(), count);
            let state = if count == 0 {
                NodeState::Ready
            } else {
                NodeState::Pending
            };
            states.insert(id.clone(), state);
        }
        Self {
            inputs,
            results: HashMap::new(),
            remaining,
            states,
            failures: HashMap::new(),
        }
    }

    /// Source nodes, in plan order.
    pub fn initially_ready(&self, plan: &Plan) -> Vec<String> {
        plan.order()
            .iter()
            .filter(|id| self.state(id) == Some(NodeState::Ready))
            .cloned()
            .collect()
    }

    pub fn state(&self, id: &str) -> Option<NodeState> {
        self.states.get(id).copied()
    }

    pub fn result(&self, id: &str) -> Option<&Value> {
        self.results.get(id)
    }

    pub fn inputs(&self) -> &Value {
        &self.inputs
    }

    /// Build the input for `id`. Only valid once every predecessor completed.
    pub fn operator_input(&self, plan: &Plan, id: &str) -> OperatorInput {
        let upstream: Vec<Value> = plan
            .predecessors(id)
            .iter()
            .map(|dep| self.results.get(dep).cloned().unwrap_or(Value::Null))
            .collect();

        let node = plan.node(id);
        let value = match node.and_then(|n| n.binding()) {
            Some(binding) => binding.evaluate(&self.inputs, &|dep: &str| self.results.get(dep)),
            None => self.inputs.clone(),
        };
        let params = node.map(|n| n.params().clone()).unwrap_or(Value::Null);

        OperatorInput::new(value)
            .with_upstream(upstream)
            .with_params(params)
    }

    pub fn mark_running(&mut self, id: &str) {
        self.states.insert(id.to_string(), NodeState::Running);
    }

    /// Store `id`'s result and return the dependents that became ready, in plan order.
    pub fn complete(&mut self, plan: &Plan, id: &str, value: Value) -> Vec<String> {
        if self.results.contains_key(id) {
            tracing::warn!(node_id = id, "ignoring second result for node");
            return Vec::new();
        }
        self.results.insert(id.to_string(), value);
        self.states.insert(id.to_string(), NodeState::Completed);

        let mut ready = Vec::new();
        for dependent in plan.successors(id) {
            let Some(count) = self.remaining.get_mut(dependent) else {
                continue;
            };
            *count = count.saturating_sub(1);
            if *count == 0 && self.state(dependent) == Some(NodeState::Pending) {
                self.states.insert(dependent.clone(), NodeState::Ready);
                ready.push(dependent.clone());
            }
        }
        ready
    }

    /// Record `id`'s failure and fail every descendant that has not reached a
    /// terminal state. Returns the descendants failed by this call, in plan order.
    pub fn fail(&mut self, plan: &Plan, id: &str, error: OperatorError) -> Vec<String> {
        self.states.insert(id.to_string(), NodeState::Failed);
        self.failures
            .insert(id.to_string(), NodeFailure::Operator(error));

        let mut skipped = Vec::new();
        for descendant in plan.descendants(id) {
            if self.state(&descendant).is_some_and(NodeState::is_terminal) {
                continue;
            }
            self.states.insert(descendant.clone(), NodeState::Failed);
            self.failures.insert(
                descendant.clone(),
                NodeFailure::Upstream {
                    cause: id.to_string(),
                },
            );
            skipped.push(descendant);
        }
        skipped
    }

    pub fn completed_count(&self) -> usize {
        self.results.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    /// Resolve the requested outputs into the run's final result.
    pub fn finish(mut self, plan: &Plan, requested: &[String]) -> Result<RunOutput, RunError> {
        let mut failed_outputs = Vec::new();
        let mut outputs = IndexMap::with_capacity(requested.len());

        for output in requested {
            if let Some(value) = self.results.get(output) {
                outputs.insert(output.clone(), value.clone());
                continue;
            }
            let (cause_node, error) = self.root_cause(output);
            failed_outputs.push(OutputFailure {
                output: output.clone(),
                cause_node,
                error,
            });
        }

        if !failed_outputs.is_empty() {
            return Err(RunError::OutputsFailed {
                failures: failed_outputs,
            });
        }

        let mut failures = IndexMap::new();
        let mut states = IndexMap::with_capacity(plan.len());
        for id in plan.order() {
            if let Some(NodeFailure::Operator(error)) = self.failures.remove(id) {
                failures.insert(id.clone(), error);
            }
            states.insert(id.clone(), self.state(id).unwrap_or(NodeState::Pending));
        }

        Ok(RunOutput {
            outputs,
            failures,
            states,
        })
    }

    fn root_cause(&self, id: &str) -> (String, OperatorError) {
        match self.failures.get(id) {
            Some(NodeFailure::Operator(error)) => (id.to_string(), error.clone()),
            Some(NodeFailure::Upstream { cause }) => match self.failures.get(cause) {
                Some(NodeFailure::Operator(error)) => (cause.clone(), error.clone()),
                _ => (
                    cause.clone(),
                    OperatorError::failed("upstream failure without a recorded cause"),
                ),
            },
            None => (
                id.to_string(),
                OperatorError::failed("node did not reach a terminal state"),
            ),
        }
    }
}

/// Operator invocations currently running for one run.
///
/// Each invocation is its own tokio task so a panicking operator only fails
/// its node. Dropping the set aborts whatever is still running.
#[derive(Default)]
pub(crate) struct InFlight {
    tasks: JoinSet<Result<Value, OperatorError>>,
    nodes: HashMap<task::Id, String>,
}

impl InFlight {
    /// Start one operator invocation inside a `node` span carrying its id and operator name.
    pub fn spawn(&mut self, node_id: String, operator: Arc<dyn Operator>, input: OperatorInput) {
        let dispatched = NodeDispatched {
            node_id: &node_id,
            operator: operator.name(),
            in_flight: self.tasks.len() + 1,
        };
        dispatched.log();
        let span = dispatched.span("operator_execution");
        let handle = self
            .tasks
            .spawn(async move { operator.forward(input).await }.instrument(span));
        self.nodes.insert(handle.id(), node_id);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for the next invocation to finish. `None` once nothing is in flight.
    pub async fn next(&mut self) -> Option<(String, Result<Value, OperatorError>)> {
        loop {
            let joined = self.tasks.join_next_with_id().await?;
            let (task_id, result) = match joined {
                Ok((task_id, result)) => (task_id, result),
                Err(join_error) => {
                    let task_id = join_error.id();
                    let error = if join_error.is_panic() {
                        OperatorError::Panicked(panic_message(join_error.into_panic()))
                    } else {
                        OperatorError::Cancelled
                    };
                    (task_id, Err(error))
                }
            };
            match self.nodes.remove(&task_id) {
                Some(node_id) => return Some((node_id, result)),
                None => tracing::warn!(task_id = %task_id, "finished task has no node"),
            }
        }
    }

    /// Abort every running invocation. Returns how many were in flight.
    pub fn abort_all(&mut self) -> usize {
        let count = self.tasks.len();
        self.tasks.abort_all();
        self.nodes.clear();
        count
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "operator panicked with a non-string payload".to_string()
    }
}
