// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Trace-once, run-many wrapper around a traced function.

use dashmap::DashMap;
use serde_json::Value;
use std::fmt::Write;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{trace, Traced, Tracer};
use crate::compiler::{Plan, PlanCache};
use crate::engine::RunOptions;
use crate::errors::{JitError, RunError, TraceError};
use crate::observability::messages::trace::JitDispatch;
use crate::observability::messages::StructuredLog;
use crate::traits::PlanExecutor;

#[derive(Clone)]
struct CompiledShape {
    plan: Plan,
    output_nodes: Vec<String>,
}

/// A traced function that compiles itself per input shape.
///
/// The first call for an input shape traces the function (running it
/// eagerly) and compiles the resulting graph through the plan cache. Later
/// calls with the same shape skip the function body entirely and run the
/// compiled plan on the executor. A call with a new shape traces again.
///
/// Functions whose control flow depends on input *values* should enable
/// [`JitFunction::retrace_every_call`]: every call then traces, and the
/// fingerprint-keyed cache either reuses a structurally identical plan or
/// compiles a new one, never serving a stale plan.
pub struct JitFunction<F> {
    name: String,
    function: F,
    executor: Arc<dyn PlanExecutor>,
    cache: Arc<PlanCache>,
    shapes: DashMap<String, CompiledShape>,
    retrace_every_call: bool,
    traces: AtomicUsize,
}

impl<F, Fut> JitFunction<F>
where
    F: Fn(Tracer) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<Traced>, TraceError>> + Send,
{
    /// Wrap `function` with shape-keyed plan reuse.
    ///
    /// Plans are keyed by input *shape* only. If the function branches or
    /// loops on input *values*, a later call with the same shape runs the
    /// plan traced for the first call's values, which can be wrong for the
    /// new ones. Enable [`JitFunction::retrace_every_call`] for such functions.
    pub fn new(name: impl Into<String>, executor: Arc<dyn PlanExecutor>, function: F) -> Self {
        Self {
            name: name.into(),
            function,
            executor,
            cache: Arc::new(PlanCache::new()),
            shapes: DashMap::new(),
            retrace_every_call: false,
            traces: AtomicUsize::new(0),
        }
    }

    /// Share a plan cache with other functions or an [`crate::config::Engine`].
    pub fn with_cache(mut self, cache: Arc<PlanCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn retrace_every_call(mut self, enabled: bool) -> Self {
        self.retrace_every_call = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cache(&self) -> &Arc<PlanCache> {
        &self.cache
    }

    /// Number of times the function body has been traced.
    pub fn trace_count(&self) -> usize {
        self.traces.load(Ordering::Relaxed)
    }

    /// Number of distinct input shapes with a compiled plan.
    pub fn compiled_shapes(&self) -> usize {
        self.shapes.len()
    }

    /// Evaluate the function. Returns the values it returns, in order.
    pub async fn call(&self, inputs: Value) -> Result<Vec<Value>, JitError> {
        let shape = input_shape(&inputs);

        if !self.retrace_every_call {
            let cached = self.shapes.get(&shape).map(|entry| entry.value().clone());
            if let Some(compiled) = cached {
                JitDispatch {
                    function: &self.name,
                    shape: &shape,
                    traced: false,
                }
                .log();
                return self.run_compiled(compiled, inputs).await;
            }
        }

        JitDispatch {
            function: &self.name,
            shape: &shape,
            traced: true,
        }
        .log();
        self.traces.fetch_add(1, Ordering::Relaxed);
        let traced = trace(inputs, |tracer| (self.function)(tracer)).await?;
        let plan = self.cache.get_or_compile(&traced.graph, traced.fingerprint)?;
        self.shapes.insert(
            shape,
            CompiledShape {
                plan,
                output_nodes: traced.output_nodes,
            },
        );
        Ok(traced.outputs)
    }

    async fn run_compiled(
        &self,
        compiled: CompiledShape,
        inputs: Value,
    ) -> Result<Vec<Value>, JitError> {
        let run = self
            .executor
            .execute(&compiled.plan, inputs, RunOptions::default())
            .await?;
        compiled
            .output_nodes
            .iter()
            .map(|id| {
                run.output(id)
                    .cloned()
                    .ok_or_else(|| JitError::Run(RunError::UnknownOutput(id.clone())))
            })
            .collect()
    }
}

/// Structural signature of a JSON value: object keys, array lengths and
/// scalar kinds, ignoring scalar values.
///
/// ```
/// use operator_graph::tracer::input_shape;
/// use serde_json::json;
///
/// assert_eq!(
///     input_shape(&json!({"query": "hi", "k": [1, 2]})),
///     input_shape(&json!({"k": [7, 9], "query": "bye"})),
/// );
/// assert_ne!(input_shape(&json!([1])), input_shape(&json!([1, 2])));
/// ```
pub fn input_shape(value: &Value) -> String {
    let mut out = String::new();
    write_shape(value, &mut out);
    out
}

fn write_shape(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(_) => out.push_str("bool"),
        Value::Number(_) => out.push_str("number"),
        Value::String(_) => out.push_str("string"),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_shape(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{:?}:", key);
                write_shape(&map[key.as_str()], out);
            }
            out.push('}');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::WorkQueueExecutor;
    use crate::errors::OperatorError;
    use crate::operators::FnOperator;
    use crate::traits::Operator;
    use serde_json::json;

    fn add(amount: i64, calls: Arc<AtomicUsize>) -> Arc<dyn Operator> {
        Arc::new(FnOperator::new("add", move |input| {
            calls.fetch_add(1, Ordering::SeqCst);
            let n = input
                .value
                .as_i64()
                .ok_or_else(|| OperatorError::invalid_input("expected an integer"))?;
            Ok(json!(n + amount))
        }))
    }

    fn executor() -> Arc<dyn PlanExecutor> {
        Arc::new(WorkQueueExecutor::new(2))
    }

    #[tokio::test]
    async fn test_second_call_runs_compiled_plan_with_new_values() {
        let calls = Arc::new(AtomicUsize::new(0));
        let op = add(10, calls.clone());
        let jit = JitFunction::new("plus_ten_twice", executor(), move |tracer: Tracer| {
            let op = op.clone();
            async move {
                let once = tracer.call(op.clone(), tracer.input("x")?).await?;
                let twice = tracer.call(op, once).await?;
                Ok(vec![twice])
            }
        });

        assert_eq!(jit.call(json!({"x": 1})).await.unwrap(), vec![json!(21)]);
        assert_eq!(jit.call(json!({"x": 5})).await.unwrap(), vec![json!(25)]);

        assert_eq!(jit.trace_count(), 1);
        assert_eq!(jit.compiled_shapes(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_new_shape_retraces() {
        let calls = Arc::new(AtomicUsize::new(0));
        let op = add(1, calls);
        let jit = JitFunction::new("inc", executor(), move |tracer: Tracer| {
            let op = op.clone();
            async move { Ok(vec![tracer.call(op, tracer.input("x")?).await?]) }
        });

        jit.call(json!({"x": 1})).await.unwrap();
        jit.call(json!({"x": 1, "extra": true})).await.unwrap();
        assert_eq!(jit.trace_count(), 2);
        assert_eq!(jit.compiled_shapes(), 2);
        // Both shapes trace to the same graph, so only one plan is compiled.
        assert_eq!(jit.cache().len(), 1);
        assert_eq!(jit.cache().stats().hits, 1);
    }

    #[tokio::test]
    async fn test_default_reuses_first_plan_for_same_shape() {
        let calls = Arc::new(AtomicUsize::new(0));
        let op = add(1, calls);
        let jit = JitFunction::new("branchy", executor(), move |tracer: Tracer| {
            let op = op.clone();
            async move {
                let x = tracer.input("x")?;
                let rounds = if x.value().as_i64().unwrap_or(0) > 10 { 3 } else { 1 };
                let mut value = x;
                for _ in 0..rounds {
                    value = tracer.call(op.clone(), value).await?;
                }
                Ok(vec![value])
            }
        });

        assert_eq!(jit.call(json!({"x": 1})).await.unwrap(), vec![json!(2)]);
        // Same shape, so the one-round plan runs even though x > 10.
        assert_eq!(jit.call(json!({"x": 20})).await.unwrap(), vec![json!(21)]);
        assert_eq!(jit.trace_count(), 1);
    }

    #[tokio::test]
    async fn test_retrace_every_call_follows_value_dependent_branches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let op = add(1, calls);
        let jit = JitFunction::new("branchy", executor(), move |tracer: Tracer| {
            let op = op.clone();
            async move {
                let x = tracer.input("x")?;
                let rounds = if x.value().as_i64().unwrap_or(0) > 10 { 3 } else { 1 };
                let mut value = x;
                for _ in 0..rounds {
                    value = tracer.call(op.clone(), value).await?;
                }
                Ok(vec![value])
            }
        })
        .retrace_every_call(true);

        assert_eq!(jit.call(json!({"x": 1})).await.unwrap(), vec![json!(2)]);
        assert_eq!(jit.call(json!({"x": 20})).await.unwrap(), vec![json!(23)]);
        assert_eq!(jit.call(json!({"x": 2})).await.unwrap(), vec![json!(3)]);

        assert_eq!(jit.trace_count(), 3);
        let stats = jit.cache().stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn test_trace_failure_is_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let op = add(1, calls);
        let jit = JitFunction::new("inc", executor(), move |tracer: Tracer| {
            let op = op.clone();
            async move { Ok(vec![tracer.call(op, tracer.input("x")?).await?]) }
        });

        let err = jit.call(json!({"x": "text"})).await.unwrap_err();
        assert!(matches!(err, JitError::Trace(TraceError::Operator { .. })));
        assert_eq!(jit.compiled_shapes(), 0);
        assert!(jit.cache().is_empty());
    }

    #[test]
    fn test_shape_ignores_values_but_not_structure() {
        assert_eq!(input_shape(&json!({"a": 1})), r#"{"a":number}"#);
        assert_eq!(input_shape(&json!([true, null, "s"])), "[bool,null,string]");
        assert_ne!(input_shape(&json!({"a": 1})), input_shape(&json!({"a": "1"})));
    }
}
