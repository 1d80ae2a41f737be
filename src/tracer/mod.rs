// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Derive graphs from imperative code.
//!
//! [`trace`] runs a function once, eagerly. The function receives a
//! [`Tracer`] handle and routes every operator invocation through
//! [`Tracer::call`], which runs the operator and records the call. Values
//! flow through the function as [`Traced`] handles: each carries the
//! concrete value plus a [`Binding`] naming where it came from, so passing
//! one call's output into another call is enough to discover the edge.
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use operator_graph::operators::{Ensemble, MostCommon};
//! use operator_graph::models::StaticModelService;
//! use operator_graph::tracer::{trace, Traced};
//! use operator_graph::traits::Operator;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let models = Arc::new(StaticModelService::new().with_response("m1", "4").with_response("m2", "4"));
//! let ensemble: Arc<dyn Operator> = Arc::new(Ensemble::new(["m1", "m2"], models));
//! let vote: Arc<dyn Operator> = Arc::new(MostCommon);
//!
//! let traced = trace(json!({"query": "2+2?"}), |tracer| async move {
//!     let query = tracer.input("query")?;
//!     let answers = tracer.call(ensemble, Traced::object([("query", query)])).await?;
//!     let answer = tracer.call(vote, answers).await?;
//!     Ok(vec![answer])
//! })
//! .await?;
//!
//! assert_eq!(traced.graph.len(), 2);
//! assert_eq!(traced.outputs, vec![json!({"final_answer": "4"})]);
//! # Ok(())
//! # }
//! ```
//!
//! # Determinism
//!
//! Node ids are `<operator name>_<call index>`, and recorded bindings refer
//! to input *keys* rather than input values. Tracing the same function with
//! same-shaped inputs therefore yields the same graph and fingerprint, as
//! long as the function's control flow depends only on the shape. Values
//! captured with [`Traced::constant`] are part of the fingerprint.

pub mod jit;

pub use jit::{input_shape, JitFunction};

use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::errors::TraceError;
use crate::graph::{Binding, Fingerprint, Graph};
use crate::observability::messages::trace::{TraceAborted, TraceCompleted};
use crate::observability::messages::StructuredLog;
use crate::traits::{Operator, OperatorInput};

/// A value flowing through a traced function, with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Traced {
    value: Value,
    binding: Binding,
}

impl Traced {
    /// A literal. Recorded by value, so it is part of the graph's fingerprint.
    pub fn constant(value: Value) -> Self {
        Self {
            binding: Binding::Const(value.clone()),
            value,
        }
    }

    /// Assemble an object from named traced parts.
    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Traced)>,
        K: Into<String>,
    {
        let mut map = serde_json::Map::new();
        let mut bindings = Vec::new();
        for (key, traced) in fields {
            let key = key.into();
            map.insert(key.clone(), traced.value);
            bindings.push((key, traced.binding));
        }
        Self {
            value: Value::Object(map),
            binding: Binding::Object(bindings),
        }
    }

    pub fn array<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Traced>,
    {
        let (values, bindings): (Vec<Value>, Vec<Binding>) = items
            .into_iter()
            .map(|traced| (traced.value, traced.binding))
            .unzip();
        Self {
            value: Value::Array(values),
            binding: Binding::Array(bindings),
        }
    }

    /// Project one key out of an object value, keeping its provenance.
    /// A missing key yields `null`, both now and when the plan runs.
    pub fn get(&self, key: &str) -> Traced {
        Self {
            value: self.value.get(key).cloned().unwrap_or(Value::Null),
            binding: Binding::Field(Box::new(self.binding.clone()), key.to_string()),
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// The node that produced this value, if it is an operator output.
    pub fn node_id(&self) -> Option<&str> {
        match &self.binding {
            Binding::Node(id) => Some(id),
            _ => None,
        }
    }
}

/// One intercepted invocation.
struct TraceEntry {
    node_id: String,
    operator: Arc<dyn Operator>,
    binding: Binding,
}

#[derive(Default)]
struct TraceRecord {
    entries: Vec<TraceEntry>,
    /// Eager outputs by node id, used to build later calls' upstream.
    values: std::collections::HashMap<String, Value>,
    aborted: Option<TraceError>,
}

/// Recording handle passed to the traced function. Cheap to clone.
#[derive(Clone)]
pub struct Tracer {
    inputs: Arc<Value>,
    record: Arc<Mutex<TraceRecord>>,
}

impl Tracer {
    fn new(inputs: Value) -> Self {
        Self {
            inputs: Arc::new(inputs),
            record: Arc::new(Mutex::new(TraceRecord::default())),
        }
    }

    /// The whole run input.
    pub fn inputs(&self) -> Traced {
        Traced {
            value: (*self.inputs).clone(),
            binding: Binding::Inputs,
        }
    }

    /// One top-level key of the run input.
    pub fn input(&self, key: &str) -> Result<Traced, TraceError> {
        let value = self
            .inputs
            .get(key)
            .cloned()
            .ok_or_else(|| TraceError::MissingInput(key.to_string()))?;
        Ok(Traced {
            value,
            binding: Binding::Input(key.to_string()),
        })
    }

    /// Invoke `operator` on `input` and record the call as a graph node.
    ///
    /// The node depends on every node referenced by `input`'s binding, in
    /// first-appearance order; the operator receives those nodes' outputs as
    /// its upstream values, exactly as it will when the plan runs.
    pub async fn call(
        &self,
        operator: Arc<dyn Operator>,
        input: Traced,
    ) -> Result<Traced, TraceError> {
        let (node_id, upstream) = {
            let mut record = self.record.lock().await;
            if let Some(error) = &record.aborted {
                return Err(error.clone());
            }
            let node_id = format!("{}_{}", operator.name(), record.entries.len());
            let upstream: Vec<Value> = input
                .binding
                .node_refs()
                .into_iter()
                .map(|id| record.values.get(id).cloned().unwrap_or(Value::Null))
                .collect();
            record.entries.push(TraceEntry {
                node_id: node_id.clone(),
                operator: operator.clone(),
                binding: input.binding.clone(),
            });
            (node_id, upstream)
        };

        let result = operator
            .forward(OperatorInput::new(input.value).with_upstream(upstream))
            .await;

        let mut record = self.record.lock().await;
        match result {
            Ok(value) => {
                record.values.insert(node_id.clone(), value.clone());
                Ok(Traced {
                    value,
                    binding: Binding::Node(node_id),
                })
            }
            Err(source) => {
                let error = TraceError::Operator { node_id, source };
                record.aborted.get_or_insert_with(|| error.clone());
                Err(error)
            }
        }
    }
}

/// Result of a successful trace.
#[derive(Debug)]
pub struct TraceOutput {
    /// Sealed graph equivalent to the traced function.
    pub graph: Graph,
    /// Values the function returned during the eager pass.
    pub outputs: Vec<Value>,
    /// Producing node of each returned value, parallel to `outputs`.
    pub output_nodes: Vec<String>,
    pub fingerprint: Fingerprint,
}

/// Run `function` once eagerly and reconstruct the graph of its operator calls.
///
/// Every returned value must be the output of a traced call. If any call
/// fails the trace is aborted and the error returned, even if the function
/// swallowed it.
pub async fn trace<F, Fut>(inputs: Value, function: F) -> Result<TraceOutput, TraceError>
where
    F: FnOnce(Tracer) -> Fut,
    Fut: Future<Output = Result<Vec<Traced>, TraceError>>,
{
    let tracer = Tracer::new(inputs);
    let returned = function(tracer.clone()).await;

    let record = {
        let mut guard = tracer.record.lock().await;
        std::mem::take(&mut *guard)
    };

    let result = returned.and_then(|outputs| match record.aborted {
        Some(error) => Err(error),
        None => build_output(record.entries, outputs),
    });

    match &result {
        Ok(output) => TraceCompleted {
            node_count: output.graph.len(),
            edge_count: output.graph.edges().len(),
            fingerprint: output.fingerprint,
        }
        .log(),
        Err(error) => TraceAborted {
            calls_recorded: record.values.len(),
            error,
        }
        .log(),
    }
    result
}

fn build_output(entries: Vec<TraceEntry>, returned: Vec<Traced>) -> Result<TraceOutput, TraceError> {
    if returned.is_empty() {
        return Err(TraceError::NoOutputs);
    }

    let mut graph = Graph::new();
    for entry in entries {
        let dependencies: Vec<String> = entry
            .binding
            .node_refs()
            .into_iter()
            .map(str::to_string)
            .collect();
        graph.add_traced_node(entry.operator, entry.node_id.clone(), entry.binding)?;
        for dependency in &dependencies {
            graph.add_edge(dependency, &entry.node_id)?;
        }
    }

    let mut outputs = Vec::with_capacity(returned.len());
    let mut output_nodes = Vec::with_capacity(returned.len());
    for (index, traced) in returned.into_iter().enumerate() {
        let node_id = traced
            .node_id()
            .filter(|id| graph.contains(id))
            .ok_or(TraceError::UntracedOutput(index))?
            .to_string();
        output_nodes.push(node_id);
        outputs.push(traced.value);
    }

    let mut designated: Vec<String> = Vec::new();
    for id in &output_nodes {
        if !designated.contains(id) {
            designated.push(id.clone());
        }
    }
    graph.set_outputs(designated)?;
    graph.seal()?;

    let fingerprint = graph.fingerprint();
    Ok(TraceOutput {
        graph,
        outputs,
        output_nodes,
        fingerprint,
    })
}
