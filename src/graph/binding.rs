// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Input expressions recorded for traced nodes.
//!
//! When the tracer intercepts `tracer.call(op, input)`, the `input` handle
//! carries a [`Binding`] describing where each part of the value came from.
//! The scheduler evaluates the binding at run time to rebuild the operator
//! input from the new run's inputs and the predecessors' outputs.

use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Binding {
    /// The whole run input value.
    Inputs,
    /// One top-level key of the run inputs.
    Input(String),
    /// The output of another node.
    Node(String),
    /// A literal captured at trace time.
    Const(Value),
    /// One key of another binding's object value.
    Field(Box<Binding>, String),
    Object(Vec<(String, Binding)>),
    Array(Vec<Binding>),
}

impl Binding {
    /// Node ids referenced by this binding, deduplicated, in first-appearance order.
    pub fn node_refs(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        self.collect_refs(&mut refs);
        refs
    }

    fn collect_refs<'a>(&'a self, refs: &mut Vec<&'a str>) {
        match self {
            Binding::Node(id) => {
                if !refs.contains(&id.as_str()) {
                    refs.push(id.as_str());
                }
            }
            Binding::Field(inner, _) => inner.collect_refs(refs),
            Binding::Object(fields) => {
                for (_, binding) in fields {
                    binding.collect_refs(refs);
                }
            }
            Binding::Array(items) => {
                for binding in items {
                    binding.collect_refs(refs);
                }
            }
            Binding::Inputs | Binding::Input(_) | Binding::Const(_) => {}
        }
    }

    /// Rebuild the value this binding describes.
    ///
    /// Missing input keys and unresolved node ids evaluate to `null`; the
    /// scheduler only evaluates a binding once every referenced node completed.
    pub fn evaluate<'a, F>(&self, inputs: &Value, resolve: &F) -> Value
    where
        F: Fn(&str) -> Option<&'a Value>,
    {
        match self {
            Binding::Inputs => inputs.clone(),
            Binding::Input(key) => inputs.get(key).cloned().unwrap_or(Value::Null),
            Binding::Node(id) => resolve(id).cloned().unwrap_or(Value::Null),
            Binding::Const(value) => value.clone(),
            Binding::Field(inner, key) => inner
                .evaluate(inputs, resolve)
                .get(key)
                .cloned()
                .unwrap_or(Value::Null),
            Binding::Object(fields) => {
                let mut map = Map::with_capacity(fields.len());
                for (key, binding) in fields {
                    map.insert(key.clone(), binding.evaluate(inputs, resolve));
                }
                Value::Object(map)
            }
            Binding::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|binding| binding.evaluate(inputs, resolve))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_node_refs_deduplicated_in_order() {
        let binding = Binding::Object(vec![
            ("a".into(), Binding::Node("second".into())),
            (
                "b".into(),
                Binding::Array(vec![
                    Binding::Node("first".into()),
                    Binding::Node("second".into()),
                ]),
            ),
            ("q".into(), Binding::Input("query".into())),
        ]);
        assert_eq!(binding.node_refs(), vec!["second", "first"]);
    }

    #[test]
    fn test_evaluate_mixes_inputs_nodes_and_constants() {
        let results: HashMap<String, Value> =
            HashMap::from([("ens".to_string(), json!({"responses": ["x", "y"]}))]);
        let binding = Binding::Object(vec![
            ("query".into(), Binding::Input("query".into())),
            ("upstream".into(), Binding::Node("ens".into())),
            ("k".into(), Binding::Const(json!(3))),
            (
                "first".into(),
                Binding::Field(Box::new(Binding::Node("ens".into())), "responses".into()),
            ),
            ("missing".into(), Binding::Input("nope".into())),
        ]);

        let value = binding.evaluate(&json!({"query": "why?"}), &|id: &str| results.get(id));

        assert_eq!(
            value,
            json!({
                "query": "why?",
                "upstream": {"responses": ["x", "y"]},
                "k": 3,
                "first": ["x", "y"],
                "missing": null
            })
        );
    }
}
