// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The operator graph: nodes, dependency edges and their invariants.
//!
//! A [`Graph`] is built incrementally with [`Graph::add_node`] and
//! [`Graph::add_edge`] (or produced in one pass by the tracer) and then
//! sealed. Every mutation keeps the graph a DAG whose edges reference
//! existing nodes, so errors surface at construction time rather than
//! at compile time.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use operator_graph::graph::Graph;
//! use operator_graph::operators::FnOperator;
//!
//! let op = Arc::new(FnOperator::new("identity", |input| Ok(input.value)));
//!
//! let mut graph = Graph::new();
//! graph.add_node(op.clone(), "a").unwrap();
//! graph.add_node(op, "b").unwrap();
//! graph.add_edge("a", "b").unwrap();
//! assert!(graph.add_edge("b", "a").is_err()); // would close a cycle
//! graph.seal().unwrap();
//! ```

mod binding;
mod fingerprint;

pub use binding::Binding;
pub use fingerprint::Fingerprint;

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::errors::GraphError;
use crate::observability::messages::graph::{EdgeRejected, GraphSealed};
use crate::observability::messages::StructuredLog;
use crate::traits::Operator;

/// A graph node: an operator plus its static parameters.
#[derive(Clone)]
pub struct Node {
    id: String,
    operator: Arc<dyn Operator>,
    params: Value,
    binding: Option<Binding>,
}

impl Node {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn operator(&self) -> &Arc<dyn Operator> {
        &self.operator
    }

    pub fn operator_name(&self) -> &str {
        self.operator.name()
    }

    pub fn params(&self) -> &Value {
        &self.params
    }

    /// Input expression recorded by the tracer, if this node was traced.
    pub fn binding(&self) -> Option<&Binding> {
        self.binding.as_ref()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("operator", &self.operator.name())
            .field("params", &self.params)
            .field("binding", &self.binding)
            .finish()
    }
}

/// `to` depends on the output of `from`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: IndexMap<String, Node>,
    edges: Vec<Edge>,
    /// id -> dependents, in edge insertion order
    successors: HashMap<String, Vec<String>>,
    /// id -> dependencies, in edge insertion order
    predecessors: HashMap<String, Vec<String>>,
    outputs: Vec<String>,
    sealed: bool,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with no static parameters.
    pub fn add_node(
        &mut self,
        operator: Arc<dyn Operator>,
        id: impl Into<String>,
    ) -> Result<(), GraphError> {
        self.insert_node(operator, id.into(), Value::Null, None)
    }

    pub fn add_node_with_params(
        &mut self,
        operator: Arc<dyn Operator>,
        id: impl Into<String>,
        params: Value,
    ) -> Result<(), GraphError> {
        self.insert_node(operator, id.into(), params, None)
    }

    pub(crate) fn add_traced_node(
        &mut self,
        operator: Arc<dyn Operator>,
        id: String,
        binding: Binding,
    ) -> Result<(), GraphError> {
        self.insert_node(operator, id, Value::Null, Some(binding))
    }

    fn insert_node(
        &mut self,
        operator: Arc<dyn Operator>,
        id: String,
        params: Value,
        binding: Option<Binding>,
    ) -> Result<(), GraphError> {
        self.ensure_mutable()?;
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateId { id });
        }
        self.nodes.insert(
            id.clone(),
            Node {
                id,
                operator,
                params,
                binding,
            },
        );
        Ok(())
    }

    /// Declare that `to` consumes the output of `from`.
    ///
    /// Fails without mutating the graph if either node is missing or the
    /// edge would close a cycle. Adding an existing edge again is a no-op.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        self.ensure_mutable()?;
        for id in [from, to] {
            if !self.nodes.contains_key(id) {
                return Err(GraphError::UnknownNode { id: id.to_string() });
            }
        }

        // An edge from -> to closes a cycle iff `from` is already reachable from `to`.
        if let Some(path) = self.find_path(to, from) {
            EdgeRejected {
                from,
                to,
                path: &path,
            }
            .log();
            return Err(GraphError::Cycle {
                from: from.to_string(),
                to: to.to_string(),
                path,
            });
        }

        let dependents = self.successors.entry(from.to_string()).or_default();
        if dependents.iter().any(|d| d == to) {
            return Ok(());
        }
        dependents.push(to.to_string());
        self.predecessors
            .entry(to.to_string())
            .or_default()
            .push(from.to_string());
        self.edges.push(Edge {
            from: from.to_string(),
            to: to.to_string(),
        });
        Ok(())
    }

    /// Designate the nodes whose results a run returns.
    pub fn set_outputs<I, S>(&mut self, ids: I) -> Result<(), GraphError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_mutable()?;
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        if let Some(missing) = ids.iter().find(|id| !self.nodes.contains_key(*id)) {
            return Err(GraphError::UnknownNode {
                id: missing.clone(),
            });
        }
        self.outputs = ids;
        Ok(())
    }

    /// Freeze the graph. Sealing an already sealed graph is a no-op.
    pub fn seal(&mut self) -> Result<(), GraphError> {
        if self.sealed {
            return Ok(());
        }
        self.sealed = true;
        GraphSealed {
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            fingerprint: self.fingerprint(),
        }
        .log();
        Ok(())
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Position of `id` in insertion order.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.nodes.get_index_of(id)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn predecessors(&self, id: &str) -> &[String] {
        self.predecessors.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn successors(&self, id: &str) -> &[String] {
        self.successors.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Designated outputs, or every sink in insertion order if none were designated.
    pub fn outputs(&self) -> Vec<String> {
        if !self.outputs.is_empty() {
            return self.outputs.clone();
        }
        self.nodes
            .keys()
            .filter(|id| self.successors(id).is_empty())
            .cloned()
            .collect()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint::fingerprint(self)
    }

    fn ensure_mutable(&self) -> Result<(), GraphError> {
        if self.sealed {
            Err(GraphError::Sealed)
        } else {
            Ok(())
        }
    }

    /// Depth-first search for a path `start -> ... -> target` along existing edges.
    fn find_path(&self, start: &str, target: &str) -> Option<Vec<String>> {
        let mut stack = vec![start.to_string()];
        let mut parent: HashMap<String, String> = HashMap::new();
        let mut visited: HashSet<String> = HashSet::from([start.to_string()]);

        while let Some(current) = stack.pop() {
            if current == target {
                let mut path = vec![current.clone()];
                let mut cursor = current;
                while let Some(prev) = parent.get(&cursor) {
                    path.push(prev.clone());
                    cursor = prev.clone();
                }
                path.reverse();
                return Some(path);
            }
            for next in self.successors(&current) {
                if visited.insert(next.clone()) {
                    parent.insert(next.clone(), current.clone());
                    stack.push(next.clone());
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::FnOperator;
    use serde_json::json;

    fn op(name: &str) -> Arc<dyn Operator> {
        Arc::new(FnOperator::new(name, |input| Ok(input.value)))
    }

    fn chain(ids: &[&str]) -> Graph {
        let mut graph = Graph::new();
        for id in ids {
            graph.add_node(op("identity"), *id).unwrap();
        }
        for pair in ids.windows(2) {
            graph.add_edge(pair[0], pair[1]).unwrap();
        }
        graph
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut graph = Graph::new();
        graph.add_node(op("a"), "a").unwrap();
        assert_eq!(
            graph.add_node(op("a"), "a"),
            Err(GraphError::DuplicateId { id: "a".into() })
        );
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_edge_to_unknown_node_rejected() {
        let mut graph = chain(&["a"]);
        assert_eq!(
            graph.add_edge("a", "ghost"),
            Err(GraphError::UnknownNode { id: "ghost".into() })
        );
        assert_eq!(
            graph.add_edge("ghost", "a"),
            Err(GraphError::UnknownNode { id: "ghost".into() })
        );
        assert!(graph.edges().is_empty());
    }

    #[test]
    fn test_self_edge_is_cycle() {
        let mut graph = chain(&["a"]);
        assert!(matches!(
            graph.add_edge("a", "a"),
            Err(GraphError::Cycle { .. })
        ));
    }

    #[test]
    fn test_cycle_rejected_without_mutation() {
        let mut graph = chain(&["a", "b", "c"]);
        let edges_before = graph.edges().to_vec();
        let fingerprint_before = graph.fingerprint();

        let err = graph.add_edge("c", "a").unwrap_err();
        assert_eq!(
            err,
            GraphError::Cycle {
                from: "c".into(),
                to: "a".into(),
                path: vec!["a".into(), "b".into(), "c".into()],
            }
        );

        assert_eq!(graph.edges(), edges_before.as_slice());
        assert!(graph.successors("c").is_empty());
        assert!(graph.predecessors("a").is_empty());
        assert_eq!(graph.fingerprint(), fingerprint_before);
    }

    #[test]
    fn test_duplicate_edge_is_noop() {
        let mut graph = chain(&["a", "b"]);
        graph.add_edge("a", "b").unwrap();
        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.predecessors("b"), &["a".to_string()]);
    }

    #[test]
    fn test_sealed_graph_rejects_mutation() {
        let mut graph = chain(&["a", "b"]);
        graph.seal().unwrap();
        assert!(graph.is_sealed());
        assert_eq!(graph.add_node(op("c"), "c"), Err(GraphError::Sealed));
        assert_eq!(graph.add_edge("b", "a"), Err(GraphError::Sealed));
        assert_eq!(graph.set_outputs(["a"]), Err(GraphError::Sealed));
        // sealing twice is harmless
        graph.seal().unwrap();
    }

    #[test]
    fn test_outputs_default_to_sinks() {
        let mut graph = chain(&["a", "b"]);
        graph.add_node(op("identity"), "c").unwrap();
        graph.add_edge("a", "c").unwrap();
        assert_eq!(graph.outputs(), vec!["b".to_string(), "c".to_string()]);

        graph.set_outputs(["a"]).unwrap();
        assert_eq!(graph.outputs(), vec!["a".to_string()]);
        assert!(matches!(
            graph.set_outputs(["zzz"]),
            Err(GraphError::UnknownNode { .. })
        ));
    }

    #[test]
    fn test_predecessors_keep_edge_insertion_order() {
        let mut graph = Graph::new();
        for id in ["x", "y", "z", "sink"] {
            graph.add_node(op("identity"), id).unwrap();
        }
        graph.add_edge("z", "sink").unwrap();
        graph.add_edge("x", "sink").unwrap();
        graph.add_edge("y", "sink").unwrap();
        assert_eq!(
            graph.predecessors("sink"),
            &["z".to_string(), "x".to_string(), "y".to_string()]
        );
    }

    #[test]
    fn test_fingerprint_depends_on_structure_not_construction_order_of_edges() {
        let mut left = Graph::new();
        let mut right = Graph::new();
        for graph in [&mut left, &mut right] {
            for id in ["a", "b", "c"] {
                graph.add_node(op("identity"), id).unwrap();
            }
        }
        left.add_edge("a", "b").unwrap();
        left.add_edge("a", "c").unwrap();
        right.add_edge("a", "c").unwrap();
        right.add_edge("a", "b").unwrap();
        assert_eq!(left.fingerprint(), right.fingerprint());

        let mut other_op = Graph::new();
        other_op.add_node(op("identity"), "a").unwrap();
        other_op.add_node(op("different"), "b").unwrap();
        other_op.add_node(op("identity"), "c").unwrap();
        other_op.add_edge("a", "b").unwrap();
        other_op.add_edge("a", "c").unwrap();
        assert_ne!(left.fingerprint(), other_op.fingerprint());
    }

    #[test]
    fn test_fingerprint_covers_fan_in_order() {
        let mut xy = Graph::new();
        let mut yx = Graph::new();
        for graph in [&mut xy, &mut yx] {
            for id in ["x", "y", "sink"] {
                graph.add_node(op("identity"), id).unwrap();
            }
        }
        xy.add_edge("x", "sink").unwrap();
        xy.add_edge("y", "sink").unwrap();
        yx.add_edge("y", "sink").unwrap();
        yx.add_edge("x", "sink").unwrap();
        assert_ne!(xy.fingerprint(), yx.fingerprint());
    }

    #[test]
    fn test_fingerprint_covers_params() {
        let mut a = Graph::new();
        a.add_node_with_params(op("call"), "n", json!({"temperature": 0.1}))
            .unwrap();
        let mut b = Graph::new();
        b.add_node_with_params(op("call"), "n", json!({"temperature": 0.9}))
            .unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().to_string().len(), 16);
    }
}
