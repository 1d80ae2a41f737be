// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Compilation of sealed graphs into execution plans.
//!
//! [`compile`] validates a graph and derives its [`Plan`]: a topological order
//! with a deterministic tie-break, the wave decomposition, and the
//! predecessor/successor lists the executors consume.
//!
//! # Ordering
//!
//! Every node gets a depth: 0 for sources, otherwise one more than its
//! deepest predecessor. The plan order sorts nodes by `(depth, insertion
//! index)`, so it is a valid topological order and it is reproducible across
//! runs. Wave `k` is the set of nodes with depth `k`.
//!
//! ```text
//!   a   b        wave 0: [a, b]
//!   |\ /         wave 1: [c, d]
//!   c  d         wave 2: [e]
//!    \ |
//!     e
//! ```

pub mod cache;

pub use cache::{CacheStats, PlanCache};

use indexmap::IndexMap;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::errors::CompileError;
use crate::graph::{Fingerprint, Graph, Node};
use crate::observability::messages::compiler::{CompileFailed, PlanCompiled};
use crate::observability::messages::StructuredLog;

/// Structural half of a plan: everything derived from the graph's shape.
///
/// Schedules are what the plan cache stores; they hold no operators.
#[derive(Debug)]
pub struct Schedule {
    fingerprint: Fingerprint,
    order: Vec<String>,
    waves: Vec<Vec<String>>,
    position: HashMap<String, usize>,
    depth: HashMap<String, usize>,
    predecessors: HashMap<String, Vec<String>>,
    successors: HashMap<String, Vec<String>>,
    outputs: Vec<String>,
}

impl Schedule {
    fn build(graph: &Graph) -> Result<Self, CompileError> {
        let ids: Vec<&str> = graph.nodes().map(|n| n.id()).collect();

        // Kahn's algorithm over insertion order; depth = longest path from a source.
        let mut in_degree: HashMap<&str, usize> = ids
            .iter()
            .map(|id| (*id, graph.predecessors(id).len()))
            .collect();
        let mut depth: HashMap<String, usize> = HashMap::with_capacity(ids.len());
        let mut queue: VecDeque<&str> = ids
            .iter()
            .copied()
            .filter(|id| in_degree[id] == 0)
            .collect();

        while let Some(current) = queue.pop_front() {
            let current_depth = graph
                .predecessors(current)
                .iter()
                .map(|p| depth[p.as_str()] + 1)
                .max()
                .unwrap_or(0);
            depth.insert(current.to_string(), current_depth);

            for dependent in graph.successors(current) {
                if let Some(count) = in_degree.get_mut(dependent.as_str()) {
                    *count -= 1;
                    if *count == 0 {
                        queue.push_back(dependent.as_str());
                    }
                }
            }
        }

        if depth.len() != ids.len() {
            let adjacency: IndexMap<&str, Vec<&str>> = ids
                .iter()
                .map(|id| {
                    let next = graph.successors(id).iter().map(String::as_str).collect();
                    (*id, next)
                })
                .collect();
            let cycle = find_cycle(&adjacency).unwrap_or_default();
            return Err(CompileError::Cycle { cycle });
        }

        let mut order: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        order.sort_by_key(|id| (depth[id], graph.index_of(id).unwrap_or(usize::MAX)));

        let wave_count = order.iter().map(|id| depth[id] + 1).max().unwrap_or(0);
        let mut waves: Vec<Vec<String>> = vec![Vec::new(); wave_count];
        for id in &order {
            waves[depth[id]].push(id.clone());
        }

        let position: HashMap<String, usize> = order
            .iter()
            .enumerate()
            .map(|(index, id)| (id.clone(), index))
            .collect();

        let predecessors = order
            .iter()
            .map(|id| (id.clone(), graph.predecessors(id).to_vec()))
            .collect();

        // Dependents sorted by plan position so readiness is discovered in plan order.
        let successors = order
            .iter()
            .map(|id| {
                let mut next = graph.successors(id).to_vec();
                next.sort_by_key(|n| position[n]);
                (id.clone(), next)
            })
            .collect();

        Ok(Self {
            fingerprint: graph.fingerprint(),
            order,
            waves,
            position,
            depth,
            predecessors,
            successors,
            outputs: graph.outputs(),
        })
    }

    /// Whether this schedule was derived from a graph with exactly these nodes
    /// and the same predecessor lists, in the same order.
    fn matches(&self, graph: &Graph) -> bool {
        self.order.len() == graph.len()
            && self.order.iter().all(|id| {
                graph.contains(id)
                    && self.predecessors.get(id).map(Vec::as_slice).unwrap_or_default()
                        == graph.predecessors(id)
            })
    }
}

/// DFS with an explicit recursion stack; returns the first cycle found,
/// closed by repeating its first node.
fn find_cycle<'a>(adjacency: &IndexMap<&'a str, Vec<&'a str>>) -> Option<Vec<String>> {
    fn visit<'a>(
        node: &'a str,
        adjacency: &IndexMap<&'a str, Vec<&'a str>>,
        visited: &mut HashSet<&'a str>,
        on_stack: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        visited.insert(node);
        on_stack.insert(node);
        path.push(node);

        for next in adjacency.get(node).into_iter().flatten() {
            if on_stack.contains(next) {
                let start = path.iter().position(|n| n == next).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(next.to_string());
                return Some(cycle);
            }
            if !visited.contains(next) {
                if let Some(cycle) = visit(*next, adjacency, visited, on_stack, path) {
                    return Some(cycle);
                }
            }
        }

        on_stack.remove(node);
        path.pop();
        None
    }

    let mut visited = HashSet::new();
    let mut on_stack = HashSet::new();
    let mut path = Vec::new();
    for node in adjacency.keys() {
        if !visited.contains(node) {
            if let Some(cycle) = visit(*node, adjacency, &mut visited, &mut on_stack, &mut path) {
                return Some(cycle);
            }
        }
    }
    None
}

/// A compiled, read-only execution plan.
///
/// Cloning is cheap; the same plan can be run concurrently any number of times.
#[derive(Debug, Clone)]
pub struct Plan {
    schedule: Arc<Schedule>,
    nodes: Arc<IndexMap<String, Node>>,
}

impl Plan {
    fn bind(schedule: Arc<Schedule>, graph: &Graph) -> Self {
        let nodes = graph
            .nodes()
            .map(|node| (node.id().to_string(), node.clone()))
            .collect();
        Self {
            schedule,
            nodes: Arc::new(nodes),
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.schedule.fingerprint
    }

    /// Node ids in topological order.
    pub fn order(&self) -> &[String] {
        &self.schedule.order
    }

    pub fn waves(&self) -> &[Vec<String>] {
        &self.schedule.waves
    }

    pub fn len(&self) -> usize {
        self.schedule.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedule.order.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.schedule.position.contains_key(id)
    }

    /// Index of `id` in [`Plan::order`].
    pub fn position(&self, id: &str) -> Option<usize> {
        self.schedule.position.get(id).copied()
    }

    /// Wave index of `id`.
    pub fn depth(&self, id: &str) -> Option<usize> {
        self.schedule.depth.get(id).copied()
    }

    /// Dependencies of `id` in edge-insertion order.
    pub fn predecessors(&self, id: &str) -> &[String] {
        self.schedule
            .predecessors
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Dependents of `id` in plan order.
    pub fn successors(&self, id: &str) -> &[String] {
        self.schedule
            .successors
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn outputs(&self) -> &[String] {
        &self.schedule.outputs
    }

    /// All transitive dependents of `id`, in plan order.
    pub fn descendants(&self, id: &str) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = vec![id];
        while let Some(current) = stack.pop() {
            for next in self.successors(current) {
                if seen.insert(next.as_str()) {
                    stack.push(next.as_str());
                }
            }
        }
        let mut result: Vec<String> = seen.into_iter().map(str::to_string).collect();
        result.sort_by_key(|n| self.position(n).unwrap_or(usize::MAX));
        result
    }
}

/// Validate a sealed graph and derive its execution plan.
pub fn compile(graph: &Graph) -> Result<Plan, CompileError> {
    let schedule = build_schedule(graph)?;
    Ok(Plan::bind(Arc::new(schedule), graph))
}

fn build_schedule(graph: &Graph) -> Result<Schedule, CompileError> {
    let result = if !graph.is_sealed() {
        Err(CompileError::NotSealed)
    } else if graph.is_empty() {
        Err(CompileError::EmptyGraph)
    } else {
        Schedule::build(graph)
    };

    match &result {
        Ok(schedule) => PlanCompiled {
            fingerprint: schedule.fingerprint,
            node_count: schedule.order.len(),
            wave_count: schedule.waves.len(),
        }
        .log(),
        Err(error) => CompileFailed { error }.log(),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::FnOperator;
    use crate::traits::Operator;

    fn op() -> Arc<dyn Operator> {
        Arc::new(FnOperator::new("identity", |input| Ok(input.value)))
    }

    fn graph(ids: &[&str], edges: &[(&str, &str)]) -> Graph {
        let mut graph = Graph::new();
        for id in ids {
            graph.add_node(op(), *id).unwrap();
        }
        for (from, to) in edges {
            graph.add_edge(from, to).unwrap();
        }
        graph.seal().unwrap();
        graph
    }

    fn strings(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unsealed_graph_rejected() {
        let mut unsealed = Graph::new();
        unsealed.add_node(op(), "a").unwrap();
        assert_eq!(compile(&unsealed).unwrap_err(), CompileError::NotSealed);
    }

    #[test]
    fn test_empty_graph_rejected() {
        let empty = graph(&[], &[]);
        assert_eq!(compile(&empty).unwrap_err(), CompileError::EmptyGraph);
    }

    #[test]
    fn test_waves_and_order() {
        let g = graph(
            &["a", "b", "c", "d", "e"],
            &[("a", "c"), ("b", "c"), ("a", "d"), ("c", "e"), ("d", "e")],
        );
        let plan = compile(&g).unwrap();

        assert_eq!(plan.order(), strings(&["a", "b", "c", "d", "e"]).as_slice());
        assert_eq!(
            plan.waves(),
            &[strings(&["a", "b"]), strings(&["c", "d"]), strings(&["e"])]
        );
        assert_eq!(plan.depth("e"), Some(2));
        assert_eq!(plan.predecessors("e"), strings(&["c", "d"]).as_slice());
    }

    #[test]
    fn test_tie_break_preserves_insertion_order_within_depth() {
        // inserted deepest-first; order must still be by depth, then insertion
        let g = graph(
            &["sink", "mid_b", "mid_a", "root"],
            &[("root", "mid_b"), ("root", "mid_a"), ("mid_a", "sink"), ("mid_b", "sink")],
        );
        let plan = compile(&g).unwrap();
        assert_eq!(
            plan.order(),
            strings(&["root", "mid_b", "mid_a", "sink"]).as_slice()
        );
        // successors listed in plan order, not edge order
        assert_eq!(plan.successors("root"), strings(&["mid_b", "mid_a"]).as_slice());
    }

    #[test]
    fn test_depth_is_longest_path() {
        // a -> b -> c and a -> c: c belongs to wave 2, not wave 1
        let g = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("a", "c")]);
        let plan = compile(&g).unwrap();
        assert_eq!(plan.waves().len(), 3);
        assert_eq!(plan.depth("c"), Some(2));
    }

    #[test]
    fn test_order_is_deterministic() {
        let build = || {
            graph(
                &["x", "y", "z", "w"],
                &[("x", "w"), ("y", "w"), ("z", "w")],
            )
        };
        let first = compile(&build()).unwrap();
        for _ in 0..10 {
            assert_eq!(compile(&build()).unwrap().order(), first.order());
        }
    }

    #[test]
    fn test_descendants() {
        let g = graph(
            &["a", "b", "c", "d", "e"],
            &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "e")],
        );
        let plan = compile(&g).unwrap();
        assert_eq!(plan.descendants("b"), strings(&["d"]));
        assert_eq!(plan.descendants("a"), strings(&["b", "c", "d", "e"]));
        assert!(plan.descendants("e").is_empty());
    }

    #[test]
    fn test_find_cycle_reports_path() {
        let mut adjacency: IndexMap<&str, Vec<&str>> = IndexMap::new();
        adjacency.insert("a", vec!["b"]);
        adjacency.insert("b", vec!["c"]);
        adjacency.insert("c", vec!["a"]);
        adjacency.insert("d", vec![]);
        assert_eq!(
            find_cycle(&adjacency),
            Some(strings(&["a", "b", "c", "a"]))
        );

        adjacency.insert("c", vec!["d"]);
        assert_eq!(find_cycle(&adjacency), None);
    }
}
