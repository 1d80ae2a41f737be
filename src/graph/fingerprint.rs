// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structural fingerprints used to key the plan cache.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::Graph;

/// Stable 64-bit hash of a graph's shape.
///
/// Covers node ids (in insertion order), operator identity, static params,
/// traced input bindings, each node's predecessors in edge-insertion order
/// and the designated outputs. Runtime
/// input values never contribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for Fingerprint {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

pub(crate) fn fingerprint(graph: &Graph) -> Fingerprint {
    let mut hasher = DefaultHasher::new();

    graph.len().hash(&mut hasher);
    for node in graph.nodes() {
        node.id().hash(&mut hasher);
        node.operator_name().hash(&mut hasher);
        serde_json::to_string(node.params())
            .unwrap_or_default()
            .hash(&mut hasher);
        match node.binding() {
            Some(binding) => serde_json::to_string(binding)
                .unwrap_or_default()
                .hash(&mut hasher),
            None => "unbound".hash(&mut hasher),
        }
    }

    // Predecessor order is what operators see as `upstream`, so it is part of the shape.
    for node in graph.nodes() {
        graph.predecessors(node.id()).hash(&mut hasher);
    }

    graph.outputs().hash(&mut hasher);

    Fingerprint(hasher.finish())
}
