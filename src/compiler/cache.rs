// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Plan cache keyed by graph fingerprint.
//!
//! Tracing the same function with same-shaped inputs yields structurally
//! identical graphs; the cache lets those repeated calls skip compilation.
//! Entries hold only the structural [`Schedule`]; a hit is rebound to the
//! caller's graph nodes, so operators always come from the graph being run.
//!
//! The map is a `DashMap`, so lookups from concurrent runs only contend on a
//! shard. Compilation runs outside any lock: two racing misses for the same
//! fingerprint may both compile, the first insert wins and both callers get
//! equal plans.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{build_schedule, Plan, Schedule};
use crate::errors::CompileError;
use crate::graph::{Fingerprint, Graph};
use crate::observability::messages::compiler::{CacheEvicted, CacheLookup};
use crate::observability::messages::StructuredLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

struct CacheEntry {
    schedule: Arc<Schedule>,
    last_used: u64,
}

pub struct PlanCache {
    entries: DashMap<Fingerprint, CacheEntry>,
    /// `None` means unbounded.
    capacity: Option<usize>,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PlanCache {
    /// Unbounded cache. Size is bounded by the number of distinct graph shapes.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Cache holding at most `capacity` plans, evicting the least recently used.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::build(Some(capacity.max(1)))
    }

    fn build(capacity: Option<usize>) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached plan for `fingerprint`, compiling `graph` on a miss.
    ///
    /// `fingerprint` must be `graph.fingerprint()`; callers that already
    /// computed it (the tracer does) pass it in to avoid rehashing.
    pub fn get_or_compile(
        &self,
        graph: &Graph,
        fingerprint: Fingerprint,
    ) -> Result<Plan, CompileError> {
        if !graph.is_sealed() {
            return Err(CompileError::NotSealed);
        }
        if let Some(schedule) = self.lookup(fingerprint) {
            if schedule.matches(graph) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.log_lookup(fingerprint, true);
                return Ok(Plan::bind(schedule, graph));
            }
            // Fingerprint collision with a different structure: never serve it.
            tracing::warn!(fingerprint = %fingerprint, "cached plan does not match graph; recompiling");
            self.entries.remove(&fingerprint);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.log_lookup(fingerprint, false);

        let compiled = Arc::new(build_schedule(graph)?);
        let schedule = self
            .entries
            .entry(fingerprint)
            .or_insert_with(|| CacheEntry {
                schedule: compiled,
                last_used: self.tick(),
            })
            .schedule
            .clone();

        self.evict_if_needed();
        Ok(Plan::bind(schedule, graph))
    }

    /// Shorthand for `get_or_compile(graph, graph.fingerprint())`.
    pub fn compile(&self, graph: &Graph) -> Result<Plan, CompileError> {
        self.get_or_compile(graph, graph.fingerprint())
    }

    pub fn contains(&self, fingerprint: Fingerprint) -> bool {
        self.entries.contains_key(&fingerprint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    fn lookup(&self, fingerprint: Fingerprint) -> Option<Arc<Schedule>> {
        let mut entry = self.entries.get_mut(&fingerprint)?;
        entry.last_used = self.tick();
        Some(entry.schedule.clone())
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn evict_if_needed(&self) {
        let Some(capacity) = self.capacity else {
            return;
        };
        while self.entries.len() > capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.value().last_used)
                .map(|entry| *entry.key());
            match oldest {
                Some(fingerprint) => {
                    self.entries.remove(&fingerprint);
                    CacheEvicted {
                        fingerprint,
                        capacity,
                    }
                    .log();
                }
                None => break,
            }
        }
    }

    fn log_lookup(&self, fingerprint: Fingerprint, hit: bool) {
        CacheLookup {
            fingerprint,
            hit,
            entries: self.entries.len(),
        }
        .log();
    }
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PlanCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanCache")
            .field("entries", &self.entries.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
