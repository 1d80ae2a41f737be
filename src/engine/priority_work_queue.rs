// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Ready queue for the work-queue scheduler.
//!
//! Nodes enter the queue when their last predecessor completes and leave it
//! when dispatched. Among ready nodes the one earliest in plan order is
//! dispatched first, so with `max_workers = 1` a run follows the plan's
//! topological order exactly and dispatch order is reproducible in general.
//!
//! # Examples
//!
//! ```rust
//! use operator_graph::engine::priority_work_queue::{PrioritizedTask, PriorityWorkQueue};
//!
//! let mut queue = PriorityWorkQueue::new();
//! queue.push(PrioritizedTask::new("late".to_string(), 7));
//! queue.push(PrioritizedTask::new("early".to_string(), 2));
//!
//! assert_eq!(queue.pop(), Some("early".to_string()));
//! assert_eq!(queue.pop(), Some("late".to_string()));
//! assert_eq!(queue.pop(), None);
//! ```

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// A ready node and its index in the plan's topological order.
#[derive(Debug, Clone)]
pub struct PrioritizedTask {
    pub node_id: String,
    pub position: usize,
}

impl PrioritizedTask {
    pub fn new(node_id: String, position: usize) -> Self {
        Self { node_id, position }
    }
}

impl PartialEq for PrioritizedTask {
    /// Identity is the node id; the same node is never queued twice.
    fn eq(&self, other: &Self) -> bool {
        self.node_id == other.node_id
    }
}

impl Eq for PrioritizedTask {}

impl PartialOrd for PrioritizedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PrioritizedTask {
    /// `BinaryHeap` is a max-heap: the *lowest* plan position must compare greatest.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .position
            .cmp(&self.position)
            .then_with(|| other.node_id.cmp(&self.node_id))
    }
}

/// Min-heap of ready nodes keyed by plan position.
#[derive(Debug, Default)]
pub struct PriorityWorkQueue {
    heap: BinaryHeap<PrioritizedTask>,
    queued: HashSet<String>,
}

impl PriorityWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a task. Pushing a node that is already queued is a no-op.
    pub fn push(&mut self, task: PrioritizedTask) {
        if self.queued.insert(task.node_id.clone()) {
            self.heap.push(task);
        }
    }

    pub fn extend<I>(&mut self, tasks: I)
    where
        I: IntoIterator<Item = PrioritizedTask>,
    {
        for task in tasks {
            self.push(task);
        }
    }

    /// Remove and return the ready node earliest in plan order.
    pub fn pop(&mut self) -> Option<String> {
        let task = self.heap.pop()?;
        self.queued.remove(&task.node_id);
        Some(task.node_id)
    }

    pub fn peek(&self) -> Option<&PrioritizedTask> {
        self.heap.peek()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Drop every queued task, e.g. once a run is cancelled.
    pub fn clear(&mut self) -> usize {
        let dropped = self.heap.len();
        self.heap.clear();
        self.queued.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pops_in_plan_order() {
        let mut queue = PriorityWorkQueue::new();
        queue.push(PrioritizedTask::new("c".to_string(), 2));
        queue.push(PrioritizedTask::new("a".to_string(), 0));
        queue.push(PrioritizedTask::new("b".to_string(), 1));

        assert_eq!(queue.pop(), Some("a".to_string()));
        assert_eq!(queue.pop(), Some("b".to_string()));
        assert_eq!(queue.pop(), Some("c".to_string()));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_duplicate_push_is_ignored() {
        let mut queue = PriorityWorkQueue::new();
        queue.push(PrioritizedTask::new("a".to_string(), 0));
        queue.push(PrioritizedTask::new("a".to_string(), 0));
        assert_eq!(queue.len(), 1);

        queue.pop();
        // Once popped the node may be queued again.
        queue.push(PrioritizedTask::new("a".to_string(), 0));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_interleaved_push_and_pop() {
        let mut queue = PriorityWorkQueue::new();
        queue.extend([
            PrioritizedTask::new("d".to_string(), 3),
            PrioritizedTask::new("b".to_string(), 1),
        ]);
        assert_eq!(queue.pop(), Some("b".to_string()));

        queue.push(PrioritizedTask::new("c".to_string(), 2));
        assert_eq!(queue.peek().map(|t| t.node_id.as_str()), Some("c"));
        assert_eq!(queue.pop(), Some("c".to_string()));
        assert_eq!(queue.pop(), Some("d".to_string()));
    }

    #[test]
    fn test_clear_reports_dropped() {
        let mut queue = PriorityWorkQueue::new();
        queue.push(PrioritizedTask::new("x".to_string(), 0));
        queue.push(PrioritizedTask::new("y".to_string(), 1));
        assert_eq!(queue.clear(), 2);
        assert_eq!(queue.pop(), None);
    }
}
