// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::compiler::{compile, PlanCache};
use crate::engine::{LevelByLevelExecutor, NodeState, RunOptions, WorkQueueExecutor};
use crate::errors::{CancelReason, GraphError, OperatorError, RunError};
use crate::graph::Graph;
use crate::models::StaticModelService;
use crate::operators::{Ensemble, FnOperator, Judge, MostCommon};
use crate::tracer::{trace, Traced, Tracer};
use crate::traits::{Operator, OperatorInput, PlanExecutor};

/// End-to-end tests for graph construction, compilation and both executors
#[cfg(test)]
mod tests {
    use super::*;

    /// Records start/finish events and counts invocations.
    struct Recorder {
        name: String,
        delay_ms: u64,
        fail: bool,
        events: Arc<Mutex<Vec<String>>>,
        invocations: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Operator for Recorder {
        async fn forward(&self, input: OperatorInput) -> Result<Value, OperatorError> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            self.events.lock().unwrap().push(format!("start:{}", self.name));
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            self.events.lock().unwrap().push(format!("end:{}", self.name));
            if self.fail {
                return Err(OperatorError::failed(format!("{} broke", self.name)));
            }
            Ok(json!({ "node": self.name, "upstream": input.upstream.len() }))
        }

        fn name(&self) -> &str {
            "recorder"
        }
    }

    #[derive(Default)]
    struct Harness {
        events: Arc<Mutex<Vec<String>>>,
        invocations: Arc<AtomicUsize>,
    }

    impl Harness {
        fn recorder(&self, name: &str, delay_ms: u64) -> Arc<dyn Operator> {
            self.build(name, delay_ms, false)
        }

        fn failing(&self, name: &str) -> Arc<dyn Operator> {
            self.build(name, 0, true)
        }

        fn build(&self, name: &str, delay_ms: u64, fail: bool) -> Arc<dyn Operator> {
            Arc::new(Recorder {
                name: name.to_string(),
                delay_ms,
                fail,
                events: self.events.clone(),
                invocations: self.invocations.clone(),
            })
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn index_of(&self, event: &str) -> Option<usize> {
            self.events().iter().position(|e| e == event)
        }
    }

    fn executors(max_workers: usize) -> Vec<Arc<dyn PlanExecutor>> {
        vec![
            Arc::new(WorkQueueExecutor::new(max_workers)),
            Arc::new(LevelByLevelExecutor::new(max_workers)),
        ]
    }

    /// a -> b, a -> c, b -> d, c -> d, d -> e, plus an unrelated f
    fn layered_graph(harness: &Harness) -> Graph {
        let mut graph = Graph::new();
        for (id, delay) in [("a", 5), ("b", 15), ("c", 1), ("d", 5), ("e", 1), ("f", 20)] {
            graph.add_node(harness.recorder(id, delay), id).unwrap();
        }
        for (from, to) in [("a", "b"), ("a", "c"), ("b", "d"), ("c", "d"), ("d", "e")] {
            graph.add_edge(from, to).unwrap();
        }
        graph.set_outputs(["e", "f"]).unwrap();
        graph.seal().unwrap();
        graph
    }

    #[tokio::test]
    async fn test_every_node_starts_after_its_predecessors_finish() {
        for executor in executors(3) {
            let harness = Harness::default();
            let graph = layered_graph(&harness);
            let plan = compile(&graph).unwrap();

            executor.run(&plan, json!({})).await.unwrap();

            for edge in graph.edges() {
                let finished = harness.index_of(&format!("end:{}", edge.from)).unwrap();
                let started = harness.index_of(&format!("start:{}", edge.to)).unwrap();
                assert!(
                    finished < started,
                    "{}: '{}' started before '{}' finished: {:?}",
                    executor.strategy(),
                    edge.to,
                    edge.from,
                    harness.events()
                );
            }
        }
    }

    #[tokio::test]
    async fn test_each_operator_runs_exactly_once() {
        for executor in executors(4) {
            let harness = Harness::default();
            let plan = compile(&layered_graph(&harness)).unwrap();

            let output = executor.run(&plan, json!({})).await.unwrap();

            assert_eq!(harness.invocations.load(Ordering::SeqCst), plan.len());
            assert!(output.states.values().all(|s| *s == NodeState::Completed));
            assert_eq!(output.output("d"), None);
            assert_eq!(output.output("e"), Some(&json!({"node": "e", "upstream": 1})));
        }
    }

    #[tokio::test]
    async fn test_failure_only_fails_dependent_branch() {
        // a -> b -> d, a -> c -> e, b fails
        for executor in executors(2) {
            let harness = Harness::default();
            let mut graph = Graph::new();
            graph.add_node(harness.recorder("a", 0), "a").unwrap();
            graph.add_node(harness.failing("b"), "b").unwrap();
            graph.add_node(harness.recorder("c", 5), "c").unwrap();
            graph.add_node(harness.recorder("d", 0), "d").unwrap();
            graph.add_node(harness.recorder("e", 0), "e").unwrap();
            for (from, to) in [("a", "b"), ("a", "c"), ("b", "d"), ("c", "e")] {
                graph.add_edge(from, to).unwrap();
            }
            graph.seal().unwrap();
            let plan = compile(&graph).unwrap();

            // Designated outputs are the sinks d and e; d is lost.
            let err = executor.run(&plan, json!({})).await.unwrap_err();
            match &err {
                RunError::OutputsFailed { failures } => {
                    assert_eq!(failures.len(), 1);
                    assert_eq!(failures[0].output, "d");
                    assert_eq!(failures[0].cause_node, "b");
                    assert_eq!(failures[0].error, OperatorError::Failed("b broke".into()));
                }
                other => panic!("{}: unexpected error {other:?}", executor.strategy()),
            }
            assert!(harness.index_of("start:d").is_none());

            // Asking only for e succeeds and still reports b's failure.
            let output = executor
                .execute(&plan, json!({}), RunOptions::default().with_outputs(["e"]))
                .await
                .unwrap();
            assert_eq!(output.output("e"), Some(&json!({"node": "e", "upstream": 1})));
            assert_eq!(output.states["d"], NodeState::Failed);
            assert_eq!(output.states["e"], NodeState::Completed);
            assert!(output.failures.contains_key("b"));
        }
    }

    #[tokio::test]
    async fn test_ensemble_feeds_judge() {
        let service = Arc::new(
            StaticModelService::new()
                .with_response("m1", "Paris")
                .with_response("m2", "Lyon")
                .with_response("m3", "Paris"),
        );
        let mut graph = Graph::new();
        graph
            .add_node(
                Arc::new(Ensemble::new(["m1", "m2", "m3"], service.clone())),
                "ensemble",
            )
            .unwrap();
        graph
            .add_node(Arc::new(Judge::new("judge-model", service.clone())), "judge")
            .unwrap();
        graph.add_edge("ensemble", "judge").unwrap();
        graph.seal().unwrap();
        let plan = compile(&graph).unwrap();

        let output = WorkQueueExecutor::new(3)
            .run(&plan, json!({"query": "x"}))
            .await
            .unwrap();

        let answer = output.output("judge").unwrap()["final_answer"].as_str().unwrap();
        assert!(answer.starts_with("[judge-model] "));
        assert!(answer.contains("Query: x"));
        assert!(answer.contains("1. Paris\n2. Lyon\n3. Paris"));
        assert_eq!(service.calls(), 4);
    }

    #[tokio::test]
    async fn test_timeout_cancels_and_stops_dispatch() {
        for executor in executors(2) {
            let harness = Harness::default();
            let mut graph = Graph::new();
            graph.add_node(harness.recorder("hung", 10_000), "hung").unwrap();
            graph.add_node(harness.recorder("after", 0), "after").unwrap();
            graph.add_edge("hung", "after").unwrap();
            graph.seal().unwrap();
            let plan = compile(&graph).unwrap();

            let started = std::time::Instant::now();
            let err = executor
                .execute(
                    &plan,
                    json!({}),
                    RunOptions::default().with_timeout(Duration::from_millis(30)),
                )
                .await
                .unwrap_err();

            assert!(started.elapsed() < Duration::from_secs(5));
            assert_eq!(
                err,
                RunError::Cancelled {
                    reason: CancelReason::Timeout(Duration::from_millis(30))
                }
            );
            assert!(harness.index_of("start:after").is_none());
        }
    }

    #[tokio::test]
    async fn test_external_cancellation() {
        let harness = Harness::default();
        let mut graph = Graph::new();
        graph.add_node(harness.recorder("slow", 10_000), "slow").unwrap();
        graph.seal().unwrap();
        let plan = compile(&graph).unwrap();

        let token = tokio_util::sync::CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let err = WorkQueueExecutor::new(1)
            .execute(&plan, json!({}), RunOptions::default().with_cancellation(token))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RunError::Cancelled {
                reason: CancelReason::Requested
            }
        );
    }

    #[test]
    fn test_rejected_cycle_leaves_graph_unchanged() {
        let harness = Harness::default();
        let mut graph = Graph::new();
        for id in ["a", "b", "c"] {
            graph.add_node(harness.recorder(id, 0), id).unwrap();
        }
        graph.add_edge("a", "b").unwrap();
        graph.add_edge("b", "c").unwrap();
        let before = graph.fingerprint();

        let err = graph.add_edge("c", "a").unwrap_err();
        assert!(matches!(err, GraphError::Cycle { .. }));
        assert_eq!(graph.edges().len(), 2);
        assert!(graph.successors("c").is_empty());
        assert_eq!(graph.fingerprint(), before);

        graph.seal().unwrap();
        assert_eq!(compile(&graph).unwrap().order(), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_same_shape_traces_share_a_cached_plan() {
        let service = Arc::new(StaticModelService::new());
        let cache = PlanCache::new();

        let pipeline = |tracer: Tracer| {
            let ensemble: Arc<dyn Operator> =
                Arc::new(Ensemble::new(["m1", "m2"], service.clone()));
            let vote: Arc<dyn Operator> = Arc::new(MostCommon::new());
            async move {
                let responses = tracer.call(ensemble, tracer.inputs()).await?;
                Ok(vec![tracer.call(vote, responses).await?])
            }
        };

        let first = trace(json!({"query": "one"}), pipeline).await.unwrap();
        let second = trace(json!({"query": "two"}), pipeline).await.unwrap();
        assert_eq!(first.fingerprint, second.fingerprint);

        cache.get_or_compile(&first.graph, first.fingerprint).unwrap();
        let plan = cache
            .get_or_compile(&second.graph, second.fingerprint)
            .unwrap();
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.len(), 1);

        let output = WorkQueueExecutor::new(2)
            .run(&plan, json!({"query": "three"}))
            .await
            .unwrap();
        assert_eq!(
            output.into_first(),
            Some(json!({"final_answer": "[m1] three"}))
        );
    }

    #[tokio::test]
    async fn test_traced_bindings_feed_structured_inputs() {
        let upper: Arc<dyn Operator> = Arc::new(FnOperator::new("upper", |input| {
            let text = input.value.as_str().unwrap_or_default().to_uppercase();
            Ok(json!(text))
        }));
        let join: Arc<dyn Operator> = Arc::new(FnOperator::new("join", |input| {
            let left = input.field("left").and_then(Value::as_str).unwrap_or_default();
            let right = input.field("right").and_then(Value::as_str).unwrap_or_default();
            Ok(json!(format!("{left}-{right}")))
        }));

        let traced = trace(json!({"a": "x", "b": "y"}), |tracer: Tracer| async move {
            let left = tracer.call(upper.clone(), tracer.input("a")?).await?;
            let combined = Traced::object([("left", left), ("right", tracer.input("b")?)]);
            Ok(vec![tracer.call(join, combined).await?])
        })
        .await
        .unwrap();
        assert_eq!(traced.outputs, vec![json!("X-y")]);

        let plan = compile(&traced.graph).unwrap();
        for executor in executors(2) {
            let output = executor.run(&plan, json!({"a": "p", "b": "q"})).await.unwrap();
            assert_eq!(output.into_first(), Some(json!("P-q")));
        }
    }

    #[tokio::test]
    async fn test_strategies_agree_on_outputs_and_states() {
        let mut results = Vec::new();
        for executor in executors(2) {
            let harness = Harness::default();
            let plan = compile(&layered_graph(&harness)).unwrap();
            let output = executor.run(&plan, json!({})).await.unwrap();
            results.push((output.outputs, output.states));
        }
        assert_eq!(results[0], results[1]);
    }
}
