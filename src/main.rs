// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{bail, Context, Result};
use serde_json::json;
use std::env;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use operator_graph::config::{load_config, EngineBuilder, EngineConfig};
use operator_graph::models::{ModelService, StaticModelService};
use operator_graph::operators::{Ensemble, Judge, MostCommon};
use operator_graph::tracer::{Traced, Tracer};
use operator_graph::traits::Operator;

const DEFAULT_QUERY: &str = "What is the capital of France?";

fn usage(program: &str) -> String {
    format!(
        "Usage: {} [--config <engine.yaml>] [query]\n\
         Example: {} --config engine.yaml \"What is 2 + 2?\"",
        program, program
    )
}

/// Split `[--config path] [query...]` into the config path and the query text.
fn parse_args(args: &[String]) -> Result<(Option<String>, String)> {
    let mut config = None;
    let mut words = Vec::new();
    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--config" => match rest.next() {
                Some(path) => config = Some(path.clone()),
                None => bail!("--config needs a path\n{}", usage(&args[0])),
            },
            "--help" | "-h" => bail!("{}", usage(&args[0])),
            _ => words.push(arg.clone()),
        }
    }
    let query = if words.is_empty() {
        DEFAULT_QUERY.to_string()
    } else {
        words.join(" ")
    };
    Ok((config, query))
}

/// Demo models: three advisors that disagree and a judge that echoes its prompt.
fn demo_models() -> StaticModelService {
    StaticModelService::new()
        .with_response("advisor-a", "Paris")
        .with_response("advisor-b", "Paris")
        .with_response("advisor-c", "Lyon")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let (config_path, query) = parse_args(&args)?;
    let config = match &config_path {
        Some(path) => load_config(path).with_context(|| format!("loading {}", path))?,
        None => EngineConfig::default(),
    };

    let engine = EngineBuilder::from_config(&config).build();
    let service: Arc<dyn ModelService> = Arc::new(engine.retrying(demo_models()));

    println!("🚀 Operator Graph Demo");
    println!("═══════════════════════════════════");
    println!("Query: \"{}\"", query);
    println!(
        "Strategy: {} (max_workers={})",
        engine.executor().strategy(),
        engine.executor().max_workers()
    );
    println!();

    let ensemble: Arc<dyn Operator> = Arc::new(Ensemble::new(
        ["advisor-a", "advisor-b", "advisor-c"],
        service.clone(),
    ));
    let judge: Arc<dyn Operator> = Arc::new(Judge::new("judge", service));
    let vote: Arc<dyn Operator> = Arc::new(MostCommon::new());

    let pipeline = engine.jit("ensemble_judge", move |tracer: Tracer| {
        let (ensemble, judge, vote) = (ensemble.clone(), judge.clone(), vote.clone());
        async move {
            let query = tracer.input("query")?;
            let responses = tracer
                .call(ensemble, Traced::object([("query", query.clone())]))
                .await?;
            let majority = tracer.call(vote, responses.clone()).await?;
            let verdict = tracer
                .call(
                    judge,
                    Traced::object([("query", query), ("responses", responses.get("responses"))]),
                )
                .await?;
            Ok(vec![majority, verdict])
        }
    });

    // First call traces, second call with the same input shape runs the compiled plan.
    for (round, label) in ["traced", "compiled"].iter().enumerate() {
        let started = Instant::now();
        let outputs = pipeline
            .call(json!({ "query": query }))
            .await
            .with_context(|| format!("round {} failed", round + 1))?;
        println!("▶ Round {} ({}) in {:?}", round + 1, label, started.elapsed());
        println!("  majority: {}", outputs[0]["final_answer"]);
        println!("  judge:    {}", outputs[1]["final_answer"]);
    }

    let stats = engine.cache().stats();
    println!();
    println!(
        "📦 Plan cache: {} entries, {} hits, {} misses; {} trace(s)",
        stats.entries,
        stats.hits,
        stats.misses,
        pipeline.trace_count()
    );
    Ok(())
}
