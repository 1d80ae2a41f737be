// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod compiler;   // graph -> plan, plan cache
pub mod config;     // engine config + builder
pub mod engine;     // plan executors
pub mod errors;     // error handling
pub mod graph;      // operator graph + fingerprints
pub mod models;     // model service boundary
pub mod observability;
pub mod operators;  // built-in operators
pub mod tracer;     // trace imperative code into graphs
pub mod traits;     // unified abstractions
