// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod execution;
mod graph;
mod model;
mod trace;

pub use config::ConfigError;
pub use execution::{CancelReason, NodeFailure, OperatorError, OutputFailure, RunError};
pub use graph::{CompileError, GraphError};
pub use model::ModelError;
pub use trace::{JitError, TraceError};
