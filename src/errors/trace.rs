// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use super::{CompileError, GraphError, OperatorError, RunError};

/// Errors that abort a trace. No graph is produced or cached when one occurs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TraceError {
    /// An intercepted operator call failed during the eager pass.
    #[error("traced call '{node_id}' failed: {source}")]
    Operator {
        node_id: String,
        #[source]
        source: OperatorError,
    },

    /// `tracer.input(key)` referenced a key missing from the inputs.
    #[error("input '{0}' is not present in the traced inputs")]
    MissingInput(String),

    /// The traced function returned no values.
    #[error("traced function returned no outputs")]
    NoOutputs,

    /// An output was not produced by any traced operator call.
    #[error("traced output {0} was not produced by an operator call")]
    UntracedOutput(usize),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Failure of a [`crate::tracer::JitFunction`] call, by the stage that failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JitError {
    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Run(#[from] RunError),
}
