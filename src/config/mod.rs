// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod loader;
mod runtime;

pub use loader::{load_config, parse_config, EngineConfig, PlanCacheConfig, Strategy};
pub use runtime::{Engine, EngineBuilder};
