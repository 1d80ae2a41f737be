// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Built-in operators.
//!
//! | operator         | output                     |
//! |------------------|----------------------------|
//! | `PromptTemplate` | `{"prompt": ...}`          |
//! | `ModelCall`      | `{"response": ...}`        |
//! | `Ensemble`       | `{"responses": [...]}`     |
//! | `Judge`          | `{"final_answer": ...}`    |
//! | `MostCommon`     | `{"final_answer": ...}`    |
//! | `FnOperator`     | whatever the closure returns |

mod ensemble;
mod function;
mod judge;
mod model_call;
mod most_common;
mod prompt;

pub use ensemble::Ensemble;
pub use function::FnOperator;
pub use judge::Judge;
pub use model_call::ModelCall;
pub use most_common::MostCommon;
pub use prompt::PromptTemplate;
