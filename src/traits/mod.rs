pub mod executor;
pub mod operator;

pub use executor::PlanExecutor;
pub use operator::{Operator, OperatorInput};
