pub mod clause;
pub mod database;

pub use clause::{ClauseError, ClauseValue, Operand, PredicateExpression, PredicateOperator};
pub use database::{Database, InstanceRegistry, StatementError, StatementExecutor};
