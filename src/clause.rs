//! Predicate builder that compiles trees of tagged values into literal SQL.
//!
//! This module provides:
//! - Tagged clause values (columns, literals, lists, raw fragments)
//! - Predicate expression trees with negation
//! - A recursive compiler from trees to SQL fragments
//! - JSON predicate definitions
//!
//! The builder emits literal SQL text. Text values are quoted but never
//! escaped, so callers must only pass trusted values or bind parameters
//! through the statement executor instead.

pub mod definition;
pub mod error;
pub mod operator;
pub mod predicate;
pub mod value;

pub use definition::{OperandDefinition, PredicateDefinition, ValueDefinition};
pub use error::{ClauseError, ClauseResult};
pub use operator::PredicateOperator;
pub use predicate::{Fragment, Operand, PredicateDiagnostic, PredicateExpression};
pub use value::{ClauseValue, ClauseValueDiagnostic, ClauseValueKind, Numeric, RawFragment};
