//! Operator definitions for predicate expressions.

use crate::clause::error::ClauseError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Operators a predicate expression node can apply to its operands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredicateOperator {
    // Comparison
    Equal,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,

    // List predicates
    Between,
    In,

    // Unary tests
    IsNull,
    IsTrue,

    // Logical
    And,
    Or,
    AndMany,
    OrMany,

    /// Passes the left fragment through untouched
    Custom,
}

impl PredicateOperator {
    pub const ALL: [PredicateOperator; 14] = [
        PredicateOperator::Equal,
        PredicateOperator::GreaterThan,
        PredicateOperator::LessThan,
        PredicateOperator::GreaterOrEqual,
        PredicateOperator::LessOrEqual,
        PredicateOperator::Between,
        PredicateOperator::In,
        PredicateOperator::IsNull,
        PredicateOperator::IsTrue,
        PredicateOperator::And,
        PredicateOperator::Or,
        PredicateOperator::AndMany,
        PredicateOperator::OrMany,
        PredicateOperator::Custom,
    ];

    /// Get the canonical name of this operator
    pub fn as_str(&self) -> &'static str {
        match self {
            PredicateOperator::Equal => "EQUAL",
            PredicateOperator::GreaterThan => "GREATER_THAN",
            PredicateOperator::LessThan => "LESS_THAN",
            PredicateOperator::GreaterOrEqual => "GREATER_OR_EQUAL",
            PredicateOperator::LessOrEqual => "LESS_OR_EQUAL",
            PredicateOperator::Between => "BETWEEN",
            PredicateOperator::In => "IN",
            PredicateOperator::IsNull => "IS_NULL",
            PredicateOperator::IsTrue => "IS_TRUE",
            PredicateOperator::And => "AND",
            PredicateOperator::Or => "OR",
            PredicateOperator::AndMany => "AND_MANY",
            PredicateOperator::OrMany => "OR_MANY",
            PredicateOperator::Custom => "CUSTOM",
        }
    }

    /// Whether a node with this operator must carry a second operand
    pub fn requires_operand2(&self) -> bool {
        !matches!(
            self,
            PredicateOperator::IsNull | PredicateOperator::IsTrue | PredicateOperator::Custom
        )
    }

    /// Whether operand2 must resolve to a list
    pub fn expects_list(&self) -> bool {
        matches!(
            self,
            PredicateOperator::Between
                | PredicateOperator::In
                | PredicateOperator::AndMany
                | PredicateOperator::OrMany
        )
    }

    /// Comparison operator paired with its complement, used for negation
    pub(crate) fn comparison_symbols(&self) -> Option<(&'static str, &'static str)> {
        match self {
            PredicateOperator::GreaterThan => Some((">", "<=")),
            PredicateOperator::LessThan => Some(("<", ">=")),
            PredicateOperator::GreaterOrEqual => Some((">=", "<")),
            PredicateOperator::LessOrEqual => Some(("<=", ">")),
            _ => None,
        }
    }
}

impl fmt::Display for PredicateOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PredicateOperator {
    type Err = ClauseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        PredicateOperator::ALL
            .iter()
            .copied()
            .find(|op| op.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| ClauseError::UnknownOperator(s.to_string()))
    }
}
