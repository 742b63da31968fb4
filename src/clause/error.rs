//! Error types for predicate construction and compilation.

use crate::clause::operator::PredicateOperator;
use thiserror::Error;

/// Errors that can occur while building or compiling a predicate.
#[derive(Error, Debug)]
pub enum ClauseError {
    /// An operand has the wrong shape for the operator it is used with
    #[error("Invalid operand for {operator}: {reason}")]
    InvalidOperand {
        operator: PredicateOperator,
        reason: String,
    },

    /// Operator name outside the supported set
    #[error("Unknown predicate operator: {0}")]
    UnknownOperator(String),

    /// Clause value kind name outside the supported set
    #[error("Unknown clause value kind: {0}")]
    UnknownClauseValueKind(String),

    #[error("Malformed predicate definition: {0}")]
    MalformedDefinition(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClauseError {
    pub(crate) fn invalid_operand(operator: PredicateOperator, reason: impl Into<String>) -> Self {
        ClauseError::InvalidOperand {
            operator,
            reason: reason.into(),
        }
    }
}

/// Result type for clause operations
pub type ClauseResult<T> = Result<T, ClauseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClauseError::invalid_operand(PredicateOperator::In, "operand2 must be a list");
        assert_eq!(
            err.to_string(),
            "Invalid operand for IN: operand2 must be a list"
        );

        let err = ClauseError::UnknownOperator("LIKE".to_string());
        assert_eq!(err.to_string(), "Unknown predicate operator: LIKE");

        let err = ClauseError::UnknownClauseValueKind("BLOB".to_string());
        assert_eq!(err.to_string(), "Unknown clause value kind: BLOB");
    }
}
