//! JSON predicate definitions.
//!
//! An expression node is written as
//! `{"operator": "EQUAL", "left": <operand>, "right": <operand>, "negate": false}`
//! and a value as `{"kind": "COLUMN", "value": "age"}`. List values hold an
//! array of operands. `left` may be omitted for `AND_MANY` / `OR_MANY`.

use crate::clause::error::{ClauseError, ClauseResult};
use crate::clause::operator::PredicateOperator;
use crate::clause::predicate::{Operand, PredicateExpression};
use crate::clause::value::{ClauseValue, ClauseValueKind, Numeric};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OperandDefinition {
    Expression(PredicateDefinition),
    Value(ValueDefinition),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredicateDefinition {
    pub operator: String,
    #[serde(default)]
    pub left: Option<Box<OperandDefinition>>,
    #[serde(default)]
    pub right: Option<Box<OperandDefinition>>,
    #[serde(default)]
    pub negate: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValueDefinition {
    pub kind: String,
    pub value: serde_json::Value,
}

impl PredicateDefinition {
    pub fn build(&self) -> ClauseResult<PredicateExpression> {
        let operator: PredicateOperator = self.operator.parse()?;

        let left = match &self.left {
            Some(left) => left.build(operator)?,
            None if matches!(
                operator,
                PredicateOperator::AndMany | PredicateOperator::OrMany
            ) =>
            {
                ClauseValue::raw_sql_expression("").into()
            }
            None => {
                return Err(ClauseError::invalid_operand(
                    operator,
                    "left operand is required",
                ))
            }
        };
        let right = self
            .right
            .as_deref()
            .map(|right| right.build(operator))
            .transpose()?;

        PredicateExpression::new(left, operator, right, self.negate)
    }
}

impl OperandDefinition {
    fn build(&self, operator: PredicateOperator) -> ClauseResult<Operand> {
        match self {
            OperandDefinition::Expression(def) => def.build().map(Operand::from),
            OperandDefinition::Value(def) => def.build(operator).map(Operand::from),
        }
    }
}

impl ValueDefinition {
    fn build(&self, operator: PredicateOperator) -> ClauseResult<ClauseValue> {
        let kind: ClauseValueKind = self.kind.parse()?;
        match kind {
            ClauseValueKind::Column | ClauseValueKind::Text | ClauseValueKind::RawSqlExpression => {
                let s = self.value.as_str().ok_or_else(|| {
                    ClauseError::invalid_operand(
                        operator,
                        format!("{} value must be a string", kind),
                    )
                })?;
                Ok(match kind {
                    ClauseValueKind::Column => ClauseValue::column(s),
                    ClauseValueKind::Text => ClauseValue::text(s),
                    _ => ClauseValue::raw_sql_expression(s),
                })
            }
            ClauseValueKind::Number => {
                let number = self
                    .value
                    .as_i64()
                    .map(Numeric::Int)
                    .or_else(|| self.value.as_f64().map(Numeric::Float))
                    .ok_or_else(|| {
                        ClauseError::invalid_operand(operator, "NUMBER value must be numeric")
                    })?;
                Ok(ClauseValue::Number(number))
            }
            ClauseValueKind::List => {
                let items = self.value.as_array().ok_or_else(|| {
                    ClauseError::invalid_operand(operator, "LIST value must be an array")
                })?;
                let operands = items
                    .iter()
                    .map(|item| OperandDefinition::deserialize(item)?.build(operator))
                    .collect::<ClauseResult<Vec<_>>>()?;
                Ok(ClauseValue::List(operands))
            }
            ClauseValueKind::RawExpression => Err(ClauseError::invalid_operand(
                operator,
                "RAW_EXPRESSION values cannot be loaded from a definition",
            )),
        }
    }
}

impl PredicateExpression {
    /// Build a tree from a JSON definition
    pub fn from_json(json: &str) -> ClauseResult<Self> {
        let def: PredicateDefinition = serde_json::from_str(json)?;
        def.build()
    }

    pub fn from_definition_file(path: impl AsRef<Path>) -> ClauseResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_simple_equal() {
        let expr = PredicateExpression::from_json(
            r#"{
                "operator": "EQUAL",
                "left": {"kind": "COLUMN", "value": "age"},
                "right": {"kind": "NUMBER", "value": 30}
            }"#,
        )
        .unwrap();
        assert_eq!(expr.compile().unwrap(), "age = 30");
    }

    #[test]
    fn test_nested_definition() {
        let expr = PredicateExpression::from_json(
            r#"{
                "operator": "AND",
                "negate": true,
                "left": {
                    "operator": "IN",
                    "left": {"kind": "COLUMN", "value": "status"},
                    "right": {"kind": "LIST", "value": [
                        {"kind": "TEXT", "value": "A"},
                        {"kind": "TEXT", "value": "B"}
                    ]}
                },
                "right": {
                    "operator": "IS_NULL",
                    "negate": true,
                    "left": {"kind": "COLUMN", "value": "deleted_at"}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(
            expr.compile().unwrap(),
            "NOT (((status) IN ('A','B')) AND ((deleted_at) IS NOT NULL))"
        );
    }

    #[test]
    fn test_or_many_without_left() {
        let expr = PredicateExpression::from_json(
            r#"{
                "operator": "OR_MANY",
                "right": {"kind": "LIST", "value": [
                    {"operator": "EQUAL", "left": {"kind": "COLUMN", "value": "a"}, "right": {"kind": "NUMBER", "value": 1.5}},
                    {"operator": "IS_TRUE", "left": {"kind": "COLUMN", "value": "b"}}
                ]}
            }"#,
        )
        .unwrap();
        assert_eq!(expr.compile().unwrap(), "(a = 1.5 OR (b) = FALSE)");
    }

    #[test]
    fn test_unknown_operator() {
        let err = PredicateExpression::from_json(
            r#"{"operator": "LIKE", "left": {"kind": "COLUMN", "value": "a"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ClauseError::UnknownOperator(name) if name == "LIKE"));
    }

    #[test]
    fn test_unknown_kind() {
        let err = PredicateExpression::from_json(
            r#"{"operator": "IS_NULL", "left": {"kind": "ARRAY", "value": "a"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ClauseError::UnknownClauseValueKind(name) if name == "ARRAY"));
    }

    #[test]
    fn test_payload_shape_errors() {
        let bad_number = PredicateExpression::from_json(
            r#"{"operator": "EQUAL", "left": {"kind": "COLUMN", "value": "a"}, "right": {"kind": "NUMBER", "value": "ten"}}"#,
        );
        assert!(matches!(bad_number, Err(ClauseError::InvalidOperand { .. })));

        let raw = PredicateExpression::from_json(
            r#"{"operator": "CUSTOM", "left": {"kind": "RAW_EXPRESSION", "value": "now()"}}"#,
        );
        assert!(matches!(raw, Err(ClauseError::InvalidOperand { .. })));

        let missing_right = PredicateExpression::from_json(
            r#"{"operator": "EQUAL", "left": {"kind": "COLUMN", "value": "a"}}"#,
        );
        assert!(matches!(
            missing_right,
            Err(ClauseError::InvalidOperand {
                operator: PredicateOperator::Equal,
                ..
            })
        ));
    }

    #[test]
    fn test_malformed_json() {
        let err = PredicateExpression::from_json("{not json").unwrap_err();
        assert!(matches!(err, ClauseError::MalformedDefinition(_)));
    }

    #[test]
    fn test_from_definition_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"{"operator": "IS_NULL", "left": {"kind": "COLUMN", "value": "deleted_at"}}"#,
        )
        .unwrap();

        let expr = PredicateExpression::from_definition_file(file.path()).unwrap();
        assert_eq!(expr.compile().unwrap(), "(deleted_at) IS NULL");

        let missing = PredicateExpression::from_definition_file("/nonexistent/predicate.json");
        assert!(matches!(missing, Err(ClauseError::Io(_))));
    }
}
