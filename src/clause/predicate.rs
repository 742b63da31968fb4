//! Predicate expression trees and their compilation into SQL fragments.

use crate::clause::error::{ClauseError, ClauseResult};
use crate::clause::operator::PredicateOperator;
use crate::clause::value::ClauseValue;
use log::debug;
use serde::Serialize;
use std::fmt;

/// Either slot of a predicate node
#[derive(Debug, Clone)]
pub enum Operand {
    Value(ClauseValue),
    Expression(Box<PredicateExpression>),
}

impl From<ClauseValue> for Operand {
    fn from(value: ClauseValue) -> Self {
        Operand::Value(value)
    }
}

impl From<PredicateExpression> for Operand {
    fn from(expr: PredicateExpression) -> Self {
        Operand::Expression(Box::new(expr))
    }
}

/// Rendered form of an operand
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Fragment {
    Scalar(String),
    List(Vec<String>),
}

/// A comparison or boolean node.
///
/// Trees are immutable once built. `compile` only reads the tree, so a tree
/// can be compiled any number of times, from any thread, with identical output.
#[derive(Debug, Clone)]
pub struct PredicateExpression {
    operand1: Operand,
    operator: PredicateOperator,
    operand2: Option<Operand>,
    negate: bool,
}

struct Compiled {
    fragment1: Option<String>,
    fragment2: Option<Fragment>,
    sql: String,
}

impl PredicateExpression {
    /// Create a node, checking that operators which need a second operand have one.
    pub fn new(
        operand1: impl Into<Operand>,
        operator: PredicateOperator,
        operand2: Option<Operand>,
        negate: bool,
    ) -> ClauseResult<Self> {
        if operator.requires_operand2() && operand2.is_none() {
            return Err(ClauseError::invalid_operand(
                operator,
                "operand2 is required",
            ));
        }
        Ok(Self::node(operand1.into(), operator, operand2, negate))
    }

    fn node(
        operand1: Operand,
        operator: PredicateOperator,
        operand2: Option<Operand>,
        negate: bool,
    ) -> Self {
        Self {
            operand1,
            operator,
            operand2,
            negate,
        }
    }

    fn binary(
        left: impl Into<Operand>,
        operator: PredicateOperator,
        right: impl Into<Operand>,
    ) -> Self {
        Self::node(left.into(), operator, Some(right.into()), false)
    }

    fn many<I>(operator: PredicateOperator, items: I) -> Self
    where
        I: IntoIterator<Item = PredicateExpression>,
    {
        Self::node(
            ClauseValue::raw_sql_expression("").into(),
            operator,
            Some(ClauseValue::list(items).into()),
            false,
        )
    }

    pub fn equal(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::binary(left, PredicateOperator::Equal, right)
    }

    pub fn greater_than(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::binary(left, PredicateOperator::GreaterThan, right)
    }

    pub fn less_than(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::binary(left, PredicateOperator::LessThan, right)
    }

    pub fn greater_or_equal(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::binary(left, PredicateOperator::GreaterOrEqual, right)
    }

    pub fn less_or_equal(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::binary(left, PredicateOperator::LessOrEqual, right)
    }

    /// `range` should be a two-element list
    pub fn between(left: impl Into<Operand>, range: impl Into<Operand>) -> Self {
        Self::binary(left, PredicateOperator::Between, range)
    }

    pub fn in_list(left: impl Into<Operand>, list: impl Into<Operand>) -> Self {
        Self::binary(left, PredicateOperator::In, list)
    }

    pub fn is_null(operand: impl Into<Operand>) -> Self {
        Self::node(operand.into(), PredicateOperator::IsNull, None, false)
    }

    pub fn is_true(operand: impl Into<Operand>) -> Self {
        Self::node(operand.into(), PredicateOperator::IsTrue, None, false)
    }

    pub fn and(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::binary(left, PredicateOperator::And, right)
    }

    pub fn or(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::binary(left, PredicateOperator::Or, right)
    }

    pub fn and_many<I>(items: I) -> Self
    where
        I: IntoIterator<Item = PredicateExpression>,
    {
        Self::many(PredicateOperator::AndMany, items)
    }

    pub fn or_many<I>(items: I) -> Self
    where
        I: IntoIterator<Item = PredicateExpression>,
    {
        Self::many(PredicateOperator::OrMany, items)
    }

    pub fn custom(operand: impl Into<Operand>) -> Self {
        Self::node(operand.into(), PredicateOperator::Custom, None, false)
    }

    /// Flip the negate flag
    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    pub fn operand1(&self) -> &Operand {
        &self.operand1
    }

    pub fn operator(&self) -> PredicateOperator {
        self.operator
    }

    pub fn operand2(&self) -> Option<&Operand> {
        self.operand2.as_ref()
    }

    pub fn is_negated(&self) -> bool {
        self.negate
    }

    /// Render this tree into a SQL fragment
    pub fn compile(&self) -> ClauseResult<String> {
        self.render().map(|compiled| compiled.sql)
    }

    /// Compile, then return the operand fragments alongside the operator for logging
    pub fn to_diagnostic(&self) -> ClauseResult<PredicateDiagnostic> {
        let compiled = self.render()?;
        Ok(PredicateDiagnostic {
            operand1: compiled.fragment1,
            operator: self.operator,
            operand2: compiled.fragment2,
            negate: self.negate,
        })
    }

    pub fn to_json(&self) -> ClauseResult<String> {
        Ok(serde_json::to_string(&self.to_diagnostic()?)?)
    }

    fn render(&self) -> ClauseResult<Compiled> {
        match self.operator {
            PredicateOperator::AndMany => self.render_many("AND"),
            PredicateOperator::OrMany => self.render_many("OR"),
            _ => self.render_binary(),
        }
    }

    fn render_binary(&self) -> ClauseResult<Compiled> {
        let op = self.operator;
        let f1 = match &self.operand1 {
            Operand::Expression(expr) => expr.compile()?,
            Operand::Value(value) => render_value(value, op)?,
        };

        let f2 = if op.requires_operand2() {
            let operand2 = self
                .operand2
                .as_ref()
                .ok_or_else(|| ClauseError::invalid_operand(op, "operand2 is required"))?;
            Some(render_operand2(operand2, op)?)
        } else {
            None
        };

        let sql = match (op, &f2) {
            (PredicateOperator::Equal, Some(Fragment::Scalar(f2))) => {
                if self.negate {
                    format!("{} <> {}", f1, f2)
                } else {
                    format!("{} = {}", f1, f2)
                }
            }
            (
                PredicateOperator::GreaterThan
                | PredicateOperator::LessThan
                | PredicateOperator::GreaterOrEqual
                | PredicateOperator::LessOrEqual,
                Some(Fragment::Scalar(f2)),
            ) => {
                let (symbol, complement) = op
                    .comparison_symbols()
                    .ok_or_else(|| ClauseError::invalid_operand(op, "not a comparison"))?;
                let symbol = if self.negate { complement } else { symbol };
                format!("({} {} {})", f1, symbol, f2)
            }
            (PredicateOperator::Between, Some(Fragment::List(bounds))) => {
                let (low, high) = match bounds.as_slice() {
                    [low, high] => (low, high),
                    _ => {
                        return Err(ClauseError::invalid_operand(
                            op,
                            format!("operand2 must hold exactly 2 values, got {}", bounds.len()),
                        ))
                    }
                };
                let keyword = if self.negate { "NOT BETWEEN" } else { "BETWEEN" };
                format!("{} {} ({}) AND ({})", f1, keyword, low, high)
            }
            (PredicateOperator::In, Some(Fragment::List(items))) => {
                if items.is_empty() {
                    return Err(ClauseError::invalid_operand(op, "operand2 list is empty"));
                }
                let keyword = if self.negate { "NOT IN" } else { "IN" };
                format!("({}) {} ({})", f1, keyword, items.join(","))
            }
            (PredicateOperator::IsNull, _) => {
                if self.negate {
                    format!("({}) IS NOT NULL", f1)
                } else {
                    format!("({}) IS NULL", f1)
                }
            }
            (PredicateOperator::IsTrue, _) => {
                if self.negate {
                    format!("({}) = TRUE", f1)
                } else {
                    format!("({}) = FALSE", f1)
                }
            }
            (PredicateOperator::And | PredicateOperator::Or, Some(Fragment::Scalar(f2))) => {
                let joined = format!("({}) {} ({})", f1, logical_keyword(op), f2);
                if self.negate {
                    format!("NOT ({})", joined)
                } else {
                    joined
                }
            }
            (PredicateOperator::Custom, _) => {
                debug!("Custom predicate passes through left fragment: {}", f1);
                f1.clone()
            }
            (op, _) => {
                return Err(ClauseError::invalid_operand(
                    op,
                    "operand2 has the wrong shape for this operator",
                ))
            }
        };

        Ok(Compiled {
            fragment1: Some(f1),
            fragment2: f2,
            sql,
        })
    }

    fn render_many(&self, keyword: &str) -> ClauseResult<Compiled> {
        let op = self.operator;
        let items = match &self.operand2 {
            Some(Operand::Value(ClauseValue::List(items))) => items,
            _ => {
                return Err(ClauseError::invalid_operand(
                    op,
                    "operand2 must be a list of predicate expressions",
                ))
            }
        };
        if items.is_empty() {
            return Err(ClauseError::invalid_operand(op, "operand2 list is empty"));
        }

        // Validate every element before rendering any of them
        let exprs = items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Operand::Expression(expr) => Ok(&**expr),
                Operand::Value(value) => Err(ClauseError::invalid_operand(
                    op,
                    format!(
                        "element {} is a {} value, not a predicate expression",
                        i,
                        value.kind()
                    ),
                )),
            })
            .collect::<ClauseResult<Vec<_>>>()?;

        let fragments = exprs
            .into_iter()
            .map(PredicateExpression::compile)
            .collect::<ClauseResult<Vec<_>>>()?;

        let joined = fragments.join(&format!(" {} ", keyword));
        let sql = if self.negate {
            format!("NOT ({})", joined)
        } else {
            format!("({})", joined)
        };

        Ok(Compiled {
            fragment1: None,
            fragment2: Some(Fragment::List(fragments)),
            sql,
        })
    }
}

impl fmt::Display for PredicateExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.compile() {
            Ok(sql) => f.write_str(&sql),
            Err(e) => write!(f, "<invalid predicate: {}>", e),
        }
    }
}

fn logical_keyword(op: PredicateOperator) -> &'static str {
    match op {
        PredicateOperator::Or | PredicateOperator::OrMany => "OR",
        _ => "AND",
    }
}

/// Render a value that must produce a single fragment
fn render_value(value: &ClauseValue, op: PredicateOperator) -> ClauseResult<String> {
    match value {
        ClauseValue::Column(s) | ClauseValue::RawSqlExpression(s) => Ok(s.clone()),
        ClauseValue::Number(n) if !n.is_finite() => Err(ClauseError::invalid_operand(
            op,
            format!("{} is not a finite number", n),
        )),
        ClauseValue::Number(n) => Ok(n.to_string()),
        ClauseValue::Text(s) => Ok(format!("'{}'", s)),
        ClauseValue::RawExpression(raw) => Ok(raw.evaluate()),
        ClauseValue::List(_) => Err(ClauseError::invalid_operand(
            op,
            "a list cannot be used where a single value is expected",
        )),
    }
}

fn render_operand(operand: &Operand, op: PredicateOperator) -> ClauseResult<String> {
    match operand {
        Operand::Expression(expr) => expr.compile(),
        Operand::Value(value) => render_value(value, op),
    }
}

fn render_operand2(operand: &Operand, op: PredicateOperator) -> ClauseResult<Fragment> {
    match operand {
        Operand::Value(ClauseValue::List(items)) if op.expects_list() => items
            .iter()
            .map(|item| render_operand(item, op))
            .collect::<ClauseResult<Vec<_>>>()
            .map(Fragment::List),
        _ if op.expects_list() => Err(ClauseError::invalid_operand(
            op,
            "operand2 must be a list",
        )),
        _ => render_operand(operand, op).map(Fragment::Scalar),
    }
}

/// Structural record of a compiled node for logging. Not meant to be parsed back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredicateDiagnostic {
    pub operand1: Option<String>,
    pub operator: PredicateOperator,
    pub operand2: Option<Fragment>,
    pub negate: bool,
}
