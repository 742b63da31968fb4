//! Tagged leaf values used as predicate operands.

use crate::clause::error::ClauseError;
use crate::clause::predicate::Operand;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// How a clause value is rendered into SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClauseValueKind {
    Column,
    Text,
    Number,
    List,
    RawExpression,
    RawSqlExpression,
}

impl ClauseValueKind {
    pub const ALL: [ClauseValueKind; 6] = [
        ClauseValueKind::Column,
        ClauseValueKind::Text,
        ClauseValueKind::Number,
        ClauseValueKind::List,
        ClauseValueKind::RawExpression,
        ClauseValueKind::RawSqlExpression,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClauseValueKind::Column => "COLUMN",
            ClauseValueKind::Text => "TEXT",
            ClauseValueKind::Number => "NUMBER",
            ClauseValueKind::List => "LIST",
            ClauseValueKind::RawExpression => "RAW_EXPRESSION",
            ClauseValueKind::RawSqlExpression => "RAW_SQL_EXPRESSION",
        }
    }
}

impl fmt::Display for ClauseValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClauseValueKind {
    type Err = ClauseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        ClauseValueKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| ClauseError::UnknownClauseValueKind(s.to_string()))
    }
}

/// Numeric literal payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Int(i64),
    Float(f64),
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Numeric::Int(i) => write!(f, "{}", i),
            Numeric::Float(x) => write!(f, "{}", x),
        }
    }
}

impl Numeric {
    /// False for NaN and infinities, which have no SQL literal
    pub fn is_finite(&self) -> bool {
        match self {
            Numeric::Int(_) => true,
            Numeric::Float(x) => x.is_finite(),
        }
    }
}

impl From<i32> for Numeric {
    fn from(value: i32) -> Self {
        Numeric::Int(value as i64)
    }
}

impl From<i64> for Numeric {
    fn from(value: i64) -> Self {
        Numeric::Int(value)
    }
}

impl From<u32> for Numeric {
    fn from(value: u32) -> Self {
        Numeric::Int(value as i64)
    }
}

impl From<f64> for Numeric {
    fn from(value: f64) -> Self {
        Numeric::Float(value)
    }
}

/// Caller-supplied fragment producer, invoked every time the owning predicate compiles.
#[derive(Clone)]
pub struct RawFragment(Arc<dyn Fn() -> String + Send + Sync>);

impl RawFragment {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn evaluate(&self) -> String {
        (self.0)()
    }
}

impl fmt::Debug for RawFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RawFragment(..)")
    }
}

/// A value tagged with the way it must appear in SQL.
///
/// Payloads are never validated here. A list used where a scalar is expected,
/// or a nested list, is reported when the owning predicate compiles.
#[derive(Debug, Clone)]
pub enum ClauseValue {
    /// Identifier, emitted verbatim
    Column(String),
    /// String literal, wrapped in single quotes without escaping
    Text(String),
    /// Numeric literal, emitted verbatim
    Number(Numeric),
    /// Ordered operands for IN, BETWEEN and the many-way logical operators
    List(Vec<Operand>),
    /// Fragment produced by a closure at compile time
    RawExpression(RawFragment),
    /// SQL fragment, emitted verbatim
    RawSqlExpression(String),
}

impl ClauseValue {
    pub fn column(name: impl Into<String>) -> Self {
        ClauseValue::Column(name.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        ClauseValue::Text(text.into())
    }

    pub fn number(number: impl Into<Numeric>) -> Self {
        ClauseValue::Number(number.into())
    }

    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Operand>,
    {
        ClauseValue::List(items.into_iter().map(Into::into).collect())
    }

    pub fn raw_expression<F>(f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        ClauseValue::RawExpression(RawFragment::new(f))
    }

    pub fn raw_sql_expression(sql: impl Into<String>) -> Self {
        ClauseValue::RawSqlExpression(sql.into())
    }

    pub fn kind(&self) -> ClauseValueKind {
        match self {
            ClauseValue::Column(_) => ClauseValueKind::Column,
            ClauseValue::Text(_) => ClauseValueKind::Text,
            ClauseValue::Number(_) => ClauseValueKind::Number,
            ClauseValue::List(_) => ClauseValueKind::List,
            ClauseValue::RawExpression(_) => ClauseValueKind::RawExpression,
            ClauseValue::RawSqlExpression(_) => ClauseValueKind::RawSqlExpression,
        }
    }

    pub fn is_column(&self) -> bool {
        matches!(self, ClauseValue::Column(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self, ClauseValue::Text(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, ClauseValue::Number(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, ClauseValue::List(_))
    }

    pub fn is_raw_expression(&self) -> bool {
        matches!(self, ClauseValue::RawExpression(_))
    }

    pub fn is_raw_sql_expression(&self) -> bool {
        matches!(self, ClauseValue::RawSqlExpression(_))
    }

    /// String payload of a column, text or raw SQL value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ClauseValue::Column(s) | ClauseValue::Text(s) | ClauseValue::RawSqlExpression(s) => {
                Some(s)
            }
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Numeric> {
        match self {
            ClauseValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Operand]> {
        match self {
            ClauseValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Untyped view of the payload, for logging.
    ///
    /// Raw expressions are not evaluated; they show up as a placeholder string.
    pub fn value(&self) -> serde_json::Value {
        match self {
            ClauseValue::Column(s) | ClauseValue::Text(s) | ClauseValue::RawSqlExpression(s) => {
                serde_json::Value::String(s.clone())
            }
            ClauseValue::Number(Numeric::Int(i)) => serde_json::Value::from(*i),
            ClauseValue::Number(Numeric::Float(x)) => serde_json::Number::from_f64(*x)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ClauseValue::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|item| match item {
                        Operand::Value(value) => value.value(),
                        Operand::Expression(expr) => serde_json::Value::String(expr.to_string()),
                    })
                    .collect(),
            ),
            ClauseValue::RawExpression(_) => {
                serde_json::Value::String("<raw expression>".to_string())
            }
        }
    }

    pub fn to_diagnostic(&self) -> ClauseValueDiagnostic {
        ClauseValueDiagnostic {
            kind: self.kind(),
            value: self.value(),
        }
    }
}

/// Structural record of a clause value for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClauseValueDiagnostic {
    pub kind: ClauseValueKind,
    pub value: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::predicate::PredicateExpression;
    use serde_json::json;

    #[test]
    fn test_factories_set_kind() {
        assert_eq!(ClauseValue::column("age").kind(), ClauseValueKind::Column);
        assert_eq!(ClauseValue::text("bob").kind(), ClauseValueKind::Text);
        assert_eq!(ClauseValue::number(30).kind(), ClauseValueKind::Number);
        assert_eq!(
            ClauseValue::list([ClauseValue::number(1)]).kind(),
            ClauseValueKind::List
        );
        assert_eq!(
            ClauseValue::raw_expression(|| "1".to_string()).kind(),
            ClauseValueKind::RawExpression
        );
        assert_eq!(
            ClauseValue::raw_sql_expression("NOW()").kind(),
            ClauseValueKind::RawSqlExpression
        );
    }

    #[test]
    fn test_kind_predicates() {
        let value = ClauseValue::text("A");
        assert!(value.is_text());
        assert!(!value.is_column());
        assert!(!value.is_number());
        assert!(!value.is_list());
        assert!(!value.is_raw_expression());
        assert!(!value.is_raw_sql_expression());

        assert!(ClauseValue::raw_sql_expression("x").is_raw_sql_expression());
        assert!(ClauseValue::raw_expression(String::new).is_raw_expression());
    }

    #[test]
    fn test_typed_accessors() {
        assert_eq!(ClauseValue::column("age").as_str(), Some("age"));
        assert_eq!(ClauseValue::number(2.5).as_number(), Some(Numeric::Float(2.5)));
        assert_eq!(ClauseValue::number(7).as_str(), None);

        let list = ClauseValue::list([ClauseValue::text("A"), ClauseValue::text("B")]);
        assert_eq!(list.as_list().map(|items| items.len()), Some(2));
    }

    #[test]
    fn test_numeric_display() {
        assert_eq!(Numeric::from(30).to_string(), "30");
        assert_eq!(Numeric::from(-4i64).to_string(), "-4");
        assert_eq!(Numeric::from(1.25).to_string(), "1.25");
        assert!(Numeric::from(1.25).is_finite());
        assert!(!Numeric::from(f64::INFINITY).is_finite());
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!(
            "raw_sql_expression".parse::<ClauseValueKind>().unwrap(),
            ClauseValueKind::RawSqlExpression
        );
        let err = "ARRAY".parse::<ClauseValueKind>().unwrap_err();
        assert!(matches!(err, ClauseError::UnknownClauseValueKind(name) if name == "ARRAY"));
    }

    #[test]
    fn test_diagnostic_record() {
        let diag = ClauseValue::text("A").to_diagnostic();
        assert_eq!(diag.kind, ClauseValueKind::Text);
        assert_eq!(
            serde_json::to_value(&diag).unwrap(),
            json!({"kind": "TEXT", "value": "A"})
        );

        let list = ClauseValue::list(vec![
            Operand::from(ClauseValue::number(1)),
            Operand::from(PredicateExpression::equal(
                ClauseValue::column("a"),
                ClauseValue::number(2),
            )),
        ]);
        assert_eq!(list.value(), json!([1, "a = 2"]));

        let raw = ClauseValue::raw_expression(|| "never called".to_string());
        assert_eq!(raw.value(), json!("<raw expression>"));
    }
}
