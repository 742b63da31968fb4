//! Driver seam between the statement executor and a concrete SQL engine.

use crate::database::config::DatabaseConfig;
use std::fmt;
use thiserror::Error;

/// Positional bind value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(value as i64)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// A result row, keeping the column order of the result set
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Fails when the column and value counts differ
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Result<Self, DriverError> {
        if columns.len() != values.len() {
            return Err(DriverError::new(
                DriverErrorKind::Other,
                format!(
                    "row has {} columns but {} values",
                    columns.len(),
                    values.len()
                ),
            ));
        }
        Ok(Self { columns, values })
    }

    /// Get a value by column name
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }
}

/// What a driver reports after running one statement
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatementOutcome {
    /// `None` when the statement produced no result set
    pub rows: Option<Vec<Row>>,
    pub affected_rows: u64,
    pub last_insert_id: u64,
}

impl StatementOutcome {
    pub fn rows(rows: Vec<Row>) -> Self {
        Self {
            rows: Some(rows),
            ..Self::default()
        }
    }

    pub fn affected(affected_rows: u64) -> Self {
        Self {
            affected_rows,
            ..Self::default()
        }
    }

    pub fn inserted(last_insert_id: u64) -> Self {
        Self {
            affected_rows: 1,
            last_insert_id,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// Server not reachable yet; connecting again may succeed
    Unavailable,
    Prepare,
    Bind,
    Execute,
    Other,
}

impl fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverErrorKind::Unavailable => "unavailable",
            DriverErrorKind::Prepare => "prepare",
            DriverErrorKind::Bind => "bind",
            DriverErrorKind::Execute => "execute",
            DriverErrorKind::Other => "driver",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} error: {message}")]
pub struct DriverError {
    pub kind: DriverErrorKind,
    /// Engine-specific error code, when the engine reports one
    pub code: Option<i32>,
    pub message: String,
}

impl DriverError {
    pub fn new(kind: DriverErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    pub fn is_transient(&self) -> bool {
        self.kind == DriverErrorKind::Unavailable
    }
}

/// An open session with a SQL engine
pub trait Connection: Send {
    /// Prepare, bind and run one statement
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<StatementOutcome, DriverError>;

    fn set_autocommit(&mut self, enabled: bool) -> Result<(), DriverError>;

    fn commit(&mut self) -> Result<(), DriverError>;

    fn rollback(&mut self) -> Result<(), DriverError>;
}

/// Opens connections for an instance configuration
pub trait Driver: Send + Sync {
    fn connect(&self, config: &DatabaseConfig) -> Result<Box<dyn Connection>, DriverError>;
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted driver for unit tests.

    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Fails with `Unavailable` for the first `unavailable_for` connects.
    #[derive(Default)]
    pub struct MockDriver {
        pub unavailable_for: u32,
        pub refuse: bool,
        pub connects: AtomicU32,
        pub journal: Arc<Mutex<Vec<String>>>,
    }

    impl MockDriver {
        pub fn journal(&self) -> Vec<String> {
            self.journal.lock().clone()
        }
    }

    impl Driver for MockDriver {
        fn connect(&self, _config: &DatabaseConfig) -> Result<Box<dyn Connection>, DriverError> {
            let attempt = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
            if self.refuse {
                return Err(DriverError::new(DriverErrorKind::Other, "access denied").with_code(1045));
            }
            if attempt <= self.unavailable_for {
                return Err(
                    DriverError::new(DriverErrorKind::Unavailable, "server not reachable")
                        .with_code(2002),
                );
            }
            Ok(Box::new(MockConnection {
                journal: self.journal.clone(),
            }))
        }
    }

    pub struct MockConnection {
        journal: Arc<Mutex<Vec<String>>>,
    }

    impl Connection for MockConnection {
        fn execute(
            &mut self,
            sql: &str,
            params: &[SqlValue],
        ) -> Result<StatementOutcome, DriverError> {
            self.journal.lock().push(sql.to_string());
            let upper = sql.trim_start().to_ascii_uppercase();
            if upper.starts_with("BAD") {
                return Err(DriverError::new(DriverErrorKind::Prepare, "syntax error").with_code(1064));
            }
            if upper.contains("FAIL") {
                return Err(DriverError::new(DriverErrorKind::Execute, "constraint violated").with_code(1062));
            }
            if upper.starts_with("SELECT") {
                let rows = (1..=2)
                    .map(|id| {
                        Row::new(
                            vec!["id".to_string(), "param_count".to_string()],
                            vec![SqlValue::Int(id), SqlValue::Int(params.len() as i64)],
                        )
                    })
                    .collect::<Result<_, _>>()?;
                return Ok(StatementOutcome::rows(rows));
            }
            if upper.starts_with("INSERT") {
                return Ok(StatementOutcome::inserted(40 + params.len() as u64));
            }
            if upper.starts_with("UPDATE") || upper.starts_with("DELETE") {
                return Ok(StatementOutcome::affected(3));
            }
            Ok(StatementOutcome::default())
        }

        fn set_autocommit(&mut self, enabled: bool) -> Result<(), DriverError> {
            self.journal
                .lock()
                .push(format!("AUTOCOMMIT {}", if enabled { "ON" } else { "OFF" }));
            Ok(())
        }

        fn commit(&mut self) -> Result<(), DriverError> {
            self.journal.lock().push("COMMIT".to_string());
            Ok(())
        }

        fn rollback(&mut self) -> Result<(), DriverError> {
            self.journal.lock().push("ROLLBACK".to_string());
            Ok(())
        }
    }
}
