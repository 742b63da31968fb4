//! Statement executor on top of a pluggable driver.
//!
//! A `Database` runs SQL templates with positional bind values, records
//! failed statements, and controls autocommit and transactions on the
//! connection shared by its instance.

pub mod config;
pub mod driver;
pub mod error;
pub mod registry;

pub use config::DatabaseConfig;
pub use driver::{
    Connection, Driver, DriverError, DriverErrorKind, Row, SqlValue, StatementOutcome,
};
pub use error::{StatementError, StatementResult};
pub use registry::{InstanceRegistry, DEFAULT_INSTANCE};

use crate::clause::PredicateExpression;
use chrono::{DateTime, Local};
use log::{debug, error, warn};
use registry::SharedConnection;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Token replaced by a compiled predicate in statement templates
pub const WHERE_PLACEHOLDER: &str = "{where}";

/// Replace every `{where}` token in `template` with `fragment`
pub fn splice_where(template: &str, fragment: &str) -> StatementResult<String> {
    if !template.contains(WHERE_PLACEHOLDER) {
        return Err(StatementError::Template(format!(
            "template has no {} placeholder",
            WHERE_PLACEHOLDER
        )));
    }
    Ok(template.replace(WHERE_PLACEHOLDER, fragment))
}

/// The four statement shapes callers hand to an executor
pub trait StatementExecutor {
    /// Run an INSERT and return the generated identifier
    fn insert(&mut self, sql: &str, params: &[SqlValue]) -> StatementResult<u64>;

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> StatementResult<Vec<Row>>;

    /// Run an UPDATE and return the affected row count
    fn update(&mut self, sql: &str, params: &[SqlValue]) -> StatementResult<u64>;

    /// Run a DELETE and return the affected row count
    fn delete(&mut self, sql: &str, params: &[SqlValue]) -> StatementResult<u64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Insert,
    Query,
    Update,
    Delete,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatementKind::Insert => "INSERT",
            StatementKind::Query => "QUERY",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// A failed statement, kept on the handle that ran it
#[derive(Debug, Clone)]
pub struct SqlErrorRecord {
    pub statement_id: String,
    pub statement_kind: StatementKind,
    pub driver_kind: DriverErrorKind,
    pub code: Option<i32>,
    pub message: String,
    pub sql: String,
    pub param_count: usize,
    pub timestamp: DateTime<Local>,
}

impl fmt::Display for SqlErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sqlclause: {} error", self.statement_kind)?;
        writeln!(f, "\tstatement: {}", self.statement_id)?;
        writeln!(f, "\ttime: {}", self.timestamp.to_rfc3339())?;
        writeln!(f, "\tsql: {}", self.sql)?;
        writeln!(f, "\tparameters: {}", self.param_count)?;
        if let Some(code) = self.code {
            writeln!(f, "\tcode: {}", code)?;
        }
        writeln!(f, "\t{}: {}", self.driver_kind, self.message)
    }
}

/// Handle on one configured instance.
///
/// Handles on the same instance share its connection, so at most one of them
/// can hold a transaction at a time. A handle dropped mid-transaction rolls it back.
pub struct Database {
    instance: String,
    config: DatabaseConfig,
    connection: SharedConnection,
    error_log: Arc<AtomicBool>,
    handle_id: u64,
    sql_errors: Vec<SqlErrorRecord>,
}

impl Database {
    pub(crate) fn new(
        instance: &str,
        config: DatabaseConfig,
        connection: SharedConnection,
        error_log: Arc<AtomicBool>,
        handle_id: u64,
    ) -> Self {
        Self {
            instance: instance.to_string(),
            config,
            connection,
            error_log,
            handle_id,
            sql_errors: Vec::new(),
        }
    }

    pub fn instance_name(&self) -> &str {
        &self.instance
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Run the same INSERT once per parameter set, stopping at the first failure
    pub fn insert_many(&mut self, sql: &str, param_sets: &[Vec<SqlValue>]) -> StatementResult<Vec<u64>> {
        param_sets
            .iter()
            .map(|params| self.insert(sql, params))
            .collect()
    }

    /// First row of a query, if any
    pub fn query_single(&mut self, sql: &str, params: &[SqlValue]) -> StatementResult<Option<Row>> {
        Ok(self.query(sql, params)?.into_iter().next())
    }

    /// Compile `predicate` into the `{where}` slot of `template`, then query
    pub fn query_where(
        &mut self,
        template: &str,
        predicate: &PredicateExpression,
        params: &[SqlValue],
    ) -> StatementResult<Vec<Row>> {
        let fragment = predicate.compile()?;
        let sql = splice_where(template, &fragment)?;
        self.query(&sql, params)
    }

    /// Turn autocommit off until `commit` or `rollback`.
    ///
    /// Fails while any handle on the same instance holds a transaction.
    pub fn begin(&mut self) -> StatementResult<()> {
        let mut shared = self.connection.lock();
        if shared.transaction_owner.is_some() {
            return Err(StatementError::Transaction(format!(
                "transaction already in progress on instance '{}'",
                self.instance
            )));
        }
        shared
            .conn
            .set_autocommit(false)
            .map_err(|e| StatementError::Transaction(format!("begin failed: {}", e)))?;
        shared.transaction_owner = Some(self.handle_id);
        drop(shared);

        debug!("[{}] transaction started", self.instance);
        Ok(())
    }

    pub fn commit(&mut self) -> StatementResult<()> {
        self.finish_transaction("commit", |conn| conn.commit())
    }

    pub fn rollback(&mut self) -> StatementResult<()> {
        self.finish_transaction("rollback", |conn| conn.rollback())
    }

    /// True when this handle opened the running transaction
    pub fn in_transaction(&self) -> bool {
        self.connection.lock().transaction_owner == Some(self.handle_id)
    }

    fn finish_transaction<F>(&mut self, action: &str, finish: F) -> StatementResult<()>
    where
        F: FnOnce(&mut dyn Connection) -> Result<(), DriverError>,
    {
        let mut shared = self.connection.lock();
        if shared.transaction_owner != Some(self.handle_id) {
            return Err(StatementError::Transaction(
                "no transaction in progress".to_string(),
            ));
        }
        finish(&mut *shared.conn)
            .map_err(|e| StatementError::Transaction(format!("{} failed: {}", action, e)))?;
        shared
            .conn
            .set_autocommit(self.config.autocommit)
            .map_err(|e| StatementError::Transaction(format!("{} failed: {}", action, e)))?;
        shared.transaction_owner = None;
        drop(shared);

        debug!("[{}] transaction finished with {}", self.instance, action);
        Ok(())
    }

    pub fn sql_errors(&self) -> &[SqlErrorRecord] {
        &self.sql_errors
    }

    pub fn has_sql_errors(&self) -> bool {
        !self.sql_errors.is_empty()
    }

    pub fn last_sql_error(&self) -> Option<&SqlErrorRecord> {
        self.sql_errors.last()
    }

    pub fn clear_sql_errors(&mut self) {
        self.sql_errors.clear();
    }

    /// Start appending failed statements to the configured log directory.
    ///
    /// The switch is shared by every handle on the instance.
    pub fn enable_error_log(&self) -> StatementResult<()> {
        let dir = self.config.log_dir.clone().ok_or_else(|| StatementError::LogDirectory {
            path: PathBuf::new(),
            reason: "no log directory configured".to_string(),
        })?;
        let invalid = |reason: &str| StatementError::LogDirectory {
            path: dir.clone(),
            reason: reason.to_string(),
        };

        let metadata = fs::metadata(&dir).map_err(|_| invalid("does not exist"))?;
        if !metadata.is_dir() {
            return Err(invalid("is not a directory"));
        }
        if metadata.permissions().readonly() {
            return Err(invalid("is not writable"));
        }

        self.error_log.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn disable_error_log(&self) {
        self.error_log.store(false, Ordering::SeqCst);
    }

    pub fn is_error_log_enabled(&self) -> bool {
        self.error_log.load(Ordering::SeqCst)
    }

    fn run(
        &mut self,
        kind: StatementKind,
        sql: &str,
        params: &[SqlValue],
    ) -> StatementResult<StatementOutcome> {
        let statement_id = format!("{:016x}", rand::random::<u64>());
        debug!(
            "[{}] {} {} {} ({} params)",
            self.instance,
            statement_id,
            kind,
            sql,
            params.len()
        );

        let result = self.connection.lock().conn.execute(sql, params);
        result.map_err(|e| self.record_failure(statement_id, kind, sql, params, e))
    }

    fn record_failure(
        &mut self,
        statement_id: String,
        kind: StatementKind,
        sql: &str,
        params: &[SqlValue],
        err: DriverError,
    ) -> StatementError {
        error!(
            "[{}] {} {} failed: {} (sql: {})",
            self.instance, statement_id, kind, err, sql
        );

        let record = SqlErrorRecord {
            statement_id: statement_id.clone(),
            statement_kind: kind,
            driver_kind: err.kind,
            code: err.code,
            message: err.message.clone(),
            sql: sql.to_string(),
            param_count: params.len(),
            timestamp: Local::now(),
        };
        if self.is_error_log_enabled() {
            if let Err(e) = self.append_error_log(&record) {
                warn!("[{}] failed to write SQL error log: {}", self.instance, e);
            }
        }
        self.sql_errors.push(record);

        match err.kind {
            DriverErrorKind::Prepare | DriverErrorKind::Bind => StatementError::Prepare {
                statement_id,
                message: err.to_string(),
            },
            _ => StatementError::Execute {
                statement_id,
                message: err.to_string(),
            },
        }
    }

    fn append_error_log(&self, record: &SqlErrorRecord) -> StatementResult<()> {
        let Some(dir) = &self.config.log_dir else {
            return Ok(());
        };
        let path = dir.join(format!(
            "sqlclause-{}.log",
            record.timestamp.format("%Y%m%d%H")
        ));
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", record)?;
        Ok(())
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let mut shared = self.connection.lock();
        if shared.transaction_owner != Some(self.handle_id) {
            return;
        }
        warn!(
            "[{}] handle dropped inside a transaction, rolling back",
            self.instance
        );
        if let Err(e) = shared.conn.rollback() {
            warn!("[{}] rollback on drop failed: {}", self.instance, e);
        }
        if let Err(e) = shared.conn.set_autocommit(self.config.autocommit) {
            warn!("[{}] restoring autocommit failed: {}", self.instance, e);
        }
        shared.transaction_owner = None;
    }
}

impl StatementExecutor for Database {
    fn insert(&mut self, sql: &str, params: &[SqlValue]) -> StatementResult<u64> {
        Ok(self.run(StatementKind::Insert, sql, params)?.last_insert_id)
    }

    /// Statements without a result set, including CREATE, yield no rows
    fn query(&mut self, sql: &str, params: &[SqlValue]) -> StatementResult<Vec<Row>> {
        let outcome = self.run(StatementKind::Query, sql, params)?;
        let is_create = sql
            .trim_start()
            .get(..6)
            .is_some_and(|head| head.eq_ignore_ascii_case("CREATE"));
        if is_create {
            return Ok(Vec::new());
        }
        Ok(outcome.rows.unwrap_or_default())
    }

    fn update(&mut self, sql: &str, params: &[SqlValue]) -> StatementResult<u64> {
        Ok(self.run(StatementKind::Update, sql, params)?.affected_rows)
    }

    fn delete(&mut self, sql: &str, params: &[SqlValue]) -> StatementResult<u64> {
        Ok(self.run(StatementKind::Delete, sql, params)?.affected_rows)
    }
}
