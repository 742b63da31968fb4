//! Named instance configurations and their shared connections.

use crate::database::config::DatabaseConfig;
use crate::database::driver::{Connection, Driver};
use crate::database::error::{StatementError, StatementResult};
use crate::database::Database;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

/// Instance name used when callers do not pick one
pub const DEFAULT_INSTANCE: &str = "default";

/// A live connection plus the transaction state every handle on it must see
pub(crate) struct InstanceConnection {
    pub(crate) conn: Box<dyn Connection>,
    /// Handle that opened the running transaction
    pub(crate) transaction_owner: Option<u64>,
}

pub(crate) type SharedConnection = Arc<Mutex<InstanceConnection>>;

/// Holds one configuration and at most one live connection per instance name.
///
/// Every `Database` opened for the same instance shares that connection, its
/// transaction and its error log switch.
pub struct InstanceRegistry {
    driver: Arc<dyn Driver>,
    configs: DashMap<String, DatabaseConfig>,
    error_logs: DashMap<String, Arc<AtomicBool>>,
    connections: DashMap<String, SharedConnection>,
    next_handle: AtomicU64,
}

impl InstanceRegistry {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            configs: DashMap::new(),
            error_logs: DashMap::new(),
            connections: DashMap::new(),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Register the configuration for an instance. Each name can be configured once.
    pub fn configure(&self, name: impl Into<String>, config: DatabaseConfig) -> StatementResult<()> {
        match self.configs.entry(name.into()) {
            Entry::Occupied(entry) => Err(StatementError::AlreadyConfigured(entry.key().clone())),
            Entry::Vacant(entry) => {
                self.error_logs
                    .insert(entry.key().clone(), Arc::new(AtomicBool::new(false)));
                entry.insert(config);
                Ok(())
            }
        }
    }

    /// Names of all configured instances, sorted
    pub fn configured_instances(&self) -> Vec<String> {
        let mut names: Vec<String> = self.configs.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn config(&self, name: &str) -> Option<DatabaseConfig> {
        self.configs.get(name).map(|c| c.value().clone())
    }

    pub fn is_connected(&self, name: &str) -> bool {
        self.connections.contains_key(name)
    }

    /// Open a handle on an instance, connecting on first use
    pub fn open(&self, name: &str) -> StatementResult<Database> {
        let config = self
            .config(name)
            .ok_or_else(|| StatementError::NotConfigured(name.to_string()))?;
        let connection = self.connection(name, &config)?;
        let error_log = self
            .error_logs
            .get(name)
            .map(|flag| flag.value().clone())
            .unwrap_or_default();
        let handle_id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        Ok(Database::new(name, config, connection, error_log, handle_id))
    }

    pub fn open_default(&self) -> StatementResult<Database> {
        self.open(DEFAULT_INSTANCE)
    }

    /// Drop the shared connection; the next `open` reconnects
    pub fn disconnect(&self, name: &str) -> bool {
        self.connections.remove(name).is_some()
    }

    fn connection(&self, name: &str, config: &DatabaseConfig) -> StatementResult<SharedConnection> {
        if let Some(existing) = self.connections.get(name) {
            return Ok(existing.value().clone());
        }

        let conn = connect_with_retry(self.driver.as_ref(), name, config)?;
        let shared = Arc::new(Mutex::new(InstanceConnection {
            conn,
            transaction_owner: None,
        }));
        // Another thread may have connected meanwhile; keep whichever landed first
        let entry = self.connections.entry(name.to_string()).or_insert(shared);
        Ok(entry.value().clone())
    }
}

fn connect_with_retry(
    driver: &dyn Driver,
    name: &str,
    config: &DatabaseConfig,
) -> StatementResult<Box<dyn Connection>> {
    let max_attempts = config.connect_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match driver.connect(config) {
            Ok(mut connection) => {
                connection
                    .set_autocommit(config.autocommit)
                    .map_err(|source| StatementError::Connect {
                        instance: name.to_string(),
                        attempts: attempt,
                        source,
                    })?;
                info!(
                    "Connected instance '{}' to {}/{} (attempt {})",
                    name, config.server, config.database, attempt
                );
                return Ok(connection);
            }
            Err(e) if e.is_transient() && attempt < max_attempts => {
                warn!(
                    "Instance '{}' unavailable (attempt {}/{}): {}",
                    name, attempt, max_attempts, e
                );
                thread::sleep(config.retry_delay());
            }
            Err(source) => {
                return Err(StatementError::Connect {
                    instance: name.to_string(),
                    attempts: attempt,
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::driver::mock::MockDriver;
    use crate::database::driver::DriverErrorKind;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn quick_config() -> DatabaseConfig {
        DatabaseConfig::new("localhost", "app", "svc", "pw").with_retry(3, Duration::ZERO)
    }

    #[test]
    fn test_configure_once() {
        let registry = InstanceRegistry::new(Arc::new(MockDriver::default()));
        registry.configure("reporting", quick_config()).unwrap();
        registry.configure(DEFAULT_INSTANCE, quick_config()).unwrap();

        let err = registry.configure("reporting", quick_config()).unwrap_err();
        assert!(matches!(err, StatementError::AlreadyConfigured(name) if name == "reporting"));

        assert_eq!(
            registry.configured_instances(),
            vec!["default".to_string(), "reporting".to_string()]
        );
        assert_eq!(registry.config("reporting").unwrap().database, "app");
        assert!(registry.config("missing").is_none());
    }

    #[test]
    fn test_open_unconfigured() {
        let registry = InstanceRegistry::new(Arc::new(MockDriver::default()));
        let err = registry.open("missing").err().unwrap();
        assert!(matches!(err, StatementError::NotConfigured(name) if name == "missing"));
    }

    #[test]
    fn test_connection_reused_per_instance() {
        let driver = Arc::new(MockDriver::default());
        let registry = InstanceRegistry::new(driver.clone());
        registry.configure(DEFAULT_INSTANCE, quick_config()).unwrap();

        let _first = registry.open_default().unwrap();
        let _second = registry.open_default().unwrap();
        assert_eq!(driver.connects.load(Ordering::SeqCst), 1);
        assert!(registry.is_connected(DEFAULT_INSTANCE));
        assert_eq!(driver.journal(), vec!["AUTOCOMMIT ON".to_string()]);

        assert!(registry.disconnect(DEFAULT_INSTANCE));
        let _third = registry.open_default().unwrap();
        assert_eq!(driver.connects.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_retries_while_unavailable() {
        let driver = Arc::new(MockDriver {
            unavailable_for: 2,
            ..MockDriver::default()
        });
        let registry = InstanceRegistry::new(driver.clone());
        registry.configure(DEFAULT_INSTANCE, quick_config()).unwrap();

        assert!(registry.open_default().is_ok());
        assert_eq!(driver.connects.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_gives_up_after_attempts() {
        let driver = Arc::new(MockDriver {
            unavailable_for: 10,
            ..MockDriver::default()
        });
        let registry = InstanceRegistry::new(driver.clone());
        registry.configure(DEFAULT_INSTANCE, quick_config()).unwrap();

        let err = registry.open_default().err().unwrap();
        match err {
            StatementError::Connect {
                attempts, source, ..
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(source.kind, DriverErrorKind::Unavailable);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(driver.connects.load(Ordering::SeqCst), 3);
        assert!(!registry.is_connected(DEFAULT_INSTANCE));
    }

    #[test]
    fn test_fatal_connect_error_not_retried() {
        let driver = Arc::new(MockDriver {
            refuse: true,
            ..MockDriver::default()
        });
        let registry = InstanceRegistry::new(driver.clone());
        registry.configure(DEFAULT_INSTANCE, quick_config()).unwrap();

        let err = registry.open_default().err().unwrap();
        assert!(matches!(err, StatementError::Connect { attempts: 1, .. }));
        assert_eq!(driver.connects.load(Ordering::SeqCst), 1);
    }
}
