//! SQLite-backed driver registry.
//!
//! The store file is provisioned outside the bot and is never created here:
//! a missing file is reported as [`RegistryError::StoreUnavailable`] on every
//! operation until it appears.

use crate::error::RegistryError;
use crate::model::{ArrivalRecord, Driver, Location, NewDriver};
use crate::registry::DriverRegistry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatehouse_core::{ArrivalRecordId, Dni, DriverId};
use serde::Deserialize;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Primary SQLite result codes that mean the file itself cannot be used
/// right now: BUSY, LOCKED, IOERR and CANTOPEN.
const UNAVAILABLE_CODES: &[i64] = &[5, 6, 10, 14];

/// Store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,

    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long to wait for a pooled connection, in seconds.
    #[serde(default = "default_acquire_timeout_seconds")]
    pub acquire_timeout_seconds: u64,
}

fn default_max_connections() -> u32 {
    4
}

fn default_acquire_timeout_seconds() -> u64 {
    5
}

impl StoreConfig {
    /// Creates a configuration for the given file with default pool settings.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: default_max_connections(),
            acquire_timeout_seconds: default_acquire_timeout_seconds(),
        }
    }
}

/// Row type for driver queries.
#[derive(FromRow)]
struct DriverRow {
    id: i64,
    name: String,
    dni: String,
    plate: String,
}

impl DriverRow {
    fn try_into_driver(self) -> Result<Driver, sqlx::Error> {
        let dni = Dni::parse(self.dni).map_err(|e| {
            sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid dni for driver {}: {}", self.id, e),
            )))
        })?;
        Ok(Driver {
            id: DriverId::new(self.id),
            name: self.name,
            dni,
            plate: self.plate,
        })
    }
}

/// Row type for arrival queries.
#[derive(FromRow)]
struct ArrivalRow {
    id: i64,
    driver_id: i64,
    location: String,
    timestamp: DateTime<Utc>,
}

impl ArrivalRow {
    fn try_into_record(self) -> Result<ArrivalRecord, sqlx::Error> {
        let location = self.location.parse::<Location>().map_err(|e| {
            sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                e,
            )))
        })?;
        Ok(ArrivalRecord {
            id: ArrivalRecordId::new(self.id),
            driver_id: DriverId::new(self.driver_id),
            location,
            timestamp: self.timestamp,
        })
    }
}

/// Driver registry backed by a SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteDriverRegistry {
    path: PathBuf,
    pool: SqlitePool,
}

impl SqliteDriverRegistry {
    /// Creates a registry for the configured file.
    ///
    /// Connections are opened lazily, so this succeeds even when the file
    /// does not exist yet.
    #[must_use]
    pub fn new(config: &StoreConfig) -> Self {
        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(false)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect_lazy_with(options);

        Self {
            path: config.path.clone(),
            pool,
        }
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checks that the backing file exists.
    pub async fn ensure_available(&self) -> Result<(), RegistryError> {
        match tokio::fs::try_exists(&self.path).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(RegistryError::StoreUnavailable {
                reason: format!("no store found at {}", self.path.display()),
            }),
            Err(e) => Err(RegistryError::StoreUnavailable {
                reason: format!("cannot access {}: {e}", self.path.display()),
            }),
        }
    }

    /// Creates the `drivers` and `arrival_records` tables if they are missing.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub async fn migrate(&self) -> Result<(), RegistryError> {
        self.ensure_available().await?;
        MIGRATOR.run(&self.pool).await.map_err(|e| match e {
            sqlx::migrate::MigrateError::Execute(inner) => classify("migrate", inner),
            other => RegistryError::OperationFailed {
                operation: "migrate",
                reason: other.to_string(),
            },
        })
    }

    /// Lists the arrivals recorded for a driver, oldest first.
    pub async fn arrivals_for_driver(
        &self,
        driver_id: DriverId,
    ) -> Result<Vec<ArrivalRecord>, RegistryError> {
        self.ensure_available().await?;
        let rows: Vec<ArrivalRow> = sqlx::query_as(
            r#"
            SELECT id, driver_id, location, timestamp
            FROM arrival_records
            WHERE driver_id = ?1
            ORDER BY id
            "#,
        )
        .bind(driver_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| classify("list arrivals", e))?;

        rows.into_iter()
            .map(|r| r.try_into_record().map_err(|e| classify("list arrivals", e)))
            .collect()
    }

    /// Closes all pooled connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl DriverRegistry for SqliteDriverRegistry {
    #[instrument(skip_all, fields(dni = %dni))]
    async fn lookup(&self, dni: &Dni) -> Result<Option<Driver>, RegistryError> {
        self.ensure_available().await?;
        let row: Option<DriverRow> = sqlx::query_as(
            r#"
            SELECT id, name, dni, plate
            FROM drivers
            WHERE dni = ?1
            "#,
        )
        .bind(dni.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify("lookup", e))?;

        let driver = row
            .map(DriverRow::try_into_driver)
            .transpose()
            .map_err(|e| classify("lookup", e))?;
        debug!(found = driver.is_some(), "driver lookup");
        Ok(driver)
    }

    #[instrument(skip_all, fields(dni = %driver.dni))]
    async fn create(&self, driver: NewDriver) -> Result<Driver, RegistryError> {
        self.ensure_available().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO drivers (name, dni, plate)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(&driver.name)
        .bind(driver.dni.as_str())
        .bind(&driver.plate)
        .execute(&self.pool)
        .await
        .map_err(|e| classify("create", e))?;

        let id = DriverId::new(result.last_insert_rowid());
        debug!(driver_id = %id, "driver created");
        Ok(driver.into_driver(id))
    }

    #[instrument(skip_all, fields(driver_id = %driver_id, location = %location))]
    async fn record_arrival(
        &self,
        driver_id: DriverId,
        location: Location,
    ) -> Result<ArrivalRecord, RegistryError> {
        self.ensure_available().await?;
        let timestamp = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO arrival_records (driver_id, location, timestamp)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(driver_id.get())
        .bind(location.as_str())
        .bind(timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| classify("record arrival", e))?;

        let id = ArrivalRecordId::new(result.last_insert_rowid());
        debug!(arrival_id = %id, "arrival recorded");
        Ok(ArrivalRecord {
            id,
            driver_id,
            location,
            timestamp,
        })
    }
}

/// Sorts a sqlx error into the registry's error kinds.
fn classify(operation: &'static str, err: sqlx::Error) -> RegistryError {
    match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => RegistryError::StoreUnavailable {
            reason: err.to_string(),
        },
        sqlx::Error::Database(db) => {
            let primary = db
                .code()
                .and_then(|code| code.parse::<i64>().ok())
                .map(|code| code & 0xff);
            match primary {
                Some(code) if UNAVAILABLE_CODES.contains(&code) => {
                    RegistryError::StoreUnavailable {
                        reason: err.to_string(),
                    }
                }
                _ => RegistryError::OperationFailed {
                    operation,
                    reason: err.to_string(),
                },
            }
        }
        sqlx::Error::Decode(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::TypeNotFound { .. } => RegistryError::Unexpected {
            operation,
            reason: err.to_string(),
        },
        _ => RegistryError::OperationFailed {
            operation,
            reason: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn migrated_registry() -> (TempDir, SqliteDriverRegistry) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gatehouse.db");
        std::fs::File::create(&path).expect("create store file");

        let registry = SqliteDriverRegistry::new(&StoreConfig::new(&path));
        registry.migrate().await.expect("migrate");
        (dir, registry)
    }

    fn dni(value: &str) -> Dni {
        Dni::parse(value).expect("valid dni")
    }

    #[tokio::test]
    async fn create_then_lookup_round_trips() {
        let (_dir, registry) = migrated_registry().await;

        let created = registry
            .create(NewDriver::new("Juan", dni("12345678"), "ABC123"))
            .await
            .expect("create");
        assert!(created.id.get() > 0);

        let found = registry
            .lookup(&dni("12345678"))
            .await
            .expect("lookup")
            .expect("driver should exist");
        assert_eq!(found, created);
    }

    #[tokio::test]
    async fn lookup_of_unknown_dni_is_none_and_idempotent() {
        let (_dir, registry) = migrated_registry().await;
        registry
            .create(NewDriver::new("Ana", dni("111"), "XYZ999"))
            .await
            .expect("create");

        let first = registry.lookup(&dni("222")).await.expect("lookup");
        let second = registry.lookup(&dni("222")).await.expect("lookup");
        assert_eq!(first, None);
        assert_eq!(first, second);

        let a = registry.lookup(&dni("111")).await.expect("lookup");
        let b = registry.lookup(&dni("111")).await.expect("lookup");
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn duplicate_dni_is_rejected_by_the_store() {
        let (_dir, registry) = migrated_registry().await;
        registry
            .create(NewDriver::new("Juan", dni("12345678"), "ABC123"))
            .await
            .expect("create");

        let err = registry
            .create(NewDriver::new("Other", dni("12345678"), "ZZZ000"))
            .await
            .expect_err("duplicate should fail");
        assert!(matches!(
            err,
            RegistryError::OperationFailed {
                operation: "create",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn record_arrival_appends_one_record() {
        let (_dir, registry) = migrated_registry().await;
        let driver = registry
            .create(NewDriver::new("Juan", dni("12345678"), "ABC123"))
            .await
            .expect("create");

        let record = registry
            .record_arrival(driver.id, Location::Checkpoint)
            .await
            .expect("record arrival");
        assert_eq!(record.driver_id, driver.id);
        assert_eq!(record.location, Location::Checkpoint);

        let arrivals = registry
            .arrivals_for_driver(driver.id)
            .await
            .expect("list arrivals");
        assert_eq!(arrivals.len(), 1);
        assert_eq!(arrivals[0].id, record.id);
    }

    #[tokio::test]
    async fn arrival_for_unknown_driver_fails() {
        let (_dir, registry) = migrated_registry().await;

        let err = registry
            .record_arrival(DriverId::new(999), Location::Checkpoint)
            .await
            .expect_err("dangling driver id should fail");
        assert!(matches!(err, RegistryError::OperationFailed { .. }));
    }

    #[tokio::test]
    async fn missing_store_file_is_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = SqliteDriverRegistry::new(&StoreConfig::new(dir.path().join("absent.db")));

        let err = registry
            .lookup(&dni("12345678"))
            .await
            .expect_err("missing store should fail");
        assert!(err.is_unavailable());

        let err = registry.migrate().await.expect_err("missing store should fail");
        assert!(err.is_unavailable());
        assert!(!dir.path().join("absent.db").exists());
    }

    #[test]
    fn store_config_defaults() {
        let config = StoreConfig::new("/var/lib/gatehouse/gatehouse.db");
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.acquire_timeout_seconds, 5);
    }
}
