//! The store container
//!
//! Owns the connection pool, the dialect tag, and the migration registry.
//! Construction-time inputs are a live database handle and its dialect;
//! the container composes the upgrade engine on top of them.

use std::sync::Once;

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;

use crate::dialect::Dialect;
use crate::error::{StoreError, StoreResult};
use crate::migrations::registry::MigrationRegistry;
use crate::migrations::runner::UpgradeRunner;
use crate::migrations::version::{UpgradeConfig, VersionStore};

static INSTALL_DRIVERS: Once = Once::new();

/// Install the compiled-in Any drivers exactly once per process.
pub(crate) fn install_default_drivers() {
    INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);
}

/// SQL-backed device and key store
pub struct Store {
    pool: AnyPool,
    dialect: Dialect,
    config: UpgradeConfig,
    registry: MigrationRegistry,
}

impl Store {
    /// Wrap an existing pool with the released migration registry.
    pub fn new(pool: AnyPool, dialect: Dialect) -> Self {
        Self::with_registry(pool, dialect, MigrationRegistry::builtin())
    }

    /// Wrap an existing pool with a caller-supplied registry.
    pub fn with_registry(pool: AnyPool, dialect: Dialect, registry: MigrationRegistry) -> Self {
        Self {
            pool,
            dialect,
            config: UpgradeConfig::default(),
            registry,
        }
    }

    /// Connect to a database URL, sniffing the dialect from its scheme.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        install_default_drivers();
        let dialect = Dialect::from_database_url(url)?;
        let pool = AnyPoolOptions::new().connect(url).await.map_err(|e| {
            StoreError::Initialization(format!("Failed to connect to database: {}", e))
        })?;
        Ok(Self::new(pool, dialect))
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Read-only access to the step sequence, for callers that want to
    /// apply steps manually instead of going through [`Store::upgrade`].
    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    /// Bring the schema up to the latest version in the registry.
    ///
    /// Safe to re-invoke after a failure: the engine resumes at the step
    /// that failed. Concurrent invocations from multiple processes
    /// against one database are not serialized here; callers running
    /// several processes must serialize upgrades externally.
    pub async fn upgrade(&self) -> StoreResult<()> {
        UpgradeRunner::new(&self.pool, self.dialect, &self.config, &self.registry)
            .upgrade()
            .await
    }

    /// The currently persisted schema version.
    pub async fn version(&self) -> StoreResult<i64> {
        VersionStore::new(&self.config, self.dialect)
            .get_version(&self.pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_sniffs_sqlite_dialect() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        assert_eq!(store.dialect(), Dialect::Sqlite);
        assert_eq!(store.registry().len(), 4);
    }

    #[tokio::test]
    async fn test_connect_rejects_unknown_scheme() {
        assert!(matches!(
            Store::connect("mysql://localhost/db").await,
            Err(StoreError::UnknownDialect(_))
        ));
    }
}
