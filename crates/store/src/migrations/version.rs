//! Durable schema version tracking

use sqlx::{Any, AnyPool, Row, Transaction};

use crate::dialect::Dialect;
use crate::error::{StoreError, StoreResult};

/// Configuration for the upgrade engine
#[derive(Debug, Clone)]
pub struct UpgradeConfig {
    /// Table holding the single schema-version row
    pub version_table: String,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            version_table: "wirelink_version".to_string(),
        }
    }
}

/// Reads and durably records the current schema version
///
/// The version table holds at most one row: a single integer equal to the
/// count of successfully committed migration steps. Only the upgrade
/// runner may write it.
pub struct VersionStore {
    table: String,
    dialect: Dialect,
}

impl VersionStore {
    pub fn new(config: &UpgradeConfig, dialect: Dialect) -> Self {
        Self {
            table: config.version_table.clone(),
            dialect,
        }
    }

    /// Current schema version, creating the version table if absent.
    ///
    /// Table creation is idempotent. A table with no row is the
    /// uninitialized state and reads as 0, not an error.
    pub async fn get_version(&self, pool: &AnyPool) -> StoreResult<i64> {
        let create = format!(
            "CREATE TABLE IF NOT EXISTS {} (version BIGINT)",
            self.table
        );
        sqlx::query(&create).execute(pool).await.map_err(|e| {
            StoreError::Initialization(format!(
                "Failed to create version table {}: {}",
                self.table, e
            ))
        })?;

        let select = format!("SELECT version FROM {} LIMIT 1", self.table);
        let row = sqlx::query(&select)
            .fetch_optional(pool)
            .await
            .map_err(|e| {
                StoreError::Initialization(format!("Failed to read schema version: {}", e))
            })?;

        match row {
            Some(row) => row.try_get::<i64, _>(0).map_err(|e| {
                StoreError::Initialization(format!("Failed to decode schema version: {}", e))
            }),
            None => Ok(0),
        }
    }

    /// Replace the version row with `version` inside the caller's
    /// transaction.
    ///
    /// Implemented as clear-then-insert so the no-row and one-row cases
    /// are handled uniformly; never leaves more than one row behind.
    pub async fn set_version(
        &self,
        tx: &mut Transaction<'_, Any>,
        version: i64,
    ) -> StoreResult<()> {
        let clear = format!("DELETE FROM {}", self.table);
        sqlx::query(&clear).execute(&mut **tx).await.map_err(|e| {
            StoreError::VersionPersist(format!("Failed to clear version row: {}", e))
        })?;

        let insert = format!(
            "INSERT INTO {} (version) VALUES ({})",
            self.table,
            self.dialect.bind_marker(1)
        );
        sqlx::query(&insert)
            .bind(version)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                StoreError::VersionPersist(format!(
                    "Failed to write schema version {}: {}",
                    version, e
                ))
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::any::AnyPoolOptions;

    async fn memory_pool() -> AnyPool {
        crate::store::install_default_drivers();
        AnyPoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    fn version_store() -> VersionStore {
        VersionStore::new(&UpgradeConfig::default(), Dialect::Sqlite)
    }

    #[tokio::test]
    async fn test_version_defaults_to_zero() {
        let pool = memory_pool().await;
        let versions = version_store();

        assert_eq!(versions.get_version(&pool).await.unwrap(), 0);

        // The table now exists; a second read stays at 0 and does not error
        assert_eq!(versions.get_version(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_version_replaces_single_row() {
        let pool = memory_pool().await;
        let versions = version_store();
        versions.get_version(&pool).await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        versions.set_version(&mut tx, 3).await.unwrap();
        versions.set_version(&mut tx, 7).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(versions.get_version(&pool).await.unwrap(), 7);

        let row = sqlx::query("SELECT COUNT(*) FROM wirelink_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.try_get::<i64, _>(0).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_uncommitted_set_version_is_not_durable() {
        let pool = memory_pool().await;
        let versions = version_store();
        versions.get_version(&pool).await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        versions.set_version(&mut tx, 5).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(versions.get_version(&pool).await.unwrap(), 0);
    }
}
