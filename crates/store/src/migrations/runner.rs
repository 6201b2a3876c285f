//! Upgrade runner
//!
//! Drives the version store and migration registry to bring the schema to
//! the latest known version: one transaction per pending step, with the
//! version bump committed atomically alongside the step's schema change.

use sqlx::AnyPool;
use tracing::{debug, info, warn};

use crate::dialect::Dialect;
use crate::error::{StoreError, StoreResult};
use crate::migrations::registry::MigrationRegistry;
use crate::migrations::step::StepContext;
use crate::migrations::version::{UpgradeConfig, VersionStore};

/// Applies pending migration steps in registry order
pub struct UpgradeRunner<'a> {
    pool: &'a AnyPool,
    ctx: StepContext,
    versions: VersionStore,
    registry: &'a MigrationRegistry,
}

impl<'a> UpgradeRunner<'a> {
    pub fn new(
        pool: &'a AnyPool,
        dialect: Dialect,
        config: &UpgradeConfig,
        registry: &'a MigrationRegistry,
    ) -> Self {
        Self {
            pool,
            ctx: StepContext { dialect },
            versions: VersionStore::new(config, dialect),
            registry,
        }
    }

    /// Apply every pending step, in order, exactly once each.
    ///
    /// The version row is the only durable progress marker and advances
    /// only on a successful commit, so a failed run leaves the schema at
    /// its last completed version and a re-invocation resumes at exactly
    /// the failed step. Any error aborts the whole call after rolling
    /// back the in-flight transaction.
    pub async fn upgrade(&self) -> StoreResult<()> {
        let mut version = self.versions.get_version(self.pool).await?;
        if version < 0 {
            return Err(StoreError::Initialization(format!(
                "Version table holds negative version {}",
                version
            )));
        }

        while (version as usize) < self.registry.len() {
            let index = version as usize;
            let step = &self.registry.steps()[index];

            let mut tx = self.pool.begin().await.map_err(|e| {
                StoreError::Transaction(format!("Failed to begin transaction: {}", e))
            })?;

            info!("Upgrading schema to v{}: {}", version + 1, step.describe());

            if let Err(e) = step.apply(&mut tx, &self.ctx).await {
                warn!("Migration step {} failed, rolling back: {}", index, e);
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback after failed step also failed: {}", rollback_err);
                }
                return Err(StoreError::Step {
                    index,
                    source: Box::new(e),
                });
            }

            if let Err(e) = self.versions.set_version(&mut tx, version + 1).await {
                warn!(
                    "Failed to persist version {} after step {}, rolling back: {}",
                    version + 1,
                    index,
                    e
                );
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback after failed version write also failed: {}", rollback_err);
                }
                return Err(e);
            }

            tx.commit().await.map_err(|e| {
                StoreError::Transaction(format!(
                    "Failed to commit schema version {}: {}",
                    version + 1,
                    e
                ))
            })?;

            debug!("Schema upgraded to v{}", version + 1);
            version += 1;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use sqlx::any::AnyPoolOptions;
    use sqlx::{Any, AnyPool, Transaction};

    use super::*;
    use crate::migrations::step::{exec, MigrationStep, StepContext};

    struct CreateTable(&'static str);

    #[async_trait]
    impl MigrationStep for CreateTable {
        fn describe(&self) -> &'static str {
            "create a test table"
        }

        async fn apply(
            &self,
            tx: &mut Transaction<'_, Any>,
            _ctx: &StepContext,
        ) -> StoreResult<()> {
            exec(tx, &format!("CREATE TABLE {} (id BIGINT)", self.0)).await
        }
    }

    /// Creates a table and then fails, so the table must not survive.
    struct AlwaysFails;

    #[async_trait]
    impl MigrationStep for AlwaysFails {
        fn describe(&self) -> &'static str {
            "always fails"
        }

        async fn apply(
            &self,
            tx: &mut Transaction<'_, Any>,
            _ctx: &StepContext,
        ) -> StoreResult<()> {
            exec(tx, "CREATE TABLE half_done (id BIGINT)").await?;
            exec(tx, "THIS IS NOT VALID SQL").await
        }
    }

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl MigrationStep for Counting {
        fn describe(&self) -> &'static str {
            "count invocations"
        }

        async fn apply(
            &self,
            _tx: &mut Transaction<'_, Any>,
            _ctx: &StepContext,
        ) -> StoreResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn memory_pool() -> AnyPool {
        crate::store::install_default_drivers();
        AnyPoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    async fn table_exists(pool: &AnyPool, name: &str) -> bool {
        sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await
            .unwrap()
            .is_some()
    }

    fn runner<'a>(pool: &'a AnyPool, registry: &'a MigrationRegistry) -> UpgradeRunner<'a> {
        UpgradeRunner::new(pool, Dialect::Sqlite, &UpgradeConfig::default(), registry)
    }

    async fn current_version(pool: &AnyPool) -> i64 {
        VersionStore::new(&UpgradeConfig::default(), Dialect::Sqlite)
            .get_version(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_fresh_store_upgrades_to_registry_length() {
        let pool = memory_pool().await;
        let mut registry = MigrationRegistry::new();
        registry.push(CreateTable("t1"));
        registry.push(CreateTable("t2"));
        registry.push(CreateTable("t3"));

        runner(&pool, &registry).upgrade().await.unwrap();

        assert_eq!(current_version(&pool).await, 3);
        assert!(table_exists(&pool, "t1").await);
        assert!(table_exists(&pool, "t2").await);
        assert!(table_exists(&pool, "t3").await);
    }

    #[tokio::test]
    async fn test_empty_registry_is_a_noop() {
        let pool = memory_pool().await;
        let registry = MigrationRegistry::new();

        runner(&pool, &registry).upgrade().await.unwrap();
        assert_eq!(current_version(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_failing_step_keeps_version_and_rolls_back() {
        let pool = memory_pool().await;
        let mut registry = MigrationRegistry::new();
        registry.push(CreateTable("t1"));
        registry.push(AlwaysFails);

        let err = runner(&pool, &registry).upgrade().await.unwrap_err();
        match err {
            StoreError::Step { index, .. } => assert_eq!(index, 1),
            other => panic!("expected step error, got {:?}", other),
        }

        // Step 0 committed, step 1's partial effect rolled back
        assert_eq!(current_version(&pool).await, 1);
        assert!(table_exists(&pool, "t1").await);
        assert!(!table_exists(&pool, "half_done").await);

        // Re-invoking retries from exactly the failed step and fails the
        // same way, leaving the version untouched
        let err = runner(&pool, &registry).upgrade().await.unwrap_err();
        match err {
            StoreError::Step { index, .. } => assert_eq!(index, 1),
            other => panic!("expected step error, got {:?}", other),
        }
        assert_eq!(current_version(&pool).await, 1);
        assert!(!table_exists(&pool, "half_done").await);
    }

    #[tokio::test]
    async fn test_second_upgrade_invokes_no_steps() {
        let pool = memory_pool().await;
        let counter = Arc::new(AtomicUsize::new(0));

        let mut registry = MigrationRegistry::new();
        registry.push(Counting(counter.clone()));
        registry.push(Counting(counter.clone()));

        runner(&pool, &registry).upgrade().await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(current_version(&pool).await, 2);

        runner(&pool, &registry).upgrade().await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(current_version(&pool).await, 2);
    }

    #[tokio::test]
    async fn test_negative_version_is_rejected() {
        let pool = memory_pool().await;

        // Corrupt the version table with a value the engine never writes
        current_version(&pool).await;
        sqlx::query("INSERT INTO wirelink_version (version) VALUES (-1)")
            .execute(&pool)
            .await
            .unwrap();

        let mut registry = MigrationRegistry::new();
        registry.push(CreateTable("t1"));

        let err = runner(&pool, &registry).upgrade().await.unwrap_err();
        assert!(matches!(err, StoreError::Initialization(_)));
        assert!(!table_exists(&pool, "t1").await);
    }

    #[tokio::test]
    async fn test_resume_after_appending_steps() {
        let pool = memory_pool().await;

        let mut registry = MigrationRegistry::new();
        registry.push(CreateTable("t1"));
        runner(&pool, &registry).upgrade().await.unwrap();
        assert_eq!(current_version(&pool).await, 1);

        // A later release appends a step; only the new one runs
        registry.push(CreateTable("t2"));
        runner(&pool, &registry).upgrade().await.unwrap();
        assert_eq!(current_version(&pool).await, 2);
        assert!(table_exists(&pool, "t2").await);
    }
}
