//! Migration step capability trait

use async_trait::async_trait;
use sqlx::{Any, Transaction};

use crate::dialect::Dialect;
use crate::error::StoreResult;

/// Store-level context available to migration steps
#[derive(Debug, Clone, Copy)]
pub struct StepContext {
    /// The SQL variant spoken by the underlying engine
    pub dialect: Dialect,
}

/// One atomic, ordered unit of schema change
///
/// Step `i` in a registry is only ever invoked while the persisted schema
/// version equals `i`; a successful invocation advances the version to
/// `i + 1` inside the same transaction. Implementations that branch on
/// dialect select from a closed set of SQL templates via exhaustive match
/// and fail closed on a dialect they cannot serve.
#[async_trait]
pub trait MigrationStep: Send + Sync {
    /// Short human-readable description, used for logging.
    fn describe(&self) -> &'static str;

    /// Apply the schema change inside the supplied transaction.
    async fn apply(&self, tx: &mut Transaction<'_, Any>, ctx: &StepContext) -> StoreResult<()>;
}

/// Execute a single SQL statement inside the transaction.
///
/// The Any driver prepares one statement per call, so multi-statement work
/// is expressed as sequential calls rather than batched text.
pub async fn exec(tx: &mut Transaction<'_, Any>, sql: &str) -> StoreResult<()> {
    sqlx::query(sql).execute(&mut **tx).await?;
    Ok(())
}
