//! Bulk insert, update, delete and merge against a MySQL pool
//!
//! Every call resolves its plan first (configuration errors never touch the
//! database), then runs the generated batches in order inside one
//! transaction: the caller's when one is passed, otherwise its own.

use crate::commands::{BulkOperationKind, plan_for};
use crate::config::BulkConfig;
use crate::connection::connect_pool;
use crate::dialect::{Dialect, dialect_for};
use crate::error::BulkError;
use crate::executor::{BatchSession, execute_batches};
use crate::metadata::MetadataProvider;
use crate::options::BulkOption;
use crate::record::BulkRecord;
use crate::session::MySqlSession;
use crate::types::DatabaseType;
use sqlx::{MySql, MySqlPool, Transaction};
use std::sync::Arc;

/// Bulk write entry point
///
/// ```no_run
/// # use mysql_bulk_ops::{BulkConfig, BulkOperations, BulkRecord, SqlValue};
/// # struct Product { id: i64, name: String }
/// # impl BulkRecord for Product {
/// #     fn entity_name() -> &'static str { "Product" }
/// #     fn field_value(&self, field: &str) -> Option<SqlValue> {
/// #         match field { "Id" => Some(self.id.into()), "Name" => Some(self.name.as_str().into()), _ => None }
/// #     }
/// # }
/// # async fn run() -> anyhow::Result<()> {
/// let config = BulkConfig::from_env()?;
/// let bulk = BulkOperations::connect(&config).await?;
/// let products = vec![Product { id: 1, name: "Widget".into() }];
/// let affected = bulk.bulk_merge(&products, None, None).await?;
/// # let _ = affected;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BulkOperations {
    pool: MySqlPool,
    provider: Arc<dyn MetadataProvider>,
    dialect: Arc<dyn Dialect>,
    defaults: BulkOption,
}

impl BulkOperations {
    pub fn new(pool: MySqlPool, provider: Arc<dyn MetadataProvider>) -> Self {
        Self {
            pool,
            provider,
            dialect: Arc::from(dialect_for(DatabaseType::MySQL)),
            defaults: BulkOption::default(),
        }
    }

    /// Connect a pool and load the schema registry described by `config`
    pub async fn connect(config: &BulkConfig) -> anyhow::Result<Self> {
        let registry = config.load_registry()?;
        log::info!("Loaded {} entity mapping(s)", registry.len());
        let pool = connect_pool(config).await?;
        Ok(Self {
            pool,
            provider: Arc::new(registry),
            dialect: Arc::from(dialect_for(config.database_type)),
            defaults: config.default_option(),
        })
    }

    /// Options used when a call passes none
    pub fn with_defaults(mut self, defaults: BulkOption) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Begin a transaction callers can pass to several bulk calls
    pub async fn begin_transaction(&self) -> Result<Transaction<'static, MySql>, BulkError> {
        self.pool.begin().await.map_err(BulkError::Transaction)
    }

    pub async fn bulk_insert<R: BulkRecord + Sync>(
        &self,
        items: &[R],
        option: Option<BulkOption>,
        transaction: Option<&mut Transaction<'static, MySql>>,
    ) -> Result<u64, BulkError> {
        self.run(BulkOperationKind::Insert, items, option, transaction)
            .await
    }

    pub async fn bulk_update<R: BulkRecord + Sync>(
        &self,
        items: &[R],
        option: Option<BulkOption>,
        transaction: Option<&mut Transaction<'static, MySql>>,
    ) -> Result<u64, BulkError> {
        self.run(BulkOperationKind::Update, items, option, transaction)
            .await
    }

    pub async fn bulk_delete<R: BulkRecord + Sync>(
        &self,
        items: &[R],
        option: Option<BulkOption>,
        transaction: Option<&mut Transaction<'static, MySql>>,
    ) -> Result<u64, BulkError> {
        self.run(BulkOperationKind::Delete, items, option, transaction)
            .await
    }

    /// Insert new rows and overwrite existing ones matched by unique key
    pub async fn bulk_merge<R: BulkRecord + Sync>(
        &self,
        items: &[R],
        option: Option<BulkOption>,
        transaction: Option<&mut Transaction<'static, MySql>>,
    ) -> Result<u64, BulkError> {
        self.run(BulkOperationKind::Merge, items, option, transaction)
            .await
    }

    async fn run<R: BulkRecord + Sync>(
        &self,
        kind: BulkOperationKind,
        items: &[R],
        option: Option<BulkOption>,
        transaction: Option<&mut Transaction<'static, MySql>>,
    ) -> Result<u64, BulkError> {
        match transaction {
            Some(tx) => {
                let mut session = MySqlSession::external(tx);
                self.run_in(kind, items, option, &mut session).await
            }
            None => {
                let mut session = MySqlSession::owned(self.pool.clone());
                self.run_in(kind, items, option, &mut session).await
            }
        }
    }

    /// Plan and execute one call on an arbitrary session
    pub async fn run_in<R, S>(
        &self,
        kind: BulkOperationKind,
        items: &[R],
        option: Option<BulkOption>,
        session: &mut S,
    ) -> Result<u64, BulkError>
    where
        R: BulkRecord + Sync,
        S: BatchSession,
    {
        let option = self.resolve_option(option);
        if items.is_empty() {
            log::debug!("Bulk {} of {}: nothing to do", kind, R::entity_name());
            return Ok(0);
        }

        let plan = plan_for::<R>(kind, self.provider.as_ref(), &option, self.dialect.as_ref())?;
        log::info!(
            "Bulk {} of {} item(s) into `{}` in {} batch(es)",
            kind,
            items.len(),
            plan.table(),
            plan.batch_count(items.len())
        );

        let affected = execute_batches(session, plan.batches(items), &option).await?;
        log::debug!("Bulk {} on `{}` affected {} row(s)", kind, plan.table(), affected);
        Ok(affected)
    }

    /// Caller options win; an unset timeout falls back to the default
    fn resolve_option(&self, option: Option<BulkOption>) -> BulkOption {
        match option {
            Some(mut option) => {
                if option.command_timeout.is_none() {
                    option.command_timeout = self.defaults.command_timeout;
                }
                option
            }
            None => self.defaults.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::{Product, Unmapped, registry};
    use crate::executor::TransactionOwnership;
    use crate::executor::testing::{Event, RecordingSession};
    use sqlx::mysql::MySqlPoolOptions;
    use std::time::Duration;

    fn operations() -> Option<BulkOperations> {
        let pool = MySqlPoolOptions::new()
            .connect_lazy("mysql://user@localhost:3306/bulk")
            .ok()?;
        Some(BulkOperations::new(pool, Arc::new(registry())))
    }

    fn products(count: usize) -> Vec<Product> {
        (0..count)
            .map(|i| Product::new(&format!("Test{}", i), 100.0 * i as f64))
            .collect()
    }

    #[tokio::test]
    async fn test_batches_run_in_one_owned_transaction() {
        let bulk = operations();
        assert!(bulk.is_some());
        if let Some(bulk) = bulk {
            let mut session = RecordingSession::new(TransactionOwnership::Owned);
            let option = BulkOption::new().batch_size(2);
            let result = bulk
                .run_in(BulkOperationKind::Insert, &products(5), Some(option), &mut session)
                .await;
            // Id, CreatedAt, Name, Price per row; the double reports parameters as rows
            assert_eq!(result.ok(), Some(20));
            assert_eq!(
                session.events,
                [
                    Event::Begin,
                    Event::Execute(8),
                    Event::Execute(8),
                    Event::Execute(4),
                    Event::Commit,
                    Event::Close
                ]
            );
        }
    }

    #[tokio::test]
    async fn test_configuration_error_does_no_io() {
        let bulk = operations();
        assert!(bulk.is_some());
        if let Some(bulk) = bulk {
            let mut session = RecordingSession::new(TransactionOwnership::Owned);
            let result = bulk
                .run_in(BulkOperationKind::Merge, &[Unmapped], None, &mut session)
                .await;
            assert!(result.is_err_and(|e| e.is_configuration()));
            assert!(session.events.is_empty());

            let option = BulkOption::new().unique_keys(["Nope"]);
            let result = bulk
                .run_in(BulkOperationKind::Update, &products(1), Some(option), &mut session)
                .await;
            assert!(result.is_err_and(|e| e.is_configuration()));
            assert!(session.events.is_empty());
        }
    }

    #[tokio::test]
    async fn test_empty_input_returns_zero() {
        let bulk = operations();
        assert!(bulk.is_some());
        if let Some(bulk) = bulk {
            let mut session = RecordingSession::new(TransactionOwnership::Owned);
            let items: Vec<Unmapped> = Vec::new();
            let result = bulk
                .run_in(BulkOperationKind::Delete, &items, None, &mut session)
                .await;
            assert_eq!(result.ok(), Some(0));
            assert!(session.events.is_empty());
        }
    }

    #[tokio::test]
    async fn test_failure_in_external_transaction_is_left_to_caller() {
        let bulk = operations();
        assert!(bulk.is_some());
        if let Some(bulk) = bulk {
            let mut session = RecordingSession::new(TransactionOwnership::External);
            session.fail_at = Some(1);
            let option = BulkOption::new().batch_size(1);
            let result = bulk
                .run_in(BulkOperationKind::Delete, &products(3), Some(option), &mut session)
                .await;
            assert!(matches!(result, Err(BulkError::Execution { batch: 1, .. })));
            assert_eq!(session.events, [Event::Execute(1)]);
        }
    }

    #[tokio::test]
    async fn test_default_timeout_fills_unset_option() {
        let bulk = operations();
        assert!(bulk.is_some());
        if let Some(bulk) = bulk {
            let bulk = bulk.with_defaults(
                BulkOption::new()
                    .batch_size(7)
                    .command_timeout(Duration::from_secs(9)),
            );
            let resolved = bulk.resolve_option(Some(BulkOption::new().batch_size(3)));
            assert_eq!(resolved.batch_size, 3);
            assert_eq!(resolved.command_timeout, Some(Duration::from_secs(9)));
            let resolved = bulk.resolve_option(None);
            assert_eq!(resolved.batch_size, 7);
        }
    }
}
