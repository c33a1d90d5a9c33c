//! Sequential batch execution inside one transaction
//!
//! The executor drives a [`BatchSession`] through
//! `NoTransaction -> Active -> Committed | RolledBack`. Whether it may commit,
//! roll back and close is decided by the session's [`TransactionOwnership`]
//! alone: an external transaction is joined, used, and handed back untouched.

use crate::error::BulkError;
use crate::options::BulkOption;
use crate::types::{BatchData, SqlParameter};
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Who controls the transaction the batches run in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOwnership {
    /// Begun, committed or rolled back, and released by the executor
    Owned,
    /// Supplied by the caller; never committed, rolled back or closed here
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    NoTransaction,
    Active,
    Committed,
    RolledBack,
}

/// Connection-side primitives the executor needs
///
/// `begin`, `commit`, `rollback` and `close` are only called for
/// [`TransactionOwnership::Owned`] sessions.
#[async_trait]
pub trait BatchSession: Send {
    fn ownership(&self) -> TransactionOwnership;

    /// Acquire a connection if none is held and begin a transaction
    async fn begin(&mut self) -> Result<(), BulkError>;

    /// Run one statement, returning rows affected
    async fn execute(&mut self, sql: &str, parameters: &[SqlParameter]) -> Result<u64, sqlx::Error>;

    async fn commit(&mut self) -> Result<(), BulkError>;

    async fn rollback(&mut self) -> Result<(), BulkError>;

    /// Release the transaction and connection acquired by `begin`
    async fn close(&mut self);
}

/// Runs generated batches in order against one session
pub struct BatchExecutor<'s, S: BatchSession> {
    session: &'s mut S,
    ownership: TransactionOwnership,
    state: TransactionState,
    command_timeout: Option<Duration>,
    cancellation: Option<CancellationToken>,
    affected: Vec<u64>,
}

impl<'s, S: BatchSession> BatchExecutor<'s, S> {
    pub fn new(session: &'s mut S) -> Self {
        let ownership = session.ownership();
        Self {
            session,
            ownership,
            state: TransactionState::NoTransaction,
            command_timeout: None,
            cancellation: None,
            affected: Vec::new(),
        }
    }

    /// Take timeout and cancellation from call options
    pub fn with_option(mut self, option: &BulkOption) -> Self {
        self.command_timeout = option.command_timeout;
        self.cancellation = option.cancellation.clone();
        self
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Batches that completed successfully
    pub fn executed(&self) -> usize {
        self.affected.len()
    }

    /// Affected rows of each completed batch, in execution order
    pub fn affected_rows(&self) -> &[u64] {
        &self.affected
    }

    /// Execute every batch and return the summed affected-row count
    ///
    /// On any error the owned transaction is rolled back and the error is
    /// returned; no batch after the failing one runs. An owned session is
    /// closed on every path.
    pub async fn run<I>(&mut self, batches: I) -> Result<u64, BulkError>
    where
        I: IntoIterator<Item = BatchData>,
        I::IntoIter: Send,
    {
        let owned = self.ownership == TransactionOwnership::Owned;
        let result = self.run_batches(batches.into_iter()).await;

        if let Err(err) = &result
            && owned
            && self.state == TransactionState::Active
        {
            log::warn!(
                "Rolling back bulk transaction after {} batch(es): {}",
                self.executed(),
                err
            );
            match self.session.rollback().await {
                Ok(()) => self.state = TransactionState::RolledBack,
                Err(rollback_err) => log::warn!("Rollback failed: {}", rollback_err),
            }
        }

        if owned {
            self.session.close().await;
        }
        result
    }

    async fn run_batches<I>(&mut self, batches: I) -> Result<u64, BulkError>
    where
        I: Iterator<Item = BatchData> + Send,
    {
        self.check_cancelled()?;
        if self.ownership == TransactionOwnership::Owned {
            self.session.begin().await?;
        }
        self.state = TransactionState::Active;

        let mut total = 0u64;
        for (index, mut batch) in batches.enumerate() {
            self.check_cancelled()?;
            let rows = self.execute_batch(index, &batch).await?;
            batch.set_affected_rows(rows);
            self.affected.push(rows);
            total += rows;
            log::debug!(
                "Batch {} ({} row(s), {} parameter(s)) affected {} row(s)",
                index,
                batch.row_count(),
                batch.parameters().len(),
                batch.affected_rows().unwrap_or_default()
            );
        }

        self.check_cancelled()?;
        if self.ownership == TransactionOwnership::Owned {
            self.session.commit().await?;
            self.state = TransactionState::Committed;
        }
        Ok(total)
    }

    async fn execute_batch(&mut self, index: usize, batch: &BatchData) -> Result<u64, BulkError> {
        let outcome = match self.command_timeout {
            Some(timeout) => {
                match tokio::time::timeout(
                    timeout,
                    self.session.execute(batch.sql(), batch.parameters()),
                )
                .await
                {
                    Ok(outcome) => outcome,
                    Err(_elapsed) => {
                        return Err(BulkError::Timeout {
                            batch: index,
                            timeout,
                        });
                    }
                }
            }
            None => self.session.execute(batch.sql(), batch.parameters()).await,
        };
        outcome.map_err(|source| BulkError::Execution {
            batch: index,
            source,
        })
    }

    fn check_cancelled(&self) -> Result<(), BulkError> {
        match &self.cancellation {
            Some(token) if token.is_cancelled() => {
                log::warn!("Bulk operation cancelled after {} batch(es)", self.executed());
                Err(BulkError::Cancelled)
            }
            _ => Ok(()),
        }
    }
}

/// Run `batches` on `session` with the timeout and cancellation of `option`
pub async fn execute_batches<S, I>(
    session: &mut S,
    batches: I,
    option: &BulkOption,
) -> Result<u64, BulkError>
where
    S: BatchSession,
    I: IntoIterator<Item = BatchData>,
    I::IntoIter: Send,
{
    BatchExecutor::new(session).with_option(option).run(batches).await
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory session recording every primitive it is asked to perform

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Event {
        Begin,
        Execute(usize),
        Commit,
        Rollback,
        Close,
    }

    pub struct RecordingSession {
        pub ownership: TransactionOwnership,
        pub events: Vec<Event>,
        pub fail_at: Option<usize>,
        pub cancel_at: Option<(usize, CancellationToken)>,
        pub delay: Option<Duration>,
        executed: usize,
    }

    impl RecordingSession {
        pub fn new(ownership: TransactionOwnership) -> Self {
            Self {
                ownership,
                events: Vec::new(),
                fail_at: None,
                cancel_at: None,
                delay: None,
                executed: 0,
            }
        }

        pub fn executed_statements(&self) -> usize {
            self.events
                .iter()
                .filter(|e| matches!(e, Event::Execute(_)))
                .count()
        }
    }

    #[async_trait]
    impl BatchSession for RecordingSession {
        fn ownership(&self) -> TransactionOwnership {
            self.ownership
        }

        async fn begin(&mut self) -> Result<(), BulkError> {
            self.events.push(Event::Begin);
            Ok(())
        }

        async fn execute(
            &mut self,
            _sql: &str,
            parameters: &[SqlParameter],
        ) -> Result<u64, sqlx::Error> {
            let index = self.executed;
            self.executed += 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_at == Some(index) {
                return Err(sqlx::Error::Protocol(format!(
                    "Duplicate entry in batch {}",
                    index
                )));
            }
            self.events.push(Event::Execute(parameters.len()));
            if let Some((at, token)) = &self.cancel_at
                && *at == index
            {
                token.cancel();
            }
            Ok(parameters.len() as u64)
        }

        async fn commit(&mut self) -> Result<(), BulkError> {
            self.events.push(Event::Commit);
            Ok(())
        }

        async fn rollback(&mut self) -> Result<(), BulkError> {
            self.events.push(Event::Rollback);
            Ok(())
        }

        async fn close(&mut self) {
            self.events.push(Event::Close);
        }
    }

    pub fn batch(parameters: usize) -> BatchData {
        let parameters = (0..parameters)
            .map(|i| SqlParameter::new(format!("@p0_{}", i), crate::types::SqlValue::Int(i as i64)))
            .collect();
        BatchData::new("SELECT 1".to_string(), parameters, 1)
    }
}
