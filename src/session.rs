//! MySQL [`BatchSession`] over a pool or a caller's transaction

use crate::error::BulkError;
use crate::executor::{BatchSession, TransactionOwnership};
use crate::types::{SqlParameter, SqlValue};
use async_trait::async_trait;
use sqlx::mysql::{MySqlArguments, MySqlConnection};
use sqlx::query::Query;
use sqlx::{MySql, MySqlPool, Transaction};

type MySqlQuery<'q> = Query<'q, MySql, MySqlArguments>;

enum Connection<'t> {
    Owned {
        pool: MySqlPool,
        transaction: Option<Transaction<'static, MySql>>,
    },
    External(&'t mut Transaction<'static, MySql>),
}

/// Statement runner for one bulk call
pub struct MySqlSession<'t> {
    connection: Connection<'t>,
}

impl MySqlSession<'static> {
    /// Session that acquires its own connection and transaction from `pool`
    pub fn owned(pool: MySqlPool) -> Self {
        Self {
            connection: Connection::Owned {
                pool,
                transaction: None,
            },
        }
    }
}

impl<'t> MySqlSession<'t> {
    /// Session that runs inside the caller's transaction
    pub fn external(transaction: &'t mut Transaction<'static, MySql>) -> Self {
        Self {
            connection: Connection::External(transaction),
        }
    }

    fn active(&mut self) -> Result<&mut MySqlConnection, sqlx::Error> {
        match &mut self.connection {
            Connection::Owned {
                transaction: Some(tx),
                ..
            } => Ok(&mut **tx),
            Connection::Owned {
                transaction: None, ..
            } => Err(sqlx::Error::Protocol(
                "no active transaction for bulk batch".to_string(),
            )),
            Connection::External(tx) => Ok(&mut ***tx),
        }
    }
}

fn caller_owned() -> BulkError {
    BulkError::config("transaction is owned by the caller")
}

#[async_trait]
impl<'t> BatchSession for MySqlSession<'t> {
    fn ownership(&self) -> TransactionOwnership {
        match self.connection {
            Connection::Owned { .. } => TransactionOwnership::Owned,
            Connection::External(_) => TransactionOwnership::External,
        }
    }

    async fn begin(&mut self) -> Result<(), BulkError> {
        match &mut self.connection {
            Connection::Owned { pool, transaction } => {
                let tx = pool.begin().await.map_err(BulkError::Transaction)?;
                *transaction = Some(tx);
                Ok(())
            }
            Connection::External(_) => Err(caller_owned()),
        }
    }

    async fn execute(&mut self, sql: &str, parameters: &[SqlParameter]) -> Result<u64, sqlx::Error> {
        let query = parameters
            .iter()
            .fold(sqlx::query(sql), |query, p| bind_value(query, &p.value));
        let conn = self.active()?;
        let result = query.execute(conn).await?;
        Ok(result.rows_affected())
    }

    async fn commit(&mut self) -> Result<(), BulkError> {
        match &mut self.connection {
            Connection::Owned { transaction, .. } => match transaction.take() {
                Some(tx) => tx.commit().await.map_err(BulkError::Transaction),
                None => Ok(()),
            },
            Connection::External(_) => Err(caller_owned()),
        }
    }

    async fn rollback(&mut self) -> Result<(), BulkError> {
        match &mut self.connection {
            Connection::Owned { transaction, .. } => match transaction.take() {
                Some(tx) => tx.rollback().await.map_err(BulkError::Transaction),
                None => Ok(()),
            },
            Connection::External(_) => Err(caller_owned()),
        }
    }

    async fn close(&mut self) {
        // Dropping an unfinished transaction rolls it back and returns the
        // connection to the pool.
        if let Connection::Owned { transaction, .. } = &mut self.connection {
            transaction.take();
        }
    }
}

/// Bind one parameter value positionally
fn bind_value<'q>(query: MySqlQuery<'q>, value: &'q SqlValue) -> MySqlQuery<'q> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::UInt(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.as_str()),
        SqlValue::Bytes(v) => query.bind(v.as_slice()),
        SqlValue::Json(v) => query.bind(sqlx::types::Json(v)),
        SqlValue::DateTime(v) => query.bind(*v),
        SqlValue::Date(v) => query.bind(*v),
        SqlValue::Time(v) => query.bind(*v),
    }
}
