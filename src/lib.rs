//! Batched bulk writes for MySQL-family tables
//!
//! Turns an in-memory collection of records into multi-row parameterized
//! `INSERT`, `UPDATE`, `DELETE` and upsert statements, one per batch, and
//! runs them in order inside a single transaction.

pub mod error;
pub mod types;

pub mod dialect;
pub mod metadata;
pub mod options;
pub mod record;
pub mod splitter;

pub mod commands;
pub mod executor;
pub mod session;

pub mod bulk;
pub mod config;
pub mod connection;
pub mod dsn;

// Re-export secrecy types for consumers
pub use secrecy::{ExposeSecret, SecretString};

// Re-exports
pub use bulk::BulkOperations;
pub use commands::{BatchPlan, BulkOperationKind, generate_batches, plan_for};
pub use config::BulkConfig;
pub use connection::{connect_pool, warmup_pool};
pub use dialect::{Dialect, MySqlDialect, dialect_for};
pub use dsn::{DSNInfo, parse_dsn, safe_dsn, validate_dsn};
pub use error::BulkError;
pub use executor::{
    BatchExecutor, BatchSession, TransactionOwnership, TransactionState, execute_batches,
};
pub use metadata::{ColumnInfo, EntityInfo, EntityRegistry, MetadataProvider, ValueConverter};
pub use options::{BulkOption, DEFAULT_BATCH_SIZE, FieldSet};
pub use record::BulkRecord;
pub use session::MySqlSession;
pub use splitter::{chunk_count, chunk_split};
pub use types::{BatchData, DatabaseType, SqlParameter, SqlValue};
pub use tokio_util::sync::CancellationToken;
