//! Type definitions for bulk operations

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Storage-side value bound to a statement parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

macro_rules! sql_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for SqlValue {
                fn from(v: $ty) -> Self {
                    Self::$variant(v.into())
                }
            }
        )*
    };
}

sql_value_from! {
    bool => Bool,
    i8 => Int,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => UInt,
    u16 => UInt,
    u32 => UInt,
    u64 => UInt,
    f32 => Float,
    f64 => Float,
    String => Text,
    &str => Text,
    Vec<u8> => Bytes,
    serde_json::Value => Json,
    NaiveDateTime => DateTime,
    NaiveDate => Date,
    NaiveTime => Time,
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Named statement parameter
///
/// Names are unique within one batch; the dialect decides how a name is
/// rendered as a placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParameter {
    pub name: String,
    pub value: SqlValue,
}

impl SqlParameter {
    pub fn new(name: impl Into<String>, value: SqlValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// One generated statement and its parameters
///
/// The SQL text is fixed at construction. `affected_rows` stays `None` until
/// the executor has run the batch.
#[derive(Debug, Clone)]
pub struct BatchData {
    sql: String,
    parameters: Vec<SqlParameter>,
    row_count: usize,
    affected_rows: Option<u64>,
}

impl BatchData {
    pub(crate) fn new(sql: String, parameters: Vec<SqlParameter>, row_count: usize) -> Self {
        Self {
            sql,
            parameters,
            row_count,
            affected_rows: None,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameters(&self) -> &[SqlParameter] {
        &self.parameters
    }

    /// Number of input items rendered into this batch
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn affected_rows(&self) -> Option<u64> {
        self.affected_rows
    }

    pub(crate) fn set_affected_rows(&mut self, rows: u64) {
        self.affected_rows = Some(rows);
    }
}

/// Database family for SQL dialect-specific handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseType {
    MySQL,
    MariaDB,
}

impl DatabaseType {
    /// Detect database type from connection URL scheme
    ///
    /// # Examples
    /// ```
    /// # use mysql_bulk_ops::types::DatabaseType;
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let db = DatabaseType::from_url("mysql://localhost/shop")?;
    /// assert_eq!(db, DatabaseType::MySQL);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_url(url: &str) -> Result<Self, crate::error::BulkError> {
        if url.starts_with("mysql://") {
            Ok(Self::MySQL)
        } else if url.starts_with("mariadb://") {
            Ok(Self::MariaDB)
        } else {
            Err(crate::error::BulkError::Configuration(format!(
                "Cannot determine a MySQL-family database from URL scheme: {}",
                url.split("://").next().unwrap_or_default()
            )))
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MySQL => write!(f, "MySQL"),
            Self::MariaDB => write!(f, "MariaDB"),
        }
    }
}
