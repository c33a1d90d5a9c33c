//! How in-memory items expose their field values

use crate::types::SqlValue;

/// An in-memory record that can be written in bulk.
///
/// `entity_name` is the key the metadata provider resolves the table schema
/// under. `field_value` looks a value up by field reference name (the
/// `field` of a [`ColumnInfo`](crate::metadata::ColumnInfo)); returning
/// `None` binds SQL NULL.
///
/// ```
/// use mysql_bulk_ops::{BulkRecord, SqlValue};
///
/// struct Product {
///     id: i64,
///     sku: String,
///     price: Option<f64>,
/// }
///
/// impl BulkRecord for Product {
///     fn entity_name() -> &'static str {
///         "Product"
///     }
///
///     fn field_value(&self, field: &str) -> Option<SqlValue> {
///         match field {
///             "Id" => Some(self.id.into()),
///             "Sku" => Some(self.sku.as_str().into()),
///             "Price" => Some(self.price.into()),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait BulkRecord {
    fn entity_name() -> &'static str
    where
        Self: Sized;

    fn field_value(&self, field: &str) -> Option<SqlValue>;
}

impl<R: BulkRecord> BulkRecord for &R {
    fn entity_name() -> &'static str {
        R::entity_name()
    }

    fn field_value(&self, field: &str) -> Option<SqlValue> {
        (**self).field_value(field)
    }
}
