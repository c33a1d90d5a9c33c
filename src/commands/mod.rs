//! Statement generation for bulk insert, update, delete and merge
//!
//! Each operation resolves its column sets once per call into a
//! [`BatchPlan`]; the plan then renders one parameterized statement per
//! chunk of input, lazily, as the executor asks for it. All configuration
//! errors surface while building the plan, before any batch exists.

mod delete;
mod derived_table;
mod insert;
mod merge;
mod update;

pub use delete::plan_delete;
pub use derived_table::{
    DERIVED_ALIAS, DerivedTable, ROW_NUMBER_COLUMN, build_derived_table, parameter_name,
};
pub use insert::plan_insert;
pub use merge::plan_merge;
pub use update::plan_update;

use crate::dialect::Dialect;
use crate::error::BulkError;
use crate::metadata::{ColumnInfo, EntityInfo, MetadataProvider, resolve_entity};
use crate::options::{BulkOption, selected_fields};
use crate::record::BulkRecord;
use crate::splitter::{chunk_count, chunk_split};
use crate::types::BatchData;

/// Kind of bulk write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulkOperationKind {
    Insert,
    Update,
    Delete,
    Merge,
}

impl std::fmt::Display for BulkOperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Insert => write!(f, "insert"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::Merge => write!(f, "merge"),
        }
    }
}

/// Resolved statement template for one call
///
/// Every batch is `prefix + derived table + suffix`; only the derived table
/// differs between chunks.
pub struct BatchPlan<'a> {
    kind: BulkOperationKind,
    table: &'a str,
    columns: Vec<&'a ColumnInfo>,
    prefix: String,
    suffix: String,
    batch_size: usize,
    dialect: &'a dyn Dialect,
}

impl<'a> BatchPlan<'a> {
    pub(crate) fn new(
        kind: BulkOperationKind,
        info: &'a EntityInfo,
        columns: Vec<&'a ColumnInfo>,
        prefix: String,
        suffix: String,
        option: &BulkOption,
        dialect: &'a dyn Dialect,
    ) -> Self {
        log::debug!(
            "Planned bulk {} on `{}` over {} column(s)",
            kind,
            info.table,
            columns.len()
        );
        Self {
            kind,
            table: &info.table,
            columns,
            prefix,
            suffix,
            batch_size: option.batch_size,
            dialect,
        }
    }

    pub fn kind(&self) -> BulkOperationKind {
        self.kind
    }

    pub fn table(&self) -> &str {
        self.table
    }

    /// Storage names of the derived-table columns, in order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn batch_count(&self, items: usize) -> usize {
        chunk_count(items, self.batch_size)
    }

    /// One batch per chunk of `items`, rendered on demand
    pub fn batches<'r, R: BulkRecord>(
        &'r self,
        items: &'r [R],
    ) -> impl Iterator<Item = BatchData> + 'r {
        chunk_split(items, self.batch_size).map(move |rows| {
            let table = build_derived_table(&self.columns, rows, self.dialect);
            let mut sql =
                String::with_capacity(self.prefix.len() + table.sql.len() + self.suffix.len());
            sql.push_str(&self.prefix);
            sql.push_str(&table.sql);
            sql.push_str(&self.suffix);
            BatchData::new(sql, table.parameters, rows.len())
        })
    }
}

/// Build the plan for `kind` against the entity `R` resolves to
pub fn plan_for<'a, R: BulkRecord>(
    kind: BulkOperationKind,
    provider: &'a dyn MetadataProvider,
    option: &BulkOption,
    dialect: &'a dyn Dialect,
) -> Result<BatchPlan<'a>, BulkError> {
    option.validate()?;
    let info = resolve_entity::<R>(provider)?;
    match kind {
        BulkOperationKind::Insert => plan_insert(info, option, dialect),
        BulkOperationKind::Update => plan_update(info, option, dialect),
        BulkOperationKind::Delete => plan_delete(info, option, dialect),
        BulkOperationKind::Merge => plan_merge(info, option, dialect),
    }
}

/// Generate every batch for `items` eagerly
///
/// Empty input yields no batches and never consults the provider. An
/// unmapped entity or invalid option fails before any batch is produced.
pub fn generate_batches<R: BulkRecord>(
    kind: BulkOperationKind,
    provider: &dyn MetadataProvider,
    items: &[R],
    option: &BulkOption,
    dialect: &dyn Dialect,
) -> Result<Vec<BatchData>, BulkError> {
    if items.is_empty() {
        return Ok(Vec::new());
    }
    let plan = plan_for::<R>(kind, provider, option, dialect)?;
    Ok(plan.batches(items).collect())
}

/// Columns of `info` minus the skip flag and ignored fields of one side
pub(crate) fn writable_columns<'a>(
    info: &'a EntityInfo,
    ignored: &crate::options::FieldSet,
    purpose: &str,
    skip: impl Fn(&ColumnInfo) -> bool,
) -> Result<Vec<&'a ColumnInfo>, BulkError> {
    let ignored = selected_fields(Some(ignored), info, purpose)?;
    Ok(info
        .columns
        .iter()
        .filter(|c| !skip(*c) && !ignored.contains(c.field.as_str()))
        .collect())
}

/// Join key: the `unique_keys` override if present, else `unique_index` columns
pub(crate) fn join_key_columns<'a>(
    info: &'a EntityInfo,
    option: &BulkOption,
) -> Result<Vec<&'a ColumnInfo>, BulkError> {
    let keys: Vec<&ColumnInfo> = match option.unique_keys.as_ref() {
        Some(set) => {
            let fields = selected_fields(Some(set), info, "unique_keys")?;
            info.columns
                .iter()
                .filter(|c| fields.contains(c.field.as_str()))
                .collect()
        }
        None => info.columns.iter().filter(|c| c.unique_index).collect(),
    };

    if keys.is_empty() {
        return Err(BulkError::config(format!(
            "No join key for table '{}': flag unique_index columns or set unique_keys",
            info.table
        )));
    }
    Ok(keys)
}

/// `ON tb.k1 = tmp.k1\nAND tb.k2 = tmp.k2\n`
pub(crate) fn join_predicate(keys: &[&ColumnInfo], dialect: &dyn Dialect) -> String {
    let mut sql = String::new();
    for (index, key) in keys.iter().enumerate() {
        let quoted = dialect.quote_ident(&key.name);
        sql.push_str(if index == 0 { "ON " } else { "AND " });
        sql.push_str(&format!(
            "tb.{} = {}.{}\n",
            quoted, DERIVED_ALIAS, quoted
        ));
    }
    sql
}

pub(crate) fn quoted_list(columns: &[&ColumnInfo], dialect: &dyn Dialect) -> String {
    columns
        .iter()
        .map(|c| dialect.quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}
