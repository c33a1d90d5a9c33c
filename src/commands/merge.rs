//! Bulk merge: `INSERT .. SELECT .. FROM (derived) AS tmp ON DUPLICATE KEY UPDATE ..`

use super::{BatchPlan, BulkOperationKind, DERIVED_ALIAS, quoted_list, writable_columns};
use crate::dialect::Dialect;
use crate::error::BulkError;
use crate::metadata::{ColumnInfo, EntityInfo};
use crate::options::BulkOption;

/// Insert columns: mapped minus generated and `skip_insert`, minus
/// `ignore_on_insert`. Update columns: mapped minus primary keys, unique
/// index members, generated and `skip_update`, minus `ignore_on_update`. The derived table carries the
/// insert columns followed by any update column not already present.
///
/// With no update column left the statement degrades to `INSERT IGNORE`,
/// leaving conflicting rows untouched.
pub fn plan_merge<'a>(
    info: &'a EntityInfo,
    option: &BulkOption,
    dialect: &'a dyn Dialect,
) -> Result<BatchPlan<'a>, BulkError> {
    let insert_columns = writable_columns(info, &option.ignore_on_insert, "ignore_on_insert", |c| {
        c.excluded_from_insert()
    })?;
    let update_columns = writable_columns(info, &option.ignore_on_update, "ignore_on_update", |c| {
        c.primary_key || c.unique_index || c.excluded_from_update()
    })?;
    if insert_columns.is_empty() {
        return Err(BulkError::config(format!(
            "No insertable columns for table '{}'",
            info.table
        )));
    }

    let mut derived: Vec<&ColumnInfo> = insert_columns.clone();
    for column in update_columns.iter().copied() {
        if !derived.iter().any(|c| c.name == column.name) {
            derived.push(column);
        }
    }

    let table = dialect.quote_ident(&info.table);
    let list = quoted_list(&insert_columns, dialect);
    let insert = if update_columns.is_empty() {
        dialect.insert_ignore()
    } else {
        "INSERT"
    };
    let prefix = format!("{} INTO {}\n({})\nSELECT {}\nFROM ", insert, table, list, list);

    let suffix = if update_columns.is_empty() {
        String::new()
    } else {
        let assignments: Vec<(String, String)> = update_columns
            .iter()
            .map(|c| {
                let quoted = dialect.quote_ident(&c.name);
                (
                    format!("{}.{}", table, quoted),
                    format!("{}.{}", DERIVED_ALIAS, quoted),
                )
            })
            .collect();
        dialect.upsert_clause(&assignments)
    };

    Ok(BatchPlan::new(
        BulkOperationKind::Merge,
        info,
        derived,
        prefix,
        suffix,
        option,
        dialect,
    ))
}
