//! Bulk delete: `DELETE tb FROM target AS tb INNER JOIN (derived) AS tmp ON <keys>`

use super::{BatchPlan, BulkOperationKind, join_key_columns, join_predicate};
use crate::dialect::Dialect;
use crate::error::BulkError;
use crate::metadata::EntityInfo;
use crate::options::BulkOption;

/// Only the join-key columns are carried
pub fn plan_delete<'a>(
    info: &'a EntityInfo,
    option: &BulkOption,
    dialect: &'a dyn Dialect,
) -> Result<BatchPlan<'a>, BulkError> {
    let keys = join_key_columns(info, option)?;

    let prefix = format!(
        "DELETE tb\nFROM {} AS tb\nINNER JOIN ",
        dialect.quote_ident(&info.table)
    );
    let suffix = join_predicate(&keys, dialect);

    Ok(BatchPlan::new(
        BulkOperationKind::Delete,
        info,
        keys,
        prefix,
        suffix,
        option,
        dialect,
    ))
}
