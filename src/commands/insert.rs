//! Bulk insert: `INSERT INTO .. SELECT .. FROM (derived) AS tmp ORDER BY zRowNo`

use super::{BatchPlan, BulkOperationKind, ROW_NUMBER_COLUMN, quoted_list, writable_columns};
use crate::dialect::Dialect;
use crate::error::BulkError;
use crate::metadata::EntityInfo;
use crate::options::BulkOption;

/// Columns: every mapped column minus generated and `skip_insert` columns,
/// minus `ignore_on_insert`
pub fn plan_insert<'a>(
    info: &'a EntityInfo,
    option: &BulkOption,
    dialect: &'a dyn Dialect,
) -> Result<BatchPlan<'a>, BulkError> {
    let columns = writable_columns(info, &option.ignore_on_insert, "ignore_on_insert", |c| {
        c.excluded_from_insert()
    })?;
    if columns.is_empty() {
        return Err(BulkError::config(format!(
            "No insertable columns for table '{}'",
            info.table
        )));
    }

    let list = quoted_list(&columns, dialect);
    let prefix = format!(
        "INSERT INTO {}\n({})\nSELECT {}\nFROM ",
        dialect.quote_ident(&info.table),
        list,
        list
    );
    let suffix = format!("ORDER BY {}\n", ROW_NUMBER_COLUMN);

    Ok(BatchPlan::new(
        BulkOperationKind::Insert,
        info,
        columns,
        prefix,
        suffix,
        option,
        dialect,
    ))
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::super::{BulkOperationKind, generate_batches};
    use crate::dialect::MySqlDialect;
    use crate::options::BulkOption;
    use crate::types::SqlValue;

    #[test]
    fn test_insert_script() {
        let registry = registry();
        let result = generate_batches(
            BulkOperationKind::Insert,
            &registry,
            &one(),
            &BulkOption::default(),
            &MySqlDialect,
        );
        assert!(result.is_ok(), "generation failed: {:?}", result.err());
        if let Ok(batches) = result {
            assert_eq!(batches.len(), 1);
            assert_eq!(batches[0].parameters().len(), 4);
            assert_eq!(
                batches[0].sql(),
                "INSERT INTO `Products`\n\
                 (`Id`, `CreatedAt`, `Name`, `Price`)\n\
                 SELECT `Id`, `CreatedAt`, `Name`, `Price`\n\
                 FROM (\n\
                 SELECT ? AS `Id`, ? AS `CreatedAt`, ? AS `Name`, ? AS `Price`, 0 AS zRowNo\n\
                 ) AS tmp\n\
                 ORDER BY zRowNo\n"
            );
            assert_eq!(batches[0].parameters()[1].value, SqlValue::Null);
            assert_eq!(batches[0].parameters()[2].value, SqlValue::Text("Test".to_string()));
        }
    }

    #[test]
    fn test_insert_ignores_created_at() {
        let registry = registry();
        let option = BulkOption::new().ignore_on_insert(["CreatedAt"]);
        let result = generate_batches(
            BulkOperationKind::Insert,
            &registry,
            &one(),
            &option,
            &MySqlDialect,
        );
        assert!(result.is_ok(), "generation failed: {:?}", result.err());
        if let Ok(batches) = result {
            assert_eq!(batches[0].parameters().len(), 3);
            assert!(!batches[0].sql().contains("CreatedAt"));
            let names: Vec<&str> = batches[0]
                .parameters()
                .iter()
                .map(|p| p.name.as_str())
                .collect();
            assert_eq!(names, ["@p0_0", "@p0_1", "@p0_2"]);
        }
    }

    #[test]
    fn test_insert_never_writes_generated_columns() {
        let registry = registry();
        let result = generate_batches(
            BulkOperationKind::Insert,
            &registry,
            &one(),
            &BulkOption::default(),
            &MySqlDialect,
        );
        assert!(result.is_ok_and(|b| !b[0].sql().contains("Version")));
    }
}
