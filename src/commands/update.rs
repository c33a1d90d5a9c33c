//! Bulk update: `UPDATE target AS tb INNER JOIN (derived) AS tmp ON <keys> SET ..`

use super::{
    BatchPlan, BulkOperationKind, DERIVED_ALIAS, join_key_columns, join_predicate,
    writable_columns,
};
use crate::dialect::Dialect;
use crate::error::BulkError;
use crate::metadata::{ColumnInfo, EntityInfo};
use crate::options::BulkOption;

/// Columns: every mapped column minus generated and `skip_update` columns,
/// minus `ignore_on_update`.
///
/// The derived table carries those columns plus any join-key column not
/// already among them; SET covers the selected columns that are not primary
/// keys.
pub fn plan_update<'a>(
    info: &'a EntityInfo,
    option: &BulkOption,
    dialect: &'a dyn Dialect,
) -> Result<BatchPlan<'a>, BulkError> {
    let selected = writable_columns(info, &option.ignore_on_update, "ignore_on_update", |c| {
        c.excluded_from_update()
    })?;
    let keys = join_key_columns(info, option)?;

    let set_columns: Vec<&ColumnInfo> = selected
        .iter()
        .copied()
        .filter(|c| !c.primary_key)
        .collect();
    if set_columns.is_empty() {
        return Err(BulkError::config(format!(
            "No updatable columns for table '{}'",
            info.table
        )));
    }

    let derived: Vec<&ColumnInfo> = info
        .columns
        .iter()
        .filter(|c| {
            selected.iter().any(|s| s.name == c.name) || keys.iter().any(|k| k.name == c.name)
        })
        .collect();

    let prefix = format!(
        "UPDATE {} AS tb\nINNER JOIN ",
        dialect.quote_ident(&info.table)
    );
    let assignments = set_columns
        .iter()
        .map(|c| {
            let quoted = dialect.quote_ident(&c.name);
            format!("tb.{} = {}.{}", quoted, DERIVED_ALIAS, quoted)
        })
        .collect::<Vec<_>>()
        .join(",\n");
    let suffix = format!("{}SET {}\n", join_predicate(&keys, dialect), assignments);

    Ok(BatchPlan::new(
        BulkOperationKind::Update,
        info,
        derived,
        prefix,
        suffix,
        option,
        dialect,
    ))
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::super::{BulkOperationKind, generate_batches, plan_for};
    use crate::dialect::MySqlDialect;
    use crate::metadata::{ColumnInfo, EntityInfo};
    use crate::options::BulkOption;

    #[test]
    fn test_update_script() {
        let registry = registry();
        let result = generate_batches(
            BulkOperationKind::Update,
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
                "UPDATE `Products` AS tb\n\
                 INNER JOIN (\n\
                 SELECT ? AS `Id`, ? AS `CreatedAt`, ? AS `Name`, ? AS `Price`, 0 AS zRowNo\n\
                 ) AS tmp\n\
                 ON tb.`Id` = tmp.`Id`\n\
                 SET tb.`CreatedAt` = tmp.`CreatedAt`,\n\
                 tb.`Name` = tmp.`Name`,\n\
                 tb.`Price` = tmp.`Price`\n"
            );
        }
    }

    #[test]
    fn test_update_ignores_created_at() {
        let registry = registry();
        let option = BulkOption::new().ignore_on_update(["CreatedAt"]);
        let result = generate_batches(
            BulkOperationKind::Update,
            &registry,
            &one(),
            &option,
            &MySqlDialect,
        );
        assert!(result.is_ok(), "generation failed: {:?}", result.err());
        if let Ok(batches) = result {
            assert_eq!(batches[0].parameters().len(), 3);
            assert!(!batches[0].sql().contains("CreatedAt"));
        }
    }

    #[test]
    fn test_join_covers_unique_index_columns() {
        let mut registry = registry();
        registry.register(
            "Product",
            EntityInfo::new(
                "Products",
                vec![
                    ColumnInfo::new("Id", "Id").primary_key(),
                    ColumnInfo::new("Sku", "Name").unique_index(),
                    ColumnInfo::new("Region", "CreatedAt").unique_index(),
                    ColumnInfo::new("Price", "Price"),
                ],
            ),
        );

        let plan = plan_for::<Product>(
            BulkOperationKind::Update,
            &registry,
            &BulkOption::default(),
            &MySqlDialect,
        );
        assert!(plan.is_ok(), "plan failed: {:?}", plan.err());
        if let Ok(plan) = plan {
            let batch = plan.batches(&one()).next();
            assert!(batch.is_some());
            if let Some(batch) = batch {
                assert!(batch.sql().contains("ON tb.`Sku` = tmp.`Sku`\nAND tb.`Region` = tmp.`Region`\nSET"));
                assert!(!batch.sql().contains("tb.`Id` = tmp.`Id`"));
            }
        }

        let option = BulkOption::new().unique_keys(["Id"]);
        let plan = plan_for::<Product>(BulkOperationKind::Update, &registry, &option, &MySqlDialect);
        assert!(plan.is_ok(), "plan failed: {:?}", plan.err());
        if let Ok(plan) = plan {
            let batch = plan.batches(&one()).next();
            assert!(batch.is_some_and(|b| b.sql().contains("ON tb.`Id` = tmp.`Id`\nSET")));
        }
    }

    #[test]
    fn test_ignored_join_key_still_carried() {
        let registry = registry();
        let option = BulkOption::new()
            .ignore_on_update(["Id"])
            .unique_keys(["Id"]);
        let plan = plan_for::<Product>(BulkOperationKind::Update, &registry, &option, &MySqlDialect);
        assert!(plan.is_ok(), "plan failed: {:?}", plan.err());
        if let Ok(plan) = plan {
            assert_eq!(plan.column_names(), ["Id", "CreatedAt", "Name", "Price"]);
        }
    }

    #[test]
    fn test_missing_join_key_rejected() {
        let mut registry = registry();
        registry.register(
            "Product",
            EntityInfo::new("Products", vec![ColumnInfo::new("Name", "Name")]),
        );
        let plan = plan_for::<Product>(
            BulkOperationKind::Update,
            &registry,
            &BulkOption::default(),
            &MySqlDialect,
        );
        assert!(plan.is_err_and(|e| e.is_configuration()));
    }

    #[test]
    fn test_unknown_unique_key_rejected() {
        let registry = registry();
        let option = BulkOption::new().unique_keys(["Sku"]);
        let plan = plan_for::<Product>(BulkOperationKind::Update, &registry, &option, &MySqlDialect);
        assert!(plan.is_err_and(|e| e.to_string().contains("Sku")));
    }
}
