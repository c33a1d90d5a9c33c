//! Parameterized inline table, one `SELECT` per item joined with `UNION ALL`

use crate::dialect::Dialect;
use crate::metadata::ColumnInfo;
use crate::record::BulkRecord;
use crate::types::SqlParameter;

const PARAM_PREFIX: &str = "@p";

/// Ordering column carried by every derived row
pub const ROW_NUMBER_COLUMN: &str = "zRowNo";

/// Alias the derived table is exposed under
pub const DERIVED_ALIAS: &str = "tmp";

/// Rendered derived table
#[derive(Debug)]
pub struct DerivedTable {
    pub sql: String,
    pub parameters: Vec<SqlParameter>,
}

/// Parameter name for a cell; unique within one chunk
pub fn parameter_name(row: usize, column: usize) -> String {
    format!("{}{}_{}", PARAM_PREFIX, row, column)
}

/// Render `rows` as `( SELECT .. UNION ALL SELECT .. ) AS tmp`
///
/// Each cell becomes a parameter carrying the column's converted value and
/// each row is tagged with its chunk-local position in `zRowNo`. Parameters
/// are listed in the order their placeholders appear in the text.
pub fn build_derived_table<R: BulkRecord>(
    columns: &[&ColumnInfo],
    rows: &[R],
    dialect: &dyn Dialect,
) -> DerivedTable {
    let mut parameters = Vec::with_capacity(columns.len() * rows.len());
    let mut sql = String::from("(\n");

    for (row_index, row) in rows.iter().enumerate() {
        sql.push_str(if row_index == 0 {
            "SELECT "
        } else {
            "UNION ALL SELECT "
        });

        for (col_index, column) in columns.iter().enumerate() {
            let name = parameter_name(row_index, col_index);
            sql.push_str(&format!(
                "{} AS {}, ",
                dialect.placeholder(&name),
                dialect.quote_ident(&column.name)
            ));
            parameters.push(SqlParameter::new(name, column.storage_value(row)));
        }
        sql.push_str(&format!("{} AS {}\n", row_index, ROW_NUMBER_COLUMN));
    }

    sql.push_str(&format!(") AS {}\n", DERIVED_ALIAS));
    DerivedTable { sql, parameters }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::MySqlDialect;
    use crate::types::SqlValue;

    struct Pair(i64, Option<&'static str>);

    impl BulkRecord for Pair {
        fn entity_name() -> &'static str {
            "Pair"
        }

        fn field_value(&self, field: &str) -> Option<SqlValue> {
            match field {
                "A" => Some(self.0.into()),
                "B" => self.1.map(Into::into),
                _ => None,
            }
        }
    }

    #[test]
    fn test_rows_numbered_from_zero() {
        let a = ColumnInfo::new("a", "A");
        let b = ColumnInfo::new("b", "B");
        let rows = [Pair(1, Some("x")), Pair(2, None)];
        let table = build_derived_table(&[&a, &b], &rows, &MySqlDialect);

        assert_eq!(
            table.sql,
            "(\nSELECT ? AS `a`, ? AS `b`, 0 AS zRowNo\nUNION ALL SELECT ? AS `a`, ? AS `b`, 1 AS zRowNo\n) AS tmp\n"
        );
        let names: Vec<&str> = table.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["@p0_0", "@p0_1", "@p1_0", "@p1_1"]);
        assert_eq!(table.parameters[3].value, SqlValue::Null);
        assert_eq!(table.parameters[2].value, SqlValue::Int(2));
    }
}
