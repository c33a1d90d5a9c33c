//! SQL dialect hooks used by statement generation
//!
//! Column-set and join-key derivation never depend on the dialect; only
//! identifier quoting, placeholder syntax and the upsert clause do.

use crate::types::DatabaseType;

pub trait Dialect: Send + Sync {
    /// Quote an identifier
    fn quote_ident(&self, name: &str) -> String;

    /// Placeholder text for the parameter named `name`
    fn placeholder(&self, name: &str) -> String;

    /// Clause appended to `INSERT ... SELECT ...` that overwrites `assignments`
    /// on a key conflict. `assignments` holds `(target, source)` expressions.
    fn upsert_clause(&self, assignments: &[(String, String)]) -> String;

    /// Statement keyword for an insert that skips conflicting rows
    fn insert_ignore(&self) -> &'static str;
}

/// MySQL and MariaDB
///
/// Parameters are positional `?` placeholders, bound in list order.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn quote_ident(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn placeholder(&self, _name: &str) -> String {
        "?".to_string()
    }

    fn upsert_clause(&self, assignments: &[(String, String)]) -> String {
        let set = assignments
            .iter()
            .map(|(target, source)| format!(" {} = {}", target, source))
            .collect::<Vec<_>>()
            .join(",\n");
        format!(" ON DUPLICATE KEY UPDATE \n{}\n", set)
    }

    fn insert_ignore(&self) -> &'static str {
        "INSERT IGNORE"
    }
}

/// Dialect for a database type
pub fn dialect_for(db_type: DatabaseType) -> Box<dyn Dialect> {
    match db_type {
        DatabaseType::MySQL | DatabaseType::MariaDB => Box::new(MySqlDialect),
    }
}
