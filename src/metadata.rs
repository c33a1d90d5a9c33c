//! Table and column descriptors for mapped entities
//!
//! The engine never discovers schema by itself: each entity is described by
//! an immutable [`EntityInfo`] handed in through a [`MetadataProvider`].
//! [`EntityRegistry`] is the provider shipped with the crate and can be
//! populated in code or from a JSON schema descriptor.

use crate::commands::ROW_NUMBER_COLUMN;
use crate::error::BulkError;
use crate::record::BulkRecord;
use crate::types::SqlValue;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

const DEFAULT_SCHEMA: &str = "dbo";

/// In-memory value to storage value conversion
#[derive(Clone)]
pub struct ValueConverter(Arc<dyn Fn(SqlValue) -> SqlValue + Send + Sync>);

impl ValueConverter {
    pub fn new(f: impl Fn(SqlValue) -> SqlValue + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn convert(&self, value: SqlValue) -> SqlValue {
        (self.0)(value)
    }
}

impl std::fmt::Debug for ValueConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ValueConverter(..)")
    }
}

/// Column descriptor
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnInfo {
    /// Storage column name
    pub name: String,

    /// Field reference name on the record
    pub field: String,

    #[serde(default)]
    pub primary_key: bool,

    /// Member of a unique index; used as the default join key
    #[serde(default)]
    pub unique_index: bool,

    #[serde(default)]
    pub key: bool,

    /// Database-generated (identity/computed); never written
    #[serde(default)]
    pub generated: bool,

    #[serde(default)]
    pub skip_insert: bool,

    #[serde(default)]
    pub skip_update: bool,

    #[serde(skip)]
    pub converter: Option<ValueConverter>,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            primary_key: false,
            unique_index: false,
            key: false,
            generated: false,
            skip_insert: false,
            skip_update: false,
            converter: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.key = true;
        self
    }

    pub fn unique_index(mut self) -> Self {
        self.unique_index = true;
        self
    }

    pub fn generated(mut self) -> Self {
        self.generated = true;
        self.skip_insert = true;
        self.skip_update = true;
        self
    }

    pub fn skip_insert(mut self) -> Self {
        self.skip_insert = true;
        self
    }

    pub fn skip_update(mut self) -> Self {
        self.skip_update = true;
        self
    }

    pub fn with_converter(mut self, f: impl Fn(SqlValue) -> SqlValue + Send + Sync + 'static) -> Self {
        self.converter = Some(ValueConverter::new(f));
        self
    }

    /// Left out of inserts and of the insert half of a merge
    pub fn excluded_from_insert(&self) -> bool {
        self.generated || self.skip_insert
    }

    /// Left out of update SET lists and of the update half of a merge
    pub fn excluded_from_update(&self) -> bool {
        self.generated || self.skip_update
    }

    /// Storage value of this column for one record
    pub fn storage_value<R: BulkRecord + ?Sized>(&self, record: &R) -> SqlValue {
        let value = record.field_value(&self.field).unwrap_or(SqlValue::Null);
        match &self.converter {
            Some(converter) => converter.convert(value),
            None => value,
        }
    }

    fn normalize(&mut self) {
        if self.generated {
            self.skip_insert = true;
            self.skip_update = true;
        }
    }
}

/// Table descriptor
#[derive(Debug, Clone, Deserialize)]
pub struct EntityInfo {
    pub table: String,

    #[serde(default = "default_schema")]
    pub schema: String,

    pub columns: Vec<ColumnInfo>,
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

impl EntityInfo {
    pub fn new(table: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        let mut info = Self {
            table: table.into(),
            schema: default_schema(),
            columns,
        };
        info.normalize();
        info
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn column(&self, field: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.field == field)
    }

    fn normalize(&mut self) {
        self.columns.iter_mut().for_each(ColumnInfo::normalize);
    }

    /// Check the descriptor is usable for statement generation
    pub fn validate(&self, entity: &str) -> Result<(), BulkError> {
        if self.table.trim().is_empty() {
            return Err(BulkError::config(format!(
                "Unable to resolve table name for entity '{}'",
                entity
            )));
        }
        if self.columns.is_empty() {
            return Err(BulkError::config(format!(
                "Entity '{}' maps no columns",
                entity
            )));
        }

        let mut fields = HashSet::new();
        let mut names = HashSet::new();
        for column in &self.columns {
            if column.name.trim().is_empty() || column.field.trim().is_empty() {
                return Err(BulkError::config(format!(
                    "Entity '{}' has a column with an empty name or field",
                    entity
                )));
            }
            if !fields.insert(column.field.as_str()) {
                return Err(BulkError::config(format!(
                    "Entity '{}' maps field '{}' more than once",
                    entity, column.field
                )));
            }
            // MySQL column names compare case-insensitively
            let name = column.name.to_ascii_lowercase();
            if name == ROW_NUMBER_COLUMN.to_ascii_lowercase() {
                return Err(BulkError::config(format!(
                    "Entity '{}' maps column '{}', which is reserved for row ordering",
                    entity, column.name
                )));
            }
            if !names.insert(name) {
                return Err(BulkError::config(format!(
                    "Entity '{}' maps column '{}' more than once",
                    entity, column.name
                )));
            }
        }
        Ok(())
    }
}

/// Source of entity descriptors
pub trait MetadataProvider: Send + Sync {
    fn entity_info(&self, entity: &str) -> Option<&EntityInfo>;
}

/// Resolve and validate the descriptor for `R`
///
/// # Errors
/// `BulkError::Configuration` if `R` is unmapped or its descriptor is unusable.
pub fn resolve_entity<R: BulkRecord>(
    provider: &dyn MetadataProvider,
) -> Result<&EntityInfo, BulkError> {
    let entity = R::entity_name();
    let info = provider.entity_info(entity).ok_or_else(|| {
        BulkError::config(format!("Unable to resolve entity type '{}'", entity))
    })?;
    info.validate(entity)?;
    Ok(info)
}

#[derive(Deserialize)]
struct SchemaDescriptor {
    entities: HashMap<String, EntityInfo>,
}

/// In-process metadata provider
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: HashMap<String, EntityInfo>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entity: impl Into<String>, info: EntityInfo) -> &mut Self {
        let mut info = info;
        info.normalize();
        self.entities.insert(entity.into(), info);
        self
    }

    /// Load descriptors from JSON
    ///
    /// ```
    /// # use mysql_bulk_ops::metadata::{EntityRegistry, MetadataProvider};
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let registry = EntityRegistry::from_json_str(r#"{
    ///     "entities": {
    ///         "Product": {
    ///             "table": "products",
    ///             "columns": [
    ///                 { "name": "id", "field": "Id", "primary_key": true, "generated": true },
    ///                 { "name": "sku", "field": "Sku", "unique_index": true }
    ///             ]
    ///         }
    ///     }
    /// }"#)?;
    /// let product = registry.entity_info("Product").ok_or("missing")?;
    /// assert_eq!(product.schema, "dbo");
    /// assert!(product.columns[0].skip_insert);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self, BulkError> {
        let descriptor: SchemaDescriptor = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for (entity, info) in descriptor.entities {
            info.validate(&entity)?;
            registry.register(entity, info);
        }
        Ok(registry)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, BulkError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Attach a value converter to a column loaded from a descriptor
    pub fn set_converter(
        &mut self,
        entity: &str,
        field: &str,
        f: impl Fn(SqlValue) -> SqlValue + Send + Sync + 'static,
    ) -> Result<(), BulkError> {
        let column = self
            .entities
            .get_mut(entity)
            .ok_or_else(|| BulkError::config(format!("Unable to resolve entity type '{}'", entity)))?
            .columns
            .iter_mut()
            .find(|c| c.field == field)
            .ok_or_else(|| {
                BulkError::config(format!("Entity '{}' has no field '{}'", entity, field))
            })?;
        column.converter = Some(ValueConverter::new(f));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl MetadataProvider for EntityRegistry {
    fn entity_info(&self, entity: &str) -> Option<&EntityInfo> {
        self.entities.get(entity)
    }
}
