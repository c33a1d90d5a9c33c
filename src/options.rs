//! Per-call options and field selection

use crate::error::BulkError;
use crate::metadata::EntityInfo;
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Set of field reference names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet(BTreeSet<String>);

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>) -> Self {
        self.0.insert(field.into());
        self
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for FieldSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Resolve a field selection against an entity
///
/// An absent selection yields the empty set. Every selected name must be a
/// mapped field of `info`.
pub fn selected_fields<'a>(
    selection: Option<&'a FieldSet>,
    info: &EntityInfo,
    purpose: &str,
) -> Result<HashSet<&'a str>, BulkError> {
    let Some(selection) = selection else {
        return Ok(HashSet::new());
    };

    let mut fields = HashSet::with_capacity(selection.len());
    for field in selection.iter() {
        if info.column(field).is_none() {
            return Err(BulkError::config(format!(
                "Unknown field '{}' in {} for table '{}'",
                field, purpose, info.table
            )));
        }
        fields.insert(field);
    }
    Ok(fields)
}

/// Options for one bulk call
#[derive(Debug, Clone)]
pub struct BulkOption {
    /// Items per generated statement (default 200)
    pub batch_size: usize,

    /// Per-statement timeout (None = no engine-side timeout)
    pub command_timeout: Option<Duration>,

    /// Fields left out of inserts and of the insert half of a merge
    pub ignore_on_insert: FieldSet,

    /// Fields left out of updates and of the update half of a merge
    pub ignore_on_update: FieldSet,

    /// Join key override; None = columns flagged `unique_index`
    pub unique_keys: Option<FieldSet>,

    /// Checked before begin, before each batch and before commit
    pub cancellation: Option<CancellationToken>,
}

impl Default for BulkOption {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            command_timeout: None,
            ignore_on_insert: FieldSet::new(),
            ignore_on_update: FieldSet::new(),
            unique_keys: None,
            cancellation: None,
        }
    }
}

impl BulkOption {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    pub fn ignore_on_insert<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_on_insert = fields.into_iter().collect();
        self
    }

    pub fn ignore_on_update<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_on_update = fields.into_iter().collect();
        self
    }

    pub fn unique_keys<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_keys = Some(fields.into_iter().collect());
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), BulkError> {
        if self.batch_size == 0 {
            return Err(BulkError::config("batch_size must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ColumnInfo;

    fn products() -> EntityInfo {
        EntityInfo::new(
            "Products",
            vec![
                ColumnInfo::new("Id", "Id").primary_key(),
                ColumnInfo::new("CreatedAt", "CreatedAt"),
            ],
        )
    }

    #[test]
    fn test_absent_selection_is_empty() {
        let fields = selected_fields(None, &products(), "ignore_on_insert");
        assert!(fields.is_ok_and(|f| f.is_empty()));
    }

    #[test]
    fn test_selection_resolves_names() {
        let set: FieldSet = ["CreatedAt"].into_iter().collect();
        let fields = selected_fields(Some(&set), &products(), "ignore_on_insert");
        assert!(fields.is_ok(), "selection failed: {:?}", fields.err());
        if let Ok(fields) = fields {
            assert_eq!(fields.len(), 1);
            assert!(fields.contains("CreatedAt"));
        }
    }

    #[test]
    fn test_unknown_field_rejected() {
        let set = FieldSet::new().with("UpdatedAt");
        let err = selected_fields(Some(&set), &products(), "ignore_on_update").err();
        assert!(err.is_some_and(|e| e.is_configuration() && e.to_string().contains("UpdatedAt")));
    }

    #[test]
    fn test_defaults() {
        let option = BulkOption::default();
        assert_eq!(option.batch_size, 200);
        assert!(option.unique_keys.is_none());
        assert!(option.ignore_on_insert.is_empty());
        assert!(option.validate().is_ok());
        assert!(BulkOption::new().batch_size(0).validate().is_err());
    }
}
