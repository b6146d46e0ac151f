//! Order record table: read-only lookup from normalized order number to the
//! enrichment fields of that order.
//!
//! Tables are loaded once, before any document is touched, from either a
//! JSON array of row objects or a JSON object keyed by order number.
use crate::config::EnricherConfig;
use crate::key::NormalizedKey;
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Enrichment fields of one order, trimmed; empty values are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderRecord {
    pub classification: Option<String>,
    /// Raw status, possibly `CODE - Label`.
    pub status: Option<String>,
    pub status_description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct OrderTable {
    records: BTreeMap<NormalizedKey, OrderRecord>,
}

/// Table source rejected before processing starts.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("order table is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("order table must be a JSON array of rows or an object keyed by order number (got {0})")]
    UnexpectedShape(&'static str),
    #[error("order table row {0} is not a JSON object")]
    RowNotObject(String),
    #[error("no order table row carries the key field {0:?}")]
    MissingKeyField(String),
}

impl OrderTable {
    pub fn from_slice(bytes: &[u8], config: &EnricherConfig) -> Result<OrderTable, TableError> {
        let value: Value = serde_json::from_slice(bytes)?;
        OrderTable::from_json(&value, config)
    }

    /// Build a table from a parsed JSON source.
    pub fn from_json(value: &Value, config: &EnricherConfig) -> Result<OrderTable, TableError> {
        let mut table = OrderTable::default();
        match value {
            Value::Array(rows) => {
                let mut saw_key_field = false;
                for (index, row) in rows.iter().enumerate() {
                    let row = row
                        .as_object()
                        .ok_or_else(|| TableError::RowNotObject(index.to_string()))?;
                    let Some(raw_key) = row.get(&config.key_field) else {
                        continue;
                    };
                    saw_key_field = true;
                    table.insert(NormalizedKey::from_value(raw_key), row, config);
                }
                if !rows.is_empty() && !saw_key_field {
                    return Err(TableError::MissingKeyField(config.key_field.clone()));
                }
            }
            Value::Object(mapping) => {
                for (raw_key, row) in mapping {
                    let row = row
                        .as_object()
                        .ok_or_else(|| TableError::RowNotObject(raw_key.clone()))?;
                    table.insert(crate::key::normalize(raw_key), row, config);
                }
            }
            Value::Null => return Err(TableError::UnexpectedShape("null")),
            Value::Bool(_) => return Err(TableError::UnexpectedShape("boolean")),
            Value::Number(_) => return Err(TableError::UnexpectedShape("number")),
            Value::String(_) => return Err(TableError::UnexpectedShape("string")),
        }
        Ok(table)
    }

    fn insert(&mut self, key: NormalizedKey, row: &Map<String, Value>, config: &EnricherConfig) {
        if key.is_empty() {
            tracing::debug!("skipped order table row with an empty key");
            return;
        }
        let record = OrderRecord {
            classification: field_text(row, &config.classification_field),
            status: field_text(row, &config.status_field),
            status_description: field_text(row, &config.status_description_field),
        };
        if self.records.insert(key.clone(), record).is_some() {
            tracing::debug!(key = %key, "duplicate order table key; last row wins");
        }
    }

    pub fn get(&self, key: &NormalizedKey) -> Option<&OrderRecord> {
        if key.is_empty() {
            return None;
        }
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[cfg(test)]
    pub fn from_records<I>(records: I) -> OrderTable
    where
        I: IntoIterator<Item = (&'static str, OrderRecord)>,
    {
        OrderTable {
            records: records
                .into_iter()
                .map(|(key, record)| (crate::key::normalize(key), record))
                .collect(),
        }
    }
}

/// Read and parse a table file.
pub fn load_table(path: &Path, config: &EnricherConfig) -> Result<OrderTable> {
    let bytes = fs::read(path).with_context(|| format!("read order table {}", path.display()))?;
    let table = OrderTable::from_slice(&bytes, config)
        .with_context(|| format!("load order table {}", path.display()))?;
    tracing::info!(records = table.len(), path = %path.display(), "order table loaded");
    if table.is_empty() {
        tracing::warn!(path = %path.display(), "order table has no records; every contract will be unmatched");
    }
    Ok(table)
}

fn field_text(row: &Map<String, Value>, field: &str) -> Option<String> {
    let text = match row.get(field)? {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}
