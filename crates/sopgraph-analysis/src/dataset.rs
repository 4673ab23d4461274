//! Seeded record sets, one JSON file per table (`<table>.json`).
//!
//! Each file maps a record identifier to the record's fields:
//!
//! ```json
//! {"b1": {"branch_id": "b1", "repository_id": "r1"}}
//! ```

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub type Record = Map<String, Value>;
pub type RecordSet = BTreeMap<String, Record>;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read seeded data {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in seeded data {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("seeded data {} must be a JSON object of records, found {found}", path.display())]
    Shape { path: PathBuf, found: &'static str },
}

/// Records per table, plus the tables whose data file was absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeededDataset {
    tables: BTreeMap<String, RecordSet>,
    missing_tables: BTreeSet<String>,
}

impl SeededDataset {
    pub fn insert_table(&mut self, table: impl Into<String>, records: RecordSet) {
        self.tables.insert(table.into(), records);
    }

    /// Build a table from a JSON object value (`{"id": {...}, ...}`).
    /// Entries whose value is not an object are skipped.
    pub fn insert_json_table(&mut self, table: impl Into<String>, value: Value) {
        let table = table.into();
        let records = match value {
            Value::Object(entries) => records_from_object(&table, entries),
            _ => RecordSet::new(),
        };
        self.tables.insert(table, records);
    }

    pub fn table(&self, table: &str) -> Option<&RecordSet> {
        self.tables.get(table)
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn record(&self, table: &str, id: &str) -> Option<&Record> {
        self.tables.get(table)?.get(id)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Tables requested from disk whose file did not exist (loaded as empty).
    pub fn missing_tables(&self) -> &BTreeSet<String> {
        &self.missing_tables
    }
}

fn records_from_object(table: &str, entries: Map<String, Value>) -> RecordSet {
    let mut records = RecordSet::new();
    for (id, value) in entries {
        match value {
            Value::Object(fields) => {
                records.insert(id, fields);
            }
            other => {
                tracing::warn!(
                    table,
                    record = %id,
                    kind = json_kind(&other),
                    "skipping seeded record that is not an object"
                );
            }
        }
    }
    records
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Load `<data_dir>/<table>.json` for each table.
///
/// A missing file is not an error: the table is loaded empty, a warning is
/// logged, and the table is listed in [`SeededDataset::missing_tables`].
/// Unreadable or malformed files are errors.
pub fn load_seeded_data(
    data_dir: &Path,
    tables: &BTreeSet<String>,
) -> Result<SeededDataset, DatasetError> {
    let mut dataset = SeededDataset::default();

    for table in tables {
        let path = data_dir.join(format!("{table}.json"));
        if !path.exists() {
            tracing::warn!(
                table = %table,
                path = %path.display(),
                "no seeded data file for table; treating it as empty"
            );
            dataset.missing_tables.insert(table.clone());
            dataset.tables.insert(table.clone(), RecordSet::new());
            continue;
        }

        let text = std::fs::read_to_string(&path).map_err(|source| DatasetError::Io {
            path: path.clone(),
            source,
        })?;
        let value: Value = serde_json::from_str(&text).map_err(|source| DatasetError::Json {
            path: path.clone(),
            source,
        })?;
        let entries = match value {
            Value::Object(entries) => entries,
            other => {
                return Err(DatasetError::Shape {
                    path,
                    found: json_kind(&other),
                })
            }
        };

        let records = records_from_object(table, entries);
        tracing::debug!(table = %table, records = records.len(), "loaded seeded data");
        dataset.tables.insert(table.clone(), records);
    }

    Ok(dataset)
}
