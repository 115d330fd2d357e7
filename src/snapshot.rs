use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{ContextualResult, InnerError};

/// A schema snapshot produced by the external introspection collaborator.
/// Rules consult it for advisory context, e.g. confirming that a varchar
/// type change is a pure widening.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSnapshot {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub tables: Vec<TableSnapshot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSnapshot {
    #[serde(default)]
    pub schema_name: String,
    pub table_name: String,
    #[serde(default)]
    pub columns: Vec<ColumnSnapshot>,
    #[serde(default)]
    pub constraints: Vec<serde_json::Value>,
    #[serde(default)]
    pub indexes: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSnapshot {
    pub column_name: String,
    #[serde(default)]
    pub data_type: String,
    #[serde(default)]
    pub udt_name: String,
    #[serde(default)]
    pub character_maximum_length: Option<i64>,
    #[serde(default)]
    pub numeric_precision: Option<i64>,
    #[serde(default)]
    pub numeric_scale: Option<i64>,
    #[serde(default)]
    pub is_nullable: Option<serde_json::Value>,
    #[serde(default)]
    pub column_default: Option<String>,
}

/// Snapshot indexed for lookup by case-folded table name.
#[derive(Debug, Clone, Default)]
pub struct SnapshotIndex {
    tables: FxHashMap<String, TableSnapshot>,
}

impl SnapshotIndex {
    pub fn from_snapshot(snapshot: SchemaSnapshot) -> Self {
        let mut tables = FxHashMap::default();
        for table in snapshot.tables {
            tables.insert(table.table_name.to_lowercase(), table);
        }
        SnapshotIndex { tables }
    }

    pub fn load(path: &str) -> crate::Result<Self> {
        let body = std::fs::read_to_string(path)
            .with_context(format!("reading schema snapshot: {path}"))?;
        let snapshot: SchemaSnapshot = serde_json::from_str(&body)
            .map_err(|e| InnerError::BadSnapshotFile(format!("{path}: {e}")))?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn column(&self, table: &str, column: &str) -> Option<&ColumnSnapshot> {
        self.tables.get(&table.to_lowercase()).and_then(|t| {
            t.columns
                .iter()
                .find(|c| c.column_name.eq_ignore_ascii_case(column))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn indexes_by_folded_table_name() {
        let snapshot: SchemaSnapshot = serde_json::from_str(
            r#"{
                "version": "1",
                "generatedAt": "2026-01-01T00:00:00Z",
                "tables": [{
                    "schemaName": "public",
                    "tableName": "Users",
                    "columns": [{
                        "columnName": "email",
                        "dataType": "character varying",
                        "udtName": "varchar",
                        "characterMaximumLength": 120
                    }]
                }]
            }"#,
        )
        .unwrap();
        let index = SnapshotIndex::from_snapshot(snapshot);
        let col = index.column("users", "EMAIL").unwrap();
        assert_eq!(col.character_maximum_length, Some(120));
        assert!(index.column("orders", "email").is_none());
    }
}
