use std::collections::HashMap;

use crate::error::{ErrorKind, TrestleResult};
use crate::trestle_error;

/// Spanner column types the DynamoDB type mapping can produce.
///
/// Number maps to NUMERIC by default but may be narrowed to INT64 or FLOAT64
/// by the schema-inference step; List and Map arrive as STRING carrying
/// their JSON form; the set types become arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpannerType {
    Bool,
    Bytes,
    Float64,
    Int64,
    Numeric,
    String,
    StringArray,
    NumericArray,
    BytesArray,
}

/// Source-side schema snapshot for one table.
#[derive(Debug, Clone)]
pub struct SourceTable {
    /// Source table name.
    pub name: String,
    /// Column names in source declaration order.
    pub col_names: Vec<String>,
    /// Primary-key column names in declared order: hash key first, then the
    /// range key if the table has one.
    pub primary_keys: Vec<String>,
}

/// Mapping from one source table to its Spanner counterpart.
///
/// `target_cols` and `target_types` are positionally aligned with
/// `source.col_names`; conversion walks all three vectors in lockstep.
#[derive(Debug, Clone)]
pub struct TableMapping {
    pub source: SourceTable,
    /// Spanner table name.
    pub target_table: String,
    /// Spanner column names, aligned with `source.col_names`.
    pub target_cols: Vec<String>,
    /// Spanner column types, aligned with `source.col_names`.
    pub target_types: Vec<SpannerType>,
}

/// Read-only schema snapshot loaded once at pipeline start.
///
/// Produced by the schema-inference and bulk-load stages that run before
/// streaming; never mutated while shards are being processed.
#[derive(Debug, Clone, Default)]
pub struct SchemaSnapshot {
    tables: HashMap<String, TableMapping>,
}

impl SchemaSnapshot {
    pub fn new(mappings: impl IntoIterator<Item = TableMapping>) -> Self {
        let tables = mappings
            .into_iter()
            .map(|mapping| (mapping.source.name.clone(), mapping))
            .collect();

        Self { tables }
    }

    /// Resolves the mapping for a source table, verifying that the source
    /// and target column vectors agree in length.
    pub fn mapping(&self, table: &str) -> TrestleResult<&TableMapping> {
        let mapping = self.tables.get(table).ok_or_else(|| {
            trestle_error!(
                ErrorKind::SchemaMismatch,
                "no schema mapping for source table",
                table
            )
        })?;

        let cols = mapping.source.col_names.len();
        if mapping.target_cols.len() != cols || mapping.target_types.len() != cols {
            return Err(trestle_error!(
                ErrorKind::SchemaMismatch,
                "source and target column vectors disagree",
                format!(
                    "table {table}: {cols} source columns, {} target columns, {} target types",
                    mapping.target_cols.len(),
                    mapping.target_types.len()
                )
            ));
        }

        Ok(mapping)
    }

    /// Source table names in the snapshot.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn mapping() -> TableMapping {
        TableMapping {
            source: SourceTable {
                name: "Products".to_string(),
                col_names: vec!["ProductId".to_string(), "Description".to_string()],
                primary_keys: vec!["ProductId".to_string()],
            },
            target_table: "Products".to_string(),
            target_cols: vec!["ProductId".to_string(), "Description".to_string()],
            target_types: vec![SpannerType::String, SpannerType::String],
        }
    }

    #[test]
    fn resolves_known_table() {
        let snapshot = SchemaSnapshot::new([mapping()]);
        assert!(snapshot.mapping("Products").is_ok());
    }

    #[test]
    fn unknown_table_is_schema_mismatch() {
        let snapshot = SchemaSnapshot::new([]);
        let err = snapshot.mapping("Products").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    }

    #[test]
    fn misaligned_columns_are_schema_mismatch() {
        let mut broken = mapping();
        broken.target_types.pop();
        let snapshot = SchemaSnapshot::new([broken]);
        let err = snapshot.mapping("Products").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    }
}
