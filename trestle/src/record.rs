//! Application of a single change record: conversion, mutation construction,
//! and the write with its parent-missing retry.

use tracing::debug;

use crate::config::StreamingConfig;
use crate::conversions::convert_row;
use crate::error::{ErrorKind, TrestleResult};
use crate::state::StreamingState;
use crate::trestle_error;
use crate::types::{Cell, ChangeRecord, EventKind, Mutation, SchemaSnapshot, TableMapping};
use crate::writer::{SpannerWriter, apply_with_retry};

/// Converts one record and writes it to Spanner.
///
/// Every failure mode is absorbed into the shared state: conversion failures
/// count the record as bad, rejected writes count it as dropped, and schema
/// resolution failures only record an anomaly. Records that pass schema
/// resolution increment the processed total exactly once, good or bad.
pub(crate) async fn process_record<W: SpannerWriter>(
    state: &StreamingState,
    schema: &SchemaSnapshot,
    writer: Option<&W>,
    config: &StreamingConfig,
    record: ChangeRecord,
    table: &str,
) {
    state.add_record(table, record.kind);

    let mapping = match schema.mapping(table) {
        Ok(mapping) => mapping,
        Err(err) => {
            state.unexpected(format!(
                "Can't get columns and schemas for table {table}: {err}"
            ));
            return;
        }
    };

    let converted = convert_row(record.source_image(), mapping);
    if converted.bad_cols.is_empty() {
        write_record(state, writer, config, mapping, record.kind, converted.values).await;
    } else {
        debug!(
            table = %table,
            bad_cols = ?converted.bad_cols,
            "record failed conversion"
        );
        state.add_bad_record(table, record.kind);
        state.collect_bad_record(
            table,
            record.kind,
            &mapping.source.col_names,
            converted.source_strings,
        );
    }

    state.add_record_processed();
}

/// Builds the mutation for a converted record and applies it.
async fn write_record<W: SpannerWriter>(
    state: &StreamingState,
    writer: Option<&W>,
    config: &StreamingConfig,
    mapping: &TableMapping,
    kind: EventKind,
    values: Vec<Cell>,
) {
    let Some(writer) = writer else {
        state.add_bad_record(&mapping.source.name, kind);
        state.unexpected(
            "Internal error: write called but writer not configured".to_string(),
        );
        return;
    };

    let mutation = match build_mutation(kind, mapping, values) {
        Ok(mutation) => mutation,
        Err(err) => {
            state.add_dropped_record(&mapping.source.name, kind);
            state.unexpected(format!(
                "Can't build mutation for table {}: {err}",
                mapping.source.name
            ));
            return;
        }
    };

    if let Err(err) = apply_with_retry(writer, mutation.clone(), config).await {
        state.add_dropped_record(&mapping.source.name, kind);
        state.collect_dropped_record(
            &mapping.target_table,
            kind,
            &mapping.target_cols,
            mutation.values().to_vec(),
            err.to_string(),
        );
    }
}

/// Builds the Spanner mutation for one event kind.
///
/// Inserts fail on existing rows on purpose: bulk load completes before
/// streaming begins and the stream is the only subsequent writer, so a
/// duplicate insert signals replayed source history and is surfaced as a
/// dropped record. Modifications upsert so create-then-modify inside the CDC
/// window replays cleanly.
fn build_mutation(
    kind: EventKind,
    mapping: &TableMapping,
    values: Vec<Cell>,
) -> TrestleResult<Mutation> {
    match kind {
        EventKind::Insert => Ok(Mutation::insert(
            mapping.target_table.clone(),
            mapping.target_cols.clone(),
            values,
        )),
        EventKind::Modify => Ok(Mutation::insert_or_update(
            mapping.target_table.clone(),
            mapping.target_cols.clone(),
            values,
        )),
        EventKind::Remove => remove_mutation(mapping, values),
    }
}

/// Builds the delete mutation for a REMOVE record.
///
/// A remove image carries only the key attributes, so the value vector is
/// null everywhere except the primary-key slots. The surviving values must
/// be ordered as the source declares its primary key (hash key, then range
/// key), which need not match column order; a two-key tuple whose first
/// value is not the declared hash key gets swapped. DynamoDB primary keys
/// have at most two attributes, so anything else is a schema mismatch.
fn remove_mutation(mapping: &TableMapping, values: Vec<Cell>) -> TrestleResult<Mutation> {
    let mut key_cols: Vec<&str> = Vec::new();
    let mut key_values: Vec<Cell> = Vec::new();

    for (index, value) in values.into_iter().enumerate() {
        if value.is_null() {
            continue;
        }
        key_cols.push(&mapping.source.col_names[index]);
        key_values.push(value);
    }

    let declared_first = mapping.source.primary_keys.first().map(String::as_str);

    match key_values.len() {
        1 => {
            if declared_first != Some(key_cols[0]) {
                return Err(trestle_error!(
                    ErrorKind::SchemaMismatch,
                    "remove image key does not match the declared primary key",
                    format!(
                        "table {}: extracted key column {} but primary key starts with {:?}",
                        mapping.source.name, key_cols[0], declared_first
                    )
                ));
            }
            Ok(Mutation::delete(mapping.target_table.clone(), key_values))
        }
        2 => {
            if declared_first != Some(key_cols[0]) {
                key_values.swap(0, 1);
            }
            Ok(Mutation::delete(mapping.target_table.clone(), key_values))
        }
        arity => Err(trestle_error!(
            ErrorKind::SchemaMismatch,
            "remove image carries an unsupported number of key attributes",
            format!("table {}: {arity} non-null values", mapping.source.name)
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SourceTable, SpannerType};

    fn two_key_mapping() -> TableMapping {
        TableMapping {
            source: SourceTable {
                name: "Orders".to_string(),
                // Column order intentionally lists the range key first; the
                // declared primary key is (OrderId, ItemId).
                col_names: vec![
                    "ItemId".to_string(),
                    "OrderId".to_string(),
                    "Quantity".to_string(),
                ],
                primary_keys: vec!["OrderId".to_string(), "ItemId".to_string()],
            },
            target_table: "Orders".to_string(),
            target_cols: vec![
                "ItemId".to_string(),
                "OrderId".to_string(),
                "Quantity".to_string(),
            ],
            target_types: vec![
                SpannerType::String,
                SpannerType::String,
                SpannerType::Int64,
            ],
        }
    }

    fn single_key_mapping() -> TableMapping {
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
    fn delete_key_is_reordered_to_declared_primary_key_order() {
        let mutation = remove_mutation(
            &two_key_mapping(),
            vec![
                Cell::String("item-7".to_string()),
                Cell::String("order-1".to_string()),
                Cell::Null,
            ],
        )
        .unwrap();

        assert_eq!(
            mutation,
            Mutation::delete(
                "Orders",
                vec![
                    Cell::String("order-1".to_string()),
                    Cell::String("item-7".to_string()),
                ]
            )
        );
    }

    #[test]
    fn single_key_delete_uses_one_element_key() {
        let mutation = remove_mutation(
            &single_key_mapping(),
            vec![Cell::String("p1".to_string()), Cell::Null],
        )
        .unwrap();

        assert_eq!(
            mutation,
            Mutation::delete("Products", vec![Cell::String("p1".to_string())])
        );
    }

    #[test]
    fn single_mismatched_key_is_schema_mismatch() {
        let err = remove_mutation(
            &single_key_mapping(),
            vec![Cell::Null, Cell::String("desc".to_string())],
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    }

    #[test]
    fn empty_key_is_schema_mismatch() {
        let err = remove_mutation(&single_key_mapping(), vec![Cell::Null, Cell::Null]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    }

    #[test]
    fn more_than_two_keys_is_schema_mismatch() {
        let err = remove_mutation(
            &two_key_mapping(),
            vec![
                Cell::String("a".to_string()),
                Cell::String("b".to_string()),
                Cell::Int64(3),
            ],
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    }

    #[test]
    fn insert_and_modify_build_full_row_mutations() {
        let mapping = single_key_mapping();
        let values = vec![
            Cell::String("p1".to_string()),
            Cell::String("widget".to_string()),
        ];

        let insert = build_mutation(EventKind::Insert, &mapping, values.clone()).unwrap();
        assert_eq!(
            insert,
            Mutation::insert(
                "Products",
                mapping.target_cols.clone(),
                values.clone()
            )
        );

        let modify = build_mutation(EventKind::Modify, &mapping, values.clone()).unwrap();
        assert_eq!(
            modify,
            Mutation::insert_or_update("Products", mapping.target_cols.clone(), values)
        );
    }
}
