//! Schema snapshots and record builders shared across tests.

use std::collections::HashMap;

use crate::types::{
    AttributeValue, ChangeRecord, EventKind, SchemaSnapshot, SourceTable, SpannerType,
    TableMapping,
};

/// Shorthand for a string attribute.
pub fn s(value: &str) -> AttributeValue {
    AttributeValue::S(value.to_string())
}

/// Shorthand for a number attribute.
pub fn n(value: &str) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

/// Single-key table: Products(ProductId STRING PK, Description STRING,
/// Price NUMERIC).
pub fn products_mapping() -> TableMapping {
    TableMapping {
        source: SourceTable {
            name: "Products".to_string(),
            col_names: vec![
                "ProductId".to_string(),
                "Description".to_string(),
                "Price".to_string(),
            ],
            primary_keys: vec!["ProductId".to_string()],
        },
        target_table: "Products".to_string(),
        target_cols: vec![
            "ProductId".to_string(),
            "Description".to_string(),
            "Price".to_string(),
        ],
        target_types: vec![
            SpannerType::String,
            SpannerType::String,
            SpannerType::Numeric,
        ],
    }
}

/// Two-key table whose column order differs from its declared primary-key
/// order: Orders(ItemId, OrderId, Quantity) with primary key
/// (OrderId, ItemId).
pub fn orders_mapping() -> TableMapping {
    TableMapping {
        source: SourceTable {
            name: "Orders".to_string(),
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

/// Snapshot holding both test tables.
pub fn test_schema() -> SchemaSnapshot {
    SchemaSnapshot::new([products_mapping(), orders_mapping()])
}

fn image(attrs: &[(&str, AttributeValue)]) -> HashMap<String, AttributeValue> {
    attrs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

/// Builds an INSERT record with the given new image.
pub fn insert_record(sequence_number: &str, attrs: &[(&str, AttributeValue)]) -> ChangeRecord {
    ChangeRecord {
        kind: EventKind::Insert,
        sequence_number: sequence_number.to_string(),
        keys: HashMap::new(),
        new_image: image(attrs),
        old_image: None,
    }
}

/// Builds a MODIFY record with the given new image.
pub fn modify_record(sequence_number: &str, attrs: &[(&str, AttributeValue)]) -> ChangeRecord {
    ChangeRecord {
        kind: EventKind::Modify,
        sequence_number: sequence_number.to_string(),
        keys: HashMap::new(),
        new_image: image(attrs),
        old_image: None,
    }
}

/// Builds a REMOVE record carrying only the key image.
pub fn remove_record(sequence_number: &str, keys: &[(&str, AttributeValue)]) -> ChangeRecord {
    ChangeRecord {
        kind: EventKind::Remove,
        sequence_number: sequence_number.to_string(),
        keys: image(keys),
        new_image: HashMap::new(),
        old_image: None,
    }
}
