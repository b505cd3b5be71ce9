//! Conversion of DynamoDB attribute values into Spanner-typed cells.
//!
//! The mapping follows the migration tool's DynamoDB type map: numbers
//! become NUMERIC (or INT64/FLOAT64 when the inferred schema narrowed them),
//! lists and maps are carried as their JSON form in STRING columns, and the
//! set types become arrays.

use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Map, Value};

use crate::types::{AttributeValue, Cell, SpannerType, TableMapping};

/// Result of converting one source image against a table mapping.
#[derive(Debug, Clone)]
pub struct ConvertedRow {
    /// Spanner values aligned with the mapping's column vectors.
    /// [`Cell::Null`] marks attributes absent from the image.
    pub values: Vec<Cell>,
    /// Source columns whose attribute could not be converted.
    pub bad_cols: Vec<String>,
    /// Raw source representations of every column, for diagnostics.
    pub source_strings: Vec<String>,
}

/// Converts a source image into a Spanner value vector.
///
/// Walks the mapping's column vectors in lockstep. Absent attributes produce
/// [`Cell::Null`] (legal for non-key columns; key attributes are always
/// present in stream images). An attribute whose shape does not match the
/// target type lands in `bad_cols` and the whole record is reported as bad
/// by the caller.
pub fn convert_row(image: &HashMap<String, AttributeValue>, mapping: &TableMapping) -> ConvertedRow {
    let cols = mapping.source.col_names.len();
    let mut values = Vec::with_capacity(cols);
    let mut bad_cols = Vec::new();
    let mut source_strings = Vec::with_capacity(cols);

    for (col, target_type) in mapping
        .source
        .col_names
        .iter()
        .zip(mapping.target_types.iter())
    {
        let Some(attribute) = image.get(col) else {
            values.push(Cell::Null);
            source_strings.push(String::new());
            continue;
        };

        source_strings.push(attribute_to_string(attribute));
        match convert_attribute(attribute, *target_type) {
            Some(cell) => values.push(cell),
            None => {
                bad_cols.push(col.clone());
                values.push(Cell::Null);
            }
        }
    }

    ConvertedRow {
        values,
        bad_cols,
        source_strings,
    }
}

/// Converts one attribute value into the target Spanner type.
///
/// Returns `None` when the attribute's shape cannot satisfy the target type.
fn convert_attribute(attribute: &AttributeValue, target_type: SpannerType) -> Option<Cell> {
    if matches!(attribute, AttributeValue::Null(_)) {
        return Some(Cell::Null);
    }

    match target_type {
        SpannerType::String => match attribute {
            AttributeValue::S(value) => Some(Cell::String(value.clone())),
            AttributeValue::N(value) => Some(Cell::String(value.clone())),
            AttributeValue::Bool(value) => Some(Cell::String(value.to_string())),
            AttributeValue::B(value) => Some(Cell::String(BASE64.encode(value.as_ref()))),
            AttributeValue::L(_) | AttributeValue::M(_) => {
                Some(Cell::String(attribute_to_string(attribute)))
            }
            _ => None,
        },
        SpannerType::Bool => match attribute {
            AttributeValue::Bool(value) => Some(Cell::Bool(*value)),
            _ => None,
        },
        SpannerType::Bytes => match attribute {
            AttributeValue::B(value) => Some(Cell::Bytes(value.as_ref().to_vec())),
            _ => None,
        },
        SpannerType::Numeric => match attribute {
            AttributeValue::N(value) => numeric_cell(value),
            _ => None,
        },
        SpannerType::Int64 => match attribute {
            AttributeValue::N(value) => value.parse::<i64>().ok().map(Cell::Int64),
            _ => None,
        },
        SpannerType::Float64 => match attribute {
            AttributeValue::N(value) => value
                .parse::<f64>()
                .ok()
                .filter(|parsed| parsed.is_finite())
                .map(Cell::Float64),
            _ => None,
        },
        SpannerType::StringArray => match attribute {
            AttributeValue::Ss(values) => Some(Cell::StringArray(values.clone())),
            _ => None,
        },
        SpannerType::NumericArray => match attribute {
            AttributeValue::Ns(values) => {
                if values.iter().all(|value| is_numeric(value)) {
                    Some(Cell::NumericArray(values.clone()))
                } else {
                    None
                }
            }
            _ => None,
        },
        SpannerType::BytesArray => match attribute {
            AttributeValue::Bs(values) => Some(Cell::BytesArray(
                values.iter().map(|blob| blob.as_ref().to_vec()).collect(),
            )),
            _ => None,
        },
    }
}

fn numeric_cell(value: &str) -> Option<Cell> {
    if is_numeric(value) {
        Some(Cell::Numeric(value.to_string()))
    } else {
        None
    }
}

/// DynamoDB number strings must parse to a finite decimal. Oversized values
/// lose precision under `f64` but the original string is what gets written.
fn is_numeric(value: &str) -> bool {
    value
        .parse::<f64>()
        .map(|parsed| parsed.is_finite())
        .unwrap_or(false)
}

/// Renders an attribute value in its DynamoDB JSON form, for list/map
/// conversion and for bad-record diagnostics.
pub fn attribute_to_string(attribute: &AttributeValue) -> String {
    attribute_to_json(attribute).to_string()
}

fn attribute_to_json(attribute: &AttributeValue) -> Value {
    match attribute {
        AttributeValue::S(value) => tagged("S", Value::String(value.clone())),
        AttributeValue::N(value) => tagged("N", Value::String(value.clone())),
        AttributeValue::Bool(value) => tagged("BOOL", Value::Bool(*value)),
        AttributeValue::Null(value) => tagged("NULL", Value::Bool(*value)),
        AttributeValue::B(value) => tagged("B", Value::String(BASE64.encode(value.as_ref()))),
        AttributeValue::Ss(values) => tagged(
            "SS",
            Value::Array(values.iter().cloned().map(Value::String).collect()),
        ),
        AttributeValue::Ns(values) => tagged(
            "NS",
            Value::Array(values.iter().cloned().map(Value::String).collect()),
        ),
        AttributeValue::Bs(values) => tagged(
            "BS",
            Value::Array(
                values
                    .iter()
                    .map(|blob| Value::String(BASE64.encode(blob.as_ref())))
                    .collect(),
            ),
        ),
        AttributeValue::L(values) => tagged(
            "L",
            Value::Array(values.iter().map(attribute_to_json).collect()),
        ),
        AttributeValue::M(values) => {
            let mut entries: Vec<_> = values.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));

            let mut map = Map::new();
            for (key, value) in entries {
                map.insert(key.clone(), attribute_to_json(value));
            }
            tagged("M", Value::Object(map))
        }
        _ => tagged("?", Value::Null),
    }
}

fn tagged(tag: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(tag.to_string(), value);
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodbstreams::primitives::Blob;

    use crate::types::{SourceTable, SpannerType};

    fn mapping(types: Vec<SpannerType>) -> TableMapping {
        let col_names: Vec<String> = (0..types.len()).map(|i| format!("c{i}")).collect();
        TableMapping {
            source: SourceTable {
                name: "T".to_string(),
                col_names: col_names.clone(),
                primary_keys: vec!["c0".to_string()],
            },
            target_table: "T".to_string(),
            target_cols: col_names,
            target_types: types,
        }
    }

    fn image(entries: Vec<(&str, AttributeValue)>) -> HashMap<String, AttributeValue> {
        entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect()
    }

    #[test]
    fn converts_scalars_to_matching_targets() {
        let mapping = mapping(vec![
            SpannerType::String,
            SpannerType::Numeric,
            SpannerType::Int64,
            SpannerType::Float64,
            SpannerType::Bool,
            SpannerType::Bytes,
        ]);
        let image = image(vec![
            ("c0", AttributeValue::S("a".to_string())),
            ("c1", AttributeValue::N("12.50".to_string())),
            ("c2", AttributeValue::N("42".to_string())),
            ("c3", AttributeValue::N("2.5".to_string())),
            ("c4", AttributeValue::Bool(true)),
            ("c5", AttributeValue::B(Blob::new(vec![1u8, 2, 3]))),
        ]);

        let row = convert_row(&image, &mapping);
        assert!(row.bad_cols.is_empty());
        assert_eq!(
            row.values,
            vec![
                Cell::String("a".to_string()),
                Cell::Numeric("12.50".to_string()),
                Cell::Int64(42),
                Cell::Float64(2.5),
                Cell::Bool(true),
                Cell::Bytes(vec![1, 2, 3]),
            ]
        );
    }

    #[test]
    fn absent_attribute_becomes_null_without_bad_col() {
        let mapping = mapping(vec![SpannerType::String, SpannerType::String]);
        let image = image(vec![("c0", AttributeValue::S("a".to_string()))]);

        let row = convert_row(&image, &mapping);
        assert!(row.bad_cols.is_empty());
        assert_eq!(
            row.values,
            vec![Cell::String("a".to_string()), Cell::Null]
        );
    }

    #[test]
    fn explicit_null_attribute_becomes_null() {
        let mapping = mapping(vec![SpannerType::Numeric]);
        let image = image(vec![("c0", AttributeValue::Null(true))]);

        let row = convert_row(&image, &mapping);
        assert!(row.bad_cols.is_empty());
        assert_eq!(row.values, vec![Cell::Null]);
    }

    #[test]
    fn mismatched_attribute_is_reported_bad() {
        let mapping = mapping(vec![SpannerType::Numeric]);
        let image = image(vec![("c0", AttributeValue::S("not a number".to_string()))]);

        let row = convert_row(&image, &mapping);
        assert_eq!(row.bad_cols, vec!["c0".to_string()]);
        assert_eq!(
            row.source_strings,
            vec![r#"{"S":"not a number"}"#.to_string()]
        );
    }

    #[test]
    fn invalid_number_string_is_reported_bad() {
        let mapping = mapping(vec![SpannerType::Numeric]);
        let image = image(vec![("c0", AttributeValue::N("1e999".to_string()))]);

        let row = convert_row(&image, &mapping);
        assert_eq!(row.bad_cols, vec!["c0".to_string()]);
    }

    #[test]
    fn sets_map_to_arrays() {
        let mapping = mapping(vec![
            SpannerType::StringArray,
            SpannerType::NumericArray,
            SpannerType::BytesArray,
        ]);
        let image = image(vec![
            (
                "c0",
                AttributeValue::Ss(vec!["x".to_string(), "y".to_string()]),
            ),
            (
                "c1",
                AttributeValue::Ns(vec!["1".to_string(), "2.5".to_string()]),
            ),
            ("c2", AttributeValue::Bs(vec![Blob::new(vec![9u8])])),
        ]);

        let row = convert_row(&image, &mapping);
        assert!(row.bad_cols.is_empty());
        assert_eq!(
            row.values,
            vec![
                Cell::StringArray(vec!["x".to_string(), "y".to_string()]),
                Cell::NumericArray(vec!["1".to_string(), "2.5".to_string()]),
                Cell::BytesArray(vec![vec![9]]),
            ]
        );
    }

    #[test]
    fn lists_and_maps_become_json_strings() {
        let mapping = mapping(vec![SpannerType::String]);
        let mut inner = HashMap::new();
        inner.insert("k".to_string(), AttributeValue::N("1".to_string()));
        let image = image(vec![(
            "c0",
            AttributeValue::L(vec![
                AttributeValue::S("a".to_string()),
                AttributeValue::M(inner),
            ]),
        )]);

        let row = convert_row(&image, &mapping);
        assert!(row.bad_cols.is_empty());
        assert_eq!(
            row.values,
            vec![Cell::String(
                r#"{"L":[{"S":"a"},{"M":{"k":{"N":"1"}}}]}"#.to_string()
            )]
        );
    }
}
