//! Mutation encoding for Spanner's REST commit surface.
//!
//! Values follow Spanner's JSON conventions: INT64 and NUMERIC travel as
//! strings, BYTES as base64, FLOAT64 as a JSON number. The request structs
//! serialize straight into the `sessions.commit` body.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use serde_json::Value;

use trestle::error::{ErrorKind, TrestleResult};
use trestle::trestle_error;
use trestle::types::{Cell, Mutation};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommitRequest {
    single_use_transaction: TransactionOptions,
    mutations: Vec<JsonMutation>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactionOptions {
    read_write: ReadWrite,
}

#[derive(Debug, Serialize)]
struct ReadWrite {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum JsonMutation {
    Insert(WriteMutation),
    InsertOrUpdate(WriteMutation),
    Delete(DeleteMutation),
}

#[derive(Debug, Serialize)]
struct WriteMutation {
    table: String,
    columns: Vec<String>,
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteMutation {
    table: String,
    key_set: KeySet,
}

#[derive(Debug, Serialize)]
struct KeySet {
    keys: Vec<Vec<Value>>,
}

/// Builds the commit body for a single mutation.
pub(crate) fn commit_request(mutation: &Mutation) -> TrestleResult<CommitRequest> {
    let json_mutation = match mutation {
        Mutation::Insert {
            table,
            columns,
            values,
        } => JsonMutation::Insert(write_mutation(table, columns, values)?),
        Mutation::InsertOrUpdate {
            table,
            columns,
            values,
        } => JsonMutation::InsertOrUpdate(write_mutation(table, columns, values)?),
        Mutation::Delete { table, key } => JsonMutation::Delete(DeleteMutation {
            table: table.clone(),
            key_set: KeySet {
                keys: vec![cells_to_json(key)?],
            },
        }),
    };

    Ok(CommitRequest {
        single_use_transaction: TransactionOptions {
            read_write: ReadWrite {},
        },
        mutations: vec![json_mutation],
    })
}

fn write_mutation(
    table: &str,
    columns: &[String],
    values: &[Cell],
) -> TrestleResult<WriteMutation> {
    Ok(WriteMutation {
        table: table.to_string(),
        columns: columns.to_vec(),
        values: vec![cells_to_json(values)?],
    })
}

fn cells_to_json(cells: &[Cell]) -> TrestleResult<Vec<Value>> {
    cells.iter().map(cell_to_json).collect()
}

fn cell_to_json(cell: &Cell) -> TrestleResult<Value> {
    let value = match cell {
        Cell::Null => Value::Null,
        Cell::Bool(value) => Value::Bool(*value),
        Cell::Int64(value) => Value::String(value.to_string()),
        Cell::Float64(value) => {
            let Some(number) = serde_json::Number::from_f64(*value) else {
                return Err(trestle_error!(
                    ErrorKind::EncodingFailed,
                    "non-finite FLOAT64 value cannot be encoded",
                    value
                ));
            };
            Value::Number(number)
        }
        Cell::String(value) => Value::String(value.clone()),
        Cell::Bytes(value) => Value::String(BASE64.encode(value)),
        Cell::Numeric(value) => Value::String(value.clone()),
        Cell::StringArray(values) => Value::Array(
            values
                .iter()
                .map(|value| Value::String(value.clone()))
                .collect(),
        ),
        Cell::NumericArray(values) => Value::Array(
            values
                .iter()
                .map(|value| Value::String(value.clone()))
                .collect(),
        ),
        Cell::BytesArray(values) => Value::Array(
            values
                .iter()
                .map(|value| Value::String(BASE64.encode(value)))
                .collect(),
        ),
    };

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_body_matches_commit_shape() {
        let mutation = Mutation::insert(
            "Products",
            vec!["ProductId".to_string(), "Price".to_string(), "Stock".to_string()],
            vec![
                Cell::String("p1".to_string()),
                Cell::Numeric("12.50".to_string()),
                Cell::Int64(7),
            ],
        );

        let body = serde_json::to_value(commit_request(&mutation).unwrap()).unwrap();
        assert_eq!(
            body,
            json!({
                "singleUseTransaction": { "readWrite": {} },
                "mutations": [{
                    "insert": {
                        "table": "Products",
                        "columns": ["ProductId", "Price", "Stock"],
                        "values": [["p1", "12.50", "7"]],
                    }
                }],
            })
        );
    }

    #[test]
    fn upsert_body_uses_insert_or_update_tag() {
        let mutation = Mutation::insert_or_update(
            "Products",
            vec!["ProductId".to_string()],
            vec![Cell::String("p1".to_string())],
        );

        let body = serde_json::to_value(commit_request(&mutation).unwrap()).unwrap();
        assert!(body["mutations"][0].get("insertOrUpdate").is_some());
    }

    #[test]
    fn delete_body_carries_ordered_key_set() {
        let mutation = Mutation::delete(
            "Orders",
            vec![
                Cell::String("o-1".to_string()),
                Cell::String("i-9".to_string()),
            ],
        );

        let body = serde_json::to_value(commit_request(&mutation).unwrap()).unwrap();
        assert_eq!(
            body["mutations"][0]["delete"],
            json!({
                "table": "Orders",
                "keySet": { "keys": [["o-1", "i-9"]] },
            })
        );
    }

    #[test]
    fn scalar_encodings_follow_spanner_json_conventions() {
        assert_eq!(cell_to_json(&Cell::Null).unwrap(), json!(null));
        assert_eq!(cell_to_json(&Cell::Bool(true)).unwrap(), json!(true));
        assert_eq!(cell_to_json(&Cell::Int64(-3)).unwrap(), json!("-3"));
        assert_eq!(cell_to_json(&Cell::Float64(2.5)).unwrap(), json!(2.5));
        assert_eq!(
            cell_to_json(&Cell::Bytes(vec![1, 2, 3])).unwrap(),
            json!("AQID")
        );
        assert_eq!(
            cell_to_json(&Cell::NumericArray(vec!["1".to_string()])).unwrap(),
            json!(["1"])
        );
    }

    #[test]
    fn non_finite_float_is_an_encoding_error() {
        let err = cell_to_json(&Cell::Float64(f64::NAN)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EncodingFailed);
    }
}
