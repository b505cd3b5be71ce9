use std::fmt;

/// A single Spanner-typed value produced by row conversion.
///
/// Variants cover exactly the Spanner types the DynamoDB type mapping can
/// produce. `Numeric` keeps the source's decimal string form: DynamoDB
/// numbers exceed both `i64` and `f64`, and Spanner accepts NUMERIC values
/// as strings on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Absent attribute or explicit NULL. Legal only for non-key columns.
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Numeric(String),
    StringArray(Vec<String>),
    NumericArray(Vec<String>),
    BytesArray(Vec<Vec<u8>>),
}

impl Cell {
    /// True for the nil slot marker.
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => write!(f, "NULL"),
            Cell::Bool(value) => write!(f, "{value}"),
            Cell::Int64(value) => write!(f, "{value}"),
            Cell::Float64(value) => write!(f, "{value}"),
            Cell::String(value) => write!(f, "{value}"),
            Cell::Bytes(value) => write!(f, "<{} bytes>", value.len()),
            Cell::Numeric(value) => write!(f, "{value}"),
            Cell::StringArray(values) => write!(f, "{values:?}"),
            Cell::NumericArray(values) => write!(f, "{values:?}"),
            Cell::BytesArray(values) => {
                write!(f, "<{} byte arrays>", values.len())
            }
        }
    }
}
