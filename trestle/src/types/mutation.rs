use crate::types::Cell;

/// Spanner's unit of write, built from one stream record.
///
/// `Insert` fails on an existing row (acceptable because bulk load completes
/// before streaming begins and the stream is the only subsequent writer);
/// `InsertOrUpdate` upserts so a row created and modified inside the CDC
/// window replays cleanly; `Delete` addresses the row by its primary key in
/// declared order.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Insert {
        table: String,
        columns: Vec<String>,
        values: Vec<Cell>,
    },
    InsertOrUpdate {
        table: String,
        columns: Vec<String>,
        values: Vec<Cell>,
    },
    Delete {
        table: String,
        /// Key values in declared primary-key order (hash key, then range
        /// key). DynamoDB primary keys have at most two attributes.
        key: Vec<Cell>,
    },
}

impl Mutation {
    pub fn insert(table: impl Into<String>, columns: Vec<String>, values: Vec<Cell>) -> Self {
        Mutation::Insert {
            table: table.into(),
            columns,
            values,
        }
    }

    pub fn insert_or_update(
        table: impl Into<String>,
        columns: Vec<String>,
        values: Vec<Cell>,
    ) -> Self {
        Mutation::InsertOrUpdate {
            table: table.into(),
            columns,
            values,
        }
    }

    pub fn delete(table: impl Into<String>, key: Vec<Cell>) -> Self {
        Mutation::Delete {
            table: table.into(),
            key,
        }
    }

    /// Target table this mutation writes to.
    pub fn table(&self) -> &str {
        match self {
            Mutation::Insert { table, .. }
            | Mutation::InsertOrUpdate { table, .. }
            | Mutation::Delete { table, .. } => table,
        }
    }

    /// Values carried by the mutation, for diagnostic sampling.
    pub fn values(&self) -> &[Cell] {
        match self {
            Mutation::Insert { values, .. } | Mutation::InsertOrUpdate { values, .. } => values,
            Mutation::Delete { key, .. } => key,
        }
    }
}
