use std::collections::HashMap;
use std::fmt;

use crate::types::AttributeValue;

/// Kind of change captured by a stream record.
///
/// Every DynamoDB stream record carries exactly one of these; the kind
/// selects both the source image used for conversion and the Spanner
/// mutation flavor built from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A new item was written.
    Insert,
    /// An existing item was overwritten.
    Modify,
    /// An item was deleted; only the key image is populated.
    Remove,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => write!(f, "INSERT"),
            Self::Modify => write!(f, "MODIFY"),
            Self::Remove => write!(f, "REMOVE"),
        }
    }
}

/// A single change record pulled from a shard.
///
/// Immutable envelope around one source item change. `keys` is always
/// populated; `new_image` is populated for [`EventKind::Insert`] and
/// [`EventKind::Modify`] given a `NEW_IMAGE`-capable stream; `old_image`
/// depends on the stream view type and is never required for replication.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    /// Kind of change.
    pub kind: EventKind,
    /// Shard-ordering sequence number, as issued by DynamoDB Streams.
    pub sequence_number: String,
    /// Key attributes of the changed item.
    pub keys: HashMap<String, AttributeValue>,
    /// Item state after the change.
    pub new_image: HashMap<String, AttributeValue>,
    /// Item state before the change, when the stream carries it.
    pub old_image: Option<HashMap<String, AttributeValue>>,
}

impl ChangeRecord {
    /// Returns the image replication reads for this record: the key image
    /// for removes, the new image otherwise.
    pub fn source_image(&self) -> &HashMap<String, AttributeValue> {
        match self.kind {
            EventKind::Remove => &self.keys,
            EventKind::Insert | EventKind::Modify => &self.new_image,
        }
    }
}
