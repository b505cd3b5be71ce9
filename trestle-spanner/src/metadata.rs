//! Migration attribution payload.
//!
//! Every commit carries a `cloud-spanner-migration-metadata` header whose
//! value is the base64-encoded protobuf below, identifying the write as part
//! of a data-conversion run for attribution.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use prost::Message;

/// Request header key carrying the attribution payload.
pub const MIGRATION_METADATA_KEY: &str = "cloud-spanner-migration-metadata";

/// Migration type tag for the streaming data-conversion phase.
pub const MIGRATION_TYPE_DATA_CONVERSION: &str = "dataconv";

/// Attribution payload describing one migration run.
#[derive(Clone, PartialEq, prost::Message)]
pub struct MigrationData {
    /// Identifier of this migration run.
    #[prost(string, tag = "1")]
    pub migration_request_id: String,
    /// Source database kind, e.g. `dynamodb`.
    #[prost(string, tag = "2")]
    pub source: String,
    /// Phase of the migration issuing the writes.
    #[prost(string, tag = "3")]
    pub migration_type: String,
}

impl MigrationData {
    /// Payload for the streaming data-conversion phase.
    pub fn data_conversion(
        migration_request_id: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            migration_request_id: migration_request_id.into(),
            source: source.into(),
            migration_type: MIGRATION_TYPE_DATA_CONVERSION.to_string(),
        }
    }
}

/// Serializes the payload into the header value form.
pub fn migration_metadata_value(data: &MigrationData) -> String {
    BASE64.encode(data.encode_to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_value_round_trips() {
        let data = MigrationData::data_conversion("run-42", "dynamodb");
        let value = migration_metadata_value(&data);

        let bytes = BASE64.decode(value).unwrap();
        let decoded = MigrationData::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, data);
        assert_eq!(decoded.migration_type, "dataconv");
    }
}
