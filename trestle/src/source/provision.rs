use tracing::info;

use crate::bail;
use crate::error::{ErrorKind, TrestleResult};
use crate::source::SourceAdmin;

/// Ensures the source table has a stream that can drive replication and
/// returns its identifier.
///
/// An existing `KEYS_ONLY` or `OLD_IMAGE` stream is a hard failure: removes
/// need only keys (present in every record envelope) but inserts and
/// modifications need the new image, which those views never carry. A table
/// without a stream gets one enabled with `NEW_AND_OLD_IMAGES`.
pub async fn ensure_stream<A: SourceAdmin>(admin: &A, table: &str) -> TrestleResult<String> {
    let settings = admin.describe_stream_settings(table).await?;

    match settings.view {
        Some(view) if view.carries_new_image() => {
            let Some(stream_arn) = settings.stream_arn else {
                bail!(
                    ErrorKind::StreamMissing,
                    "table reports a stream specification but no stream identifier",
                    table
                );
            };

            info!(table = %table, stream_arn = %stream_arn, "reusing existing stream");
            Ok(stream_arn)
        }
        Some(view) => bail!(
            ErrorKind::IncompatibleStreamView,
            "existing stream cannot carry replication data",
            format!("table {table} has a stream with {view:?} view type")
        ),
        None => {
            let stream_arn = admin.enable_stream(table).await?;
            info!(table = %table, stream_arn = %stream_arn, "enabled new stream");
            Ok(stream_arn)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::source::FakeSourceAdmin;
    use crate::types::{StreamView, TableStreamSettings};

    #[tokio::test]
    async fn keys_only_stream_is_rejected() {
        let admin = FakeSourceAdmin::new();
        admin.set_settings(
            "Products",
            TableStreamSettings {
                view: Some(StreamView::KeysOnly),
                stream_arn: Some("arn:keys-only".to_string()),
            },
        );

        let err = ensure_stream(&admin, "Products").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IncompatibleStreamView);
        assert!(admin.enabled_tables().is_empty());
    }

    #[tokio::test]
    async fn old_image_stream_is_rejected() {
        let admin = FakeSourceAdmin::new();
        admin.set_settings(
            "Products",
            TableStreamSettings {
                view: Some(StreamView::OldImage),
                stream_arn: Some("arn:old-image".to_string()),
            },
        );

        let err = ensure_stream(&admin, "Products").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IncompatibleStreamView);
    }

    #[tokio::test]
    async fn new_image_stream_is_reused() {
        let admin = FakeSourceAdmin::new();
        admin.set_settings(
            "Products",
            TableStreamSettings {
                view: Some(StreamView::NewImage),
                stream_arn: Some("arn:new-image".to_string()),
            },
        );

        let stream_arn = ensure_stream(&admin, "Products").await.unwrap();
        assert_eq!(stream_arn, "arn:new-image");
        assert!(admin.enabled_tables().is_empty());
    }

    #[tokio::test]
    async fn missing_stream_is_enabled() {
        let admin = FakeSourceAdmin::new();

        let stream_arn = ensure_stream(&admin, "Products").await.unwrap();
        assert_eq!(stream_arn, "arn:enabled:Products");
        assert_eq!(admin.enabled_tables(), vec!["Products".to_string()]);
    }

    #[tokio::test]
    async fn stream_without_arn_is_an_error() {
        let admin = FakeSourceAdmin::new();
        admin.set_settings(
            "Products",
            TableStreamSettings {
                view: Some(StreamView::NewAndOldImages),
                stream_arn: None,
            },
        );

        let err = ensure_stream(&admin, "Products").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StreamMissing);
    }
}
