use std::{borrow::Cow, error, fmt, result};

/// Result alias used across the crate.
pub type TrestleResult<T> = result::Result<T, TrestleError>;

/// Classification of streaming migration errors.
///
/// Each kind maps to one row of the pipeline's error taxonomy: fatal
/// provisioning failures, per-shard failures that end a single worker, and
/// per-record failures that only affect accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// DescribeTable call failed while provisioning the stream
    SourceDescribeFailed,
    /// An existing stream carries a view type that cannot drive replication
    IncompatibleStreamView,
    /// The table reports a stream specification but no stream identifier
    StreamMissing,
    /// UpdateTable failed while enabling the stream
    StreamEnableFailed,
    /// DescribeStream call failed during shard discovery
    ShardListingFailed,
    /// GetShardIterator call failed
    ShardIteratorFailed,
    /// GetRecords call failed
    RecordFetchFailed,
    /// Records expired mid-iteration (recoverable per shard-worker policy)
    TrimmedDataAccess,
    /// Source and target schema snapshots disagree for a table
    SchemaMismatch,
    /// A record reached the write path while no writer was configured
    WriterNotConfigured,
    /// Spanner rejected the commit
    SpannerWriteFailed,
    /// Spanner session could not be created or refreshed
    SpannerSessionFailed,
    /// Could not obtain credentials for an outbound call
    AuthenticationFailed,
    /// A mutation could not be encoded for the wire
    EncodingFailed,
    /// Configuration value failed validation
    InvalidConfig,
}

/// Internal error representation with kind and optional source error.
///
/// Boxed so the public error type stays one pointer wide on the success path.
struct ErrorInner {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<String>,
    source: Option<Box<dyn error::Error + Send + Sync>>,
}

/// Error type for the streaming migration pipeline.
///
/// Carries a stable [`ErrorKind`] for programmatic matching, a static
/// description, and optionally a dynamic detail string and a source error.
/// Construct through [`crate::trestle_error!`] or [`crate::bail!`].
pub struct TrestleError(Box<ErrorInner>);

impl TrestleError {
    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.0.kind
    }

    /// Attaches a source error, preserving kind and description.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: Into<Box<dyn error::Error + Send + Sync>>,
    {
        self.0.source = Some(source.into());
        self
    }

    /// True when the error is DynamoDB Streams reporting expired data.
    ///
    /// The production source maps both the typed
    /// `TrimmedDataAccessException` variant and its string form onto
    /// [`ErrorKind::TrimmedDataAccess`], so callers only ever look at the
    /// kind.
    pub fn is_trimmed_data(&self) -> bool {
        self.0.kind == ErrorKind::TrimmedDataAccess
    }

    /// True when Spanner rejected a write because the interleaved parent row
    /// has not been inserted yet.
    ///
    /// Matches on the server's message text because Spanner exposes no
    /// structured discriminant for this case. Both the gRPC (`NotFound`) and
    /// REST (`NOT_FOUND`) spellings are accepted. If Spanner rewords the
    /// message, the parent-missing retry silently stops applying; this is the
    /// only place that would need updating.
    pub fn is_parent_data_missing(&self) -> bool {
        let text = self.to_string();
        (text.contains("NotFound") || text.contains("NOT_FOUND"))
            && text.contains("Parent row")
            && text.contains("is missing")
    }
}

impl fmt::Debug for TrestleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrestleError")
            .field("kind", &self.0.kind)
            .field("description", &self.0.description)
            .field("detail", &self.0.detail)
            .field("source", &self.0.source)
            .finish()
    }
}

impl fmt::Display for TrestleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.description)?;
        if let Some(detail) = &self.0.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

impl error::Error for TrestleError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.0
            .source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

impl<D> From<(ErrorKind, D)> for TrestleError
where
    D: Into<Cow<'static, str>>,
{
    fn from((kind, description): (ErrorKind, D)) -> Self {
        TrestleError(Box::new(ErrorInner {
            kind,
            description: description.into(),
            detail: None,
            source: None,
        }))
    }
}

impl<D> From<(ErrorKind, D, String)> for TrestleError
where
    D: Into<Cow<'static, str>>,
{
    fn from((kind, description, detail): (ErrorKind, D, String)) -> Self {
        TrestleError(Box::new(ErrorInner {
            kind,
            description: description.into(),
            detail: Some(detail),
            source: None,
        }))
    }
}
