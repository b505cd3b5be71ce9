//! REST commit client for Cloud Spanner.
//!
//! Speaks the `sessions.create` / `sessions.commit` surface directly so the
//! migration attribution header can be attached to every request. Each
//! mutation commits in its own single-use read-write transaction, matching
//! the at-least-once, per-record write model of the streaming pipeline.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use gcp_auth::TokenProvider;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use trestle::error::{ErrorKind, TrestleResult};
use trestle::trestle_error;
use trestle::types::Mutation;
use trestle::writer::SpannerWriter;

use crate::encoding::commit_request;
use crate::metadata::{MIGRATION_METADATA_KEY, MigrationData, migration_metadata_value};

const SPANNER_ENDPOINT: &str = "https://spanner.googleapis.com";
const SPANNER_SCOPES: &[&str] = &["https://www.googleapis.com/auth/spanner.data"];
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Spanner API error response body.
#[derive(Debug, Deserialize)]
struct SpannerErrorResponse {
    error: SpannerError,
}

#[derive(Debug, Deserialize)]
struct SpannerError {
    message: String,
    status: String,
}

/// Session creation response.
#[derive(Debug, Deserialize)]
struct SessionResponse {
    name: String,
}

/// Commit writer bound to one Spanner database.
///
/// Clones share the HTTP connection pool and the cached session. The client
/// lazily creates its session and transparently recreates it once when
/// Spanner reports it gone (sessions idle out after an hour on the server
/// side).
#[derive(Clone)]
pub struct SpannerClient {
    http: reqwest::Client,
    token_provider: Arc<dyn TokenProvider>,
    /// Full database path: `projects/{p}/instances/{i}/databases/{d}`.
    database: String,
    endpoint: String,
    session: Arc<Mutex<Option<String>>>,
    metadata_value: String,
}

impl fmt::Debug for SpannerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpannerClient")
            .field("database", &self.database)
            .field("endpoint", &self.endpoint)
            .field("token_provider", &"<TokenProvider>")
            .finish()
    }
}

impl SpannerClient {
    /// Connects using ambient GCP credentials.
    ///
    /// `database` is the full path
    /// `projects/{project}/instances/{instance}/databases/{database}`.
    pub async fn connect(
        database: impl Into<String>,
        migration_data: &MigrationData,
    ) -> TrestleResult<Self> {
        let token_provider = gcp_auth::provider().await.map_err(|err| {
            trestle_error!(
                ErrorKind::AuthenticationFailed,
                "failed to initialize GCP auth",
                err
            )
        })?;

        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| {
                trestle_error!(
                    ErrorKind::InvalidConfig,
                    "failed to create HTTP client",
                    err
                )
            })?;

        let database = database.into();
        info!(database = %database, "connected Spanner commit writer");

        Ok(Self {
            http,
            token_provider,
            database,
            endpoint: SPANNER_ENDPOINT.to_string(),
            session: Arc::new(Mutex::new(None)),
            metadata_value: migration_metadata_value(migration_data),
        })
    }

    /// Overrides the API endpoint (emulator or test server).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn access_token(&self) -> TrestleResult<String> {
        let token = self
            .token_provider
            .token(SPANNER_SCOPES)
            .await
            .map_err(|err| {
                trestle_error!(
                    ErrorKind::AuthenticationFailed,
                    "failed to get GCP access token",
                    err
                )
            })?;

        Ok(token.as_str().to_string())
    }

    /// Returns the cached session, creating one if needed.
    async fn session(&self) -> TrestleResult<String> {
        let mut session = self.session.lock().await;
        if let Some(name) = session.as_ref() {
            return Ok(name.clone());
        }

        let name = self.create_session().await?;
        debug!(session = %name, "created Spanner session");
        *session = Some(name.clone());

        Ok(name)
    }

    async fn create_session(&self) -> TrestleResult<String> {
        let url = format!("{}/v1/{}/sessions", self.endpoint, self.database);
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.access_token().await?)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|err| {
                trestle_error!(
                    ErrorKind::SpannerSessionFailed,
                    "session request failed",
                    err
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(trestle_error!(
                ErrorKind::SpannerSessionFailed,
                "session creation failed",
                format_spanner_error(status, &body)
            ));
        }

        let session: SessionResponse = response.json().await.map_err(|err| {
            trestle_error!(
                ErrorKind::SpannerSessionFailed,
                "malformed session response",
                err
            )
        })?;

        Ok(session.name)
    }

    async fn invalidate_session(&self) {
        let mut session = self.session.lock().await;
        *session = None;
    }

    /// Commits one mutation in a single-use read-write transaction.
    async fn commit(&self, mutation: &Mutation) -> TrestleResult<()> {
        let body = commit_request(mutation)?;

        // One transparent retry when the cached session has expired
        // server-side; every other failure is the caller's to handle.
        let mut session_recreated = false;
        loop {
            let session = self.session().await?;
            let url = format!("{}/v1/{}:commit", self.endpoint, session);

            let response = self
                .http
                .post(&url)
                .bearer_auth(self.access_token().await?)
                .header(MIGRATION_METADATA_KEY, &self.metadata_value)
                .json(&body)
                .send()
                .await
                .map_err(|err| {
                    trestle_error!(ErrorKind::SpannerWriteFailed, "commit request failed", err)
                })?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }

            let error_body = response.text().await.unwrap_or_default();
            if !session_recreated && is_session_not_found(status, &error_body) {
                warn!(table = mutation.table(), "Spanner session expired, recreating");
                session_recreated = true;
                self.invalidate_session().await;
                continue;
            }

            return Err(trestle_error!(
                ErrorKind::SpannerWriteFailed,
                "commit failed",
                format_spanner_error(status, &error_body)
            ));
        }
    }
}

impl SpannerWriter for SpannerClient {
    async fn apply(&self, mutation: Mutation) -> TrestleResult<()> {
        self.commit(&mutation).await
    }
}

fn is_session_not_found(status: StatusCode, body: &str) -> bool {
    status == StatusCode::NOT_FOUND && body.contains("Session") && body.contains("not found")
}

/// Folds the API error body into one line so the caller's error predicates
/// (notably parent-row-missing) see the server's status and message text.
fn format_spanner_error(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<SpannerErrorResponse>(body) {
        Ok(parsed) => format!("{}: {}", parsed.error.status, parsed.error.message),
        Err(_) if body.is_empty() => format!("HTTP {status}"),
        Err(_) => format!("HTTP {status}: {body}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spanner_error_body_folds_into_status_and_message() {
        let body = r#"{
            "error": {
                "code": 5,
                "message": "Parent row for row [o1] in table OrderItems is missing.",
                "status": "NOT_FOUND"
            }
        }"#;

        let folded = format_spanner_error(StatusCode::NOT_FOUND, body);
        assert_eq!(
            folded,
            "NOT_FOUND: Parent row for row [o1] in table OrderItems is missing."
        );

        // The folded form is what the retry predicate in the core crate sees.
        let err = trestle_error!(ErrorKind::SpannerWriteFailed, "commit failed", folded);
        assert!(err.is_parent_data_missing());
    }

    #[test]
    fn unparseable_error_body_is_preserved() {
        let folded = format_spanner_error(StatusCode::BAD_GATEWAY, "upstream unhappy");
        assert_eq!(folded, "HTTP 502 Bad Gateway: upstream unhappy");
    }

    #[test]
    fn session_not_found_detection() {
        assert!(is_session_not_found(
            StatusCode::NOT_FOUND,
            r#"{"error":{"message":"Session not found: projects/p/instances/i/databases/d/sessions/s","status":"NOT_FOUND"}}"#
        ));
        assert!(!is_session_not_found(
            StatusCode::NOT_FOUND,
            r#"{"error":{"message":"Parent row for row [x] is missing","status":"NOT_FOUND"}}"#
        ));
    }
}
