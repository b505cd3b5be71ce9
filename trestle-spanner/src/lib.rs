//! Cloud Spanner commit writer for trestle streaming migrations.
//!
//! Implements the core crate's `SpannerWriter` seam over Spanner's REST
//! commit surface, attaching the migration attribution header to every
//! request.

pub mod client;
mod encoding;
pub mod metadata;

pub use client::SpannerClient;
pub use metadata::{MIGRATION_METADATA_KEY, MigrationData, migration_metadata_value};
