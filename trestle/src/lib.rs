pub mod concurrency;
pub mod config;
pub mod conversions;
pub mod error;
mod macros;
pub mod pipeline;
mod record;
pub mod report;
pub mod source;
pub mod state;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod workers;
pub mod writer;
