//! # Bucketops Client
//!
//! A client-side access layer over an object storage service. It fetches objects in a selectable
//! representation with optional gzip decompression, stores structured values as JSON, and empties
//! whole key prefixes page by page. Calls that the storage [`Backend`] reports as transient are
//! retried with exponential backoff.
//!
//! ## Usage
//!
//! ```
//! use bucketops_client::{Client, FormattedResult, InMemoryBackend, OutputFormat, RetryPolicy};
//! use serde_json::json;
//!
//! #[tokio::main]
//! # async fn main() -> bucketops_client::Result<()> {
//!     let client = Client::new(InMemoryBackend::new(), RetryPolicy::default());
//!
//!     client
//!         .put_json_object("reports", "2024/summary.json", &json!({"total": 3}))
//!         .await?;
//!
//!     let result = client
//!         .get_object("reports", "2024/summary.json", OutputFormat::Parsed, false)
//!         .await?;
//!     assert_eq!(result, FormattedResult::Parsed(json!({"total": 3})));
//!
//!     client.empty_prefix("reports", "2024/").await?;
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod backend;
mod client;
mod delete;
mod error;
pub mod format;
mod object;
pub mod retry;

pub use backend::{Backend, BackendError, GetResponse, InMemoryBackend, LocalFs, PutResponse};
pub use client::*;
pub use delete::*;
pub use error::*;
pub use format::{FormatError, FormattedResult, OutputFormat};
pub use object::*;
pub use retry::RetryPolicy;

#[cfg(test)]
mod tests;
