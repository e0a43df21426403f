//! Shared helpers for testing the bucketops crates.
#![warn(missing_docs)]

pub mod tracing;
