//! Storage backends the client can talk to.

mod common;
mod in_memory;
mod local_fs;
#[cfg(feature = "s3")]
mod s3;

pub use common::*;
pub use in_memory::InMemoryBackend;
pub use local_fs::LocalFs;
#[cfg(feature = "s3")]
pub use s3::{S3Backend, S3BackendConfig};
