//! The `bucketops` command line tool.
//!
//! This exposes [`bucketops_client`] on the command line: fetching objects, storing JSON
//! documents and emptying key prefixes in the configured storage backend.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

fn main() -> anyhow::Result<()> {
    bucketops_cli::cli::execute()
}
