//! Implementations of the CLI subcommands on top of [`Client`].

use std::io::Write;

use anyhow::{Context, Result};
use bucketops_client::backend::BoxedBackend;
use bucketops_client::{
    Client, EmptyPrefixSummary, FormattedResult, InMemoryBackend, LocalFs, OutputFormat,
    PutResponse,
};
use serde_json::{Value, json};

use crate::config::Storage;

/// Creates the backend described by the storage configuration.
pub async fn backend(storage: &Storage) -> Result<BoxedBackend> {
    let backend: BoxedBackend = match storage {
        Storage::FileSystem { path } => Box::new(LocalFs::new(path)),
        Storage::Memory => Box::new(InMemoryBackend::new()),
        #[cfg(feature = "s3")]
        Storage::S3 {
            endpoint,
            region,
            path_style,
        } => {
            use bucketops_client::backend::{S3Backend, S3BackendConfig};

            let config = S3BackendConfig {
                endpoint: endpoint.clone(),
                region: region.clone(),
                path_style: *path_style,
            };
            Box::new(S3Backend::new(config).await)
        }
        #[cfg(not(feature = "s3"))]
        Storage::S3 { .. } => anyhow::bail!("S3 storage requires the `s3` feature"),
    };

    Ok(backend)
}

/// Fetches an object and writes it to `out`.
pub async fn get(
    client: &Client,
    bucket: &str,
    key: &str,
    output: OutputFormat,
    decompress: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let result = client.get_object(bucket, key, output, decompress).await?;
    write_result(result, out).context("failed to write object")
}

/// Parses `document` as JSON and stores it.
pub async fn put(client: &Client, bucket: &str, key: &str, document: &str) -> Result<PutResponse> {
    let value: Value = serde_json::from_str(document).context("document is not valid JSON")?;
    let response = client.put_json_object(bucket, key, &value).await?;
    tracing::info!(bucket, key, etag = ?response.etag, "stored object");
    Ok(response)
}

/// Deletes all objects below `prefix`.
pub async fn empty(client: &Client, bucket: &str, prefix: &str) -> Result<EmptyPrefixSummary> {
    let summary = client.empty_prefix(bucket, prefix).await?;
    tracing::info!(
        bucket,
        prefix,
        pages = summary.pages,
        objects = summary.objects,
        "emptied prefix"
    );
    Ok(summary)
}

/// Writes a fetched object to `out`.
///
/// Raw payloads are written unchanged. Text gets a trailing newline if it lacks one. Parsed
/// documents are pretty-printed, and full responses are summarized as JSON without the body.
fn write_result(result: FormattedResult, out: &mut dyn Write) -> Result<()> {
    match result {
        FormattedResult::Raw(bytes) => out.write_all(&bytes)?,
        FormattedResult::Text(text) => {
            out.write_all(text.as_bytes())?;
            if !text.ends_with('\n') {
                writeln!(out)?;
            }
        }
        FormattedResult::Parsed(value) => {
            serde_json::to_writer_pretty(&mut *out, &value)?;
            writeln!(out)?;
        }
        FormattedResult::FullResponse(response) => {
            let summary = json!({
                "size": response.body.len(),
                "content_type": response.content_type,
                "content_encoding": response.content_encoding,
                "etag": response.etag,
                "metadata": response.metadata,
            });
            serde_json::to_writer_pretty(&mut *out, &summary)?;
            writeln!(out)?;
        }
    }

    out.flush()?;
    Ok(())
}
