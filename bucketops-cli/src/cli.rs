//! Command line parsing and dispatch of the `bucketops` subcommands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use argh::FromArgs;
use bucketops_client::{Client, OutputFormat};

use crate::config::Config;
use crate::{commands, observability};

/// Read, write and bulk-delete objects in an object store.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Get(GetCommand),
    Put(PutCommand),
    Empty(EmptyCommand),
    Version(VersionCommand),
}

/// fetch an object and print it to stdout
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "get")]
struct GetCommand {
    /// the bucket containing the object
    #[argh(positional)]
    bucket: String,

    /// the key of the object
    #[argh(positional)]
    key: String,

    /// output format: raw, text, parsed or full (default: text)
    #[argh(option, short = 'f', default = "OutputFormat::Text")]
    format: OutputFormat,

    /// gunzip the payload before decoding it
    #[argh(switch, short = 'd')]
    decompress: bool,
}

/// store a JSON document
///
/// The document is either given inline or read from a file. It must be a JSON object or array.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "put")]
struct PutCommand {
    /// the bucket to store the object in
    #[argh(positional)]
    bucket: String,

    /// the key of the object
    #[argh(positional)]
    key: String,

    /// the JSON document
    #[argh(positional)]
    document: Option<String>,

    /// read the JSON document from this file instead
    #[argh(option)]
    file: Option<PathBuf>,
}

/// delete every object below a key prefix
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "empty")]
struct EmptyCommand {
    /// the bucket to delete from
    #[argh(positional)]
    bucket: String,

    /// the key prefix, for example `runs/2024/`
    #[argh(positional)]
    prefix: String,
}

/// print the bucketops version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    // Special switch to just print the version and exit.
    if let Command::Version(_) = args.command {
        println!("bucketops {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::load(args.config.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("main-rt")
        .enable_all()
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing(&config);
    tracing::debug!(?config);

    runtime.block_on(async move {
        let backend = commands::backend(&config.storage).await?;
        let client = Client::new(backend, config.retry);

        match args.command {
            Command::Get(cmd) => {
                let mut stdout = std::io::stdout().lock();
                commands::get(
                    &client,
                    &cmd.bucket,
                    &cmd.key,
                    cmd.format,
                    cmd.decompress,
                    &mut stdout,
                )
                .await
            }
            Command::Put(cmd) => {
                let document = match (cmd.document, cmd.file) {
                    (Some(document), None) => document,
                    (None, Some(path)) => tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("failed to read {}", path.display()))?,
                    _ => anyhow::bail!("pass either a document or --file"),
                };
                let response = commands::put(&client, &cmd.bucket, &cmd.key, &document).await?;
                if let Some(etag) = response.etag {
                    println!("{etag}");
                }
                Ok(())
            }
            Command::Empty(cmd) => {
                let summary = commands::empty(&client, &cmd.bucket, &cmd.prefix).await?;
                println!("deleted {} objects", summary.objects);
                Ok(())
            }
            Command::Version(VersionCommand {}) => unreachable!(),
        }
    })
}
