//! Configuration for the `bucketops` command line tool.
//!
//! Configuration is loaded from the following sources, with later sources taking precedence:
//!
//! 1. Defaults
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Environment variables (prefixed with `BUCKETOPS__`)
//!
//! Environment variables use double underscores (`__`) to denote nested configuration structures:
//!
//! - `BUCKETOPS__STORAGE__TYPE=filesystem` sets the storage type
//! - `BUCKETOPS__STORAGE__PATH=/data` sets the directory
//! - `BUCKETOPS__RETRY__BASE_DELAY=250ms` sets the initial backoff delay
//!
//! The same configuration in YAML:
//!
//! ```yaml
//! storage:
//!   type: filesystem
//!   path: /data
//!
//! retry:
//!   base_delay: 250ms
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use bucketops_client::RetryPolicy;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "BUCKETOPS__";

/// Storage backend configuration.
///
/// The `type` field in YAML or `__TYPE` in environment variables determines which variant is used.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Storage {
    /// Local filesystem storage (type `"filesystem"`).
    ///
    /// Buckets are directories below `path`, and objects are files within them.
    ///
    /// ```yaml
    /// storage:
    ///   type: filesystem
    ///   path: /data
    /// ```
    FileSystem {
        /// Root directory containing one directory per bucket.
        ///
        /// Defaults to `"data"`, relative to the working directory.
        path: PathBuf,
    },

    /// Process-local storage that is discarded on exit (type `"memory"`).
    ///
    /// Only useful to try out commands without touching real data.
    Memory,

    /// S3 or an S3-compatible service (type `"s3"`).
    ///
    /// Credentials are resolved from the standard AWS environment variables, profiles or instance
    /// metadata. Requires the `s3` feature.
    ///
    /// ```yaml
    /// storage:
    ///   type: s3
    ///   endpoint: http://localhost:9000
    ///   region: us-east-1
    ///   path_style: true
    /// ```
    S3 {
        /// Custom endpoint URL, for example for MinIO. Uses the AWS endpoint if unset.
        #[serde(default)]
        endpoint: Option<String>,
        /// Region override. Uses the region of the environment if unset.
        #[serde(default)]
        region: Option<String>,
        /// Address buckets by path instead of by virtual host.
        #[serde(default)]
        path_style: bool,
    },
}

/// Log output format.
///
/// Controls how log messages are formatted. The format can be explicitly specified or
/// auto-detected based on whether output is to a TTY.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Pretty printing with colors.
    Pretty,

    /// Simplified plain text output.
    ///
    /// ```text
    /// 2024-05-02T09:41:12.104Z  INFO bucketops_client::delete: prefix is empty pages=3 objects=8
    /// ```
    Simplified,

    /// Dump out JSON lines.
    Json,
}

/// The logging format parse error.
#[derive(Clone, Debug)]
pub struct FormatParseError(String);

impl fmt::Display for FormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"error parsing "{}" as format: expected one of "auto", "pretty", "simplified", "json""#,
            self.0
        )
    }
}

impl std::error::Error for FormatParseError {}

impl std::str::FromStr for LogFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let result = match s {
            "" => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("auto") => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            s if s.eq_ignore_ascii_case("simplified") => LogFormat::Simplified,
            s if s.eq_ignore_ascii_case("json") => LogFormat::Json,
            s => return Err(FormatParseError(s.into())),
        };

        Ok(result)
    }
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration. Logs are always written to stderr.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Minimum log level to output: `TRACE`, `DEBUG`, `INFO`, `WARN`, `ERROR` or `OFF`.
    ///
    /// Defaults to `WARN`, so that only command output reaches the terminal. `RUST_LOG` takes
    /// precedence if it is set.
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format. Defaults to [`LogFormat::Auto`].
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::WARN,
            format: LogFormat::Auto,
        }
    }
}

/// Main configuration struct for the `bucketops` tool.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// The storage backend that commands operate on.
    pub storage: Storage,
    /// How transient backend failures are retried.
    pub retry: RetryPolicy,
    /// Log verbosity and format.
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: Storage::FileSystem {
                path: PathBuf::from("data"),
            },
            retry: RetryPolicy::default(),
            logging: Logging::default(),
        }
    }
}

impl Config {
    /// Loads the configuration from defaults, the optional YAML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }
}
