//! Turning fetched payloads into the representation a caller asked for.

use std::fmt;
use std::str::FromStr;

use async_compression::tokio::bufread::GzipDecoder;
use bytes::Bytes;
use tokio::io::AsyncReadExt;

use crate::backend::GetResponse;
use crate::error::{Error, Result};

/// The representation [`get_object`](crate::Client::get_object) returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// The payload bytes.
    Raw,
    /// The payload decoded as UTF-8 text.
    Text,
    /// The payload parsed as a JSON document.
    Parsed,
    /// The backend's response envelope, untouched.
    FullResponse,
}

impl OutputFormat {
    /// The canonical name of this format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Text => "text",
            Self::Parsed => "parsed",
            Self::FullResponse => "full",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let format = match s.to_ascii_lowercase().as_str() {
            "raw" | "buffer" | "bytes" => Self::Raw,
            "text" | "string" => Self::Text,
            "parsed" | "json" => Self::Parsed,
            "full" | "response" | "full_response" => Self::FullResponse,
            _ => {
                return Err(Error::validation(format!(
                    r#"unknown output format "{s}": expected one of "raw", "text", "parsed", "full""#
                )));
            }
        };
        Ok(format)
    }
}

/// A fetched object in the representation selected by an [`OutputFormat`].
#[derive(Clone, Debug, PartialEq)]
pub enum FormattedResult {
    /// See [`OutputFormat::Raw`].
    Raw(Bytes),
    /// See [`OutputFormat::Text`].
    Text(String),
    /// See [`OutputFormat::Parsed`].
    Parsed(serde_json::Value),
    /// See [`OutputFormat::FullResponse`].
    FullResponse(GetResponse),
}

impl FormattedResult {
    /// The format this result was produced for.
    pub fn output_format(&self) -> OutputFormat {
        match self {
            Self::Raw(_) => OutputFormat::Raw,
            Self::Text(_) => OutputFormat::Text,
            Self::Parsed(_) => OutputFormat::Parsed,
            Self::FullResponse(_) => OutputFormat::FullResponse,
        }
    }
}

/// Payload decoding failures.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// The payload is not valid UTF-8.
    #[error("payload is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),
    /// The payload is not a valid JSON document.
    #[error("payload is not valid JSON")]
    Json(#[from] serde_json::Error),
}

/// Converts a fetched response into the requested representation.
///
/// With `decompress`, the body is gunzipped before it is decoded. [`OutputFormat::FullResponse`]
/// ignores `decompress` and returns the envelope as received.
pub async fn format(
    response: GetResponse,
    output: OutputFormat,
    decompress: bool,
) -> Result<FormattedResult> {
    let result = match output {
        OutputFormat::FullResponse => FormattedResult::FullResponse(response),
        OutputFormat::Raw => FormattedResult::Raw(payload(response.body, decompress).await?),
        OutputFormat::Text => {
            let body = payload(response.body, decompress).await?;
            FormattedResult::Text(decode_text(&body)?.to_owned())
        }
        OutputFormat::Parsed => {
            let body = payload(response.body, decompress).await?;
            let value = serde_json::from_str(decode_text(&body)?).map_err(FormatError::from)?;
            FormattedResult::Parsed(value)
        }
    };

    Ok(result)
}

async fn payload(body: Bytes, decompress: bool) -> Result<Bytes> {
    if decompress {
        gunzip(&body).await
    } else {
        Ok(body)
    }
}

fn decode_text(body: &[u8]) -> Result<&str, FormatError> {
    Ok(std::str::from_utf8(body)?)
}

async fn gunzip(compressed: &[u8]) -> Result<Bytes> {
    let mut decoder = GzipDecoder::new(compressed);
    decoder.multiple_members(true);

    let mut buf = Vec::new();
    decoder
        .read_to_end(&mut buf)
        .await
        .map_err(Error::Decompression)?;

    Ok(buf.into())
}
