use crate::backend::BackendError;
use crate::format::FormatError;

/// Errors that can happen within the bucketops client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The caller passed malformed input. No request was sent to the backend.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The backend answered successfully, but without a usable payload.
    ///
    /// Backends do not always distinguish a missing object from an empty one, so both are
    /// reported as not found.
    #[error("object not found: {bucket}/{key}")]
    ObjectNotFound {
        /// The bucket that was queried.
        bucket: String,
        /// The key that was queried.
        key: String,
    },

    /// A backend call failed, either transiently after exhausting all retries, or terminally.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The payload could not be decompressed.
    #[error("failed to decompress payload")]
    Decompression(#[source] std::io::Error),

    /// The payload could not be decoded into the requested representation.
    #[error(transparent)]
    Format(#[from] FormatError),
}

impl Error {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Returns `true` if the backend marked the underlying failure as transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Backend(error) => error.is_retryable(),
            _ => false,
        }
    }
}

/// A convenience alias that defaults our [`Error`] type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
