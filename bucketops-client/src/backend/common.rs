use std::collections::BTreeMap;
use std::fmt::Debug;
use std::io;

use bytes::Bytes;
use thiserror::Error;

use crate::object::{DeleteBatch, ObjectRef};

/// A type-erased [`Backend`] instance.
pub type BoxedBackend = Box<dyn Backend>;

/// Boxed error type used as the cause of a [`BackendError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// The raw envelope of a successful get call, as returned by the backend.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GetResponse {
    /// The payload exactly as stored.
    pub body: Bytes,
    /// The content type recorded for the object, if the backend keeps one.
    pub content_type: Option<String>,
    /// The content encoding recorded for the object, if the backend keeps one.
    pub content_encoding: Option<String>,
    /// An opaque version tag of the object.
    pub etag: Option<String>,
    /// Custom metadata attached to the object.
    pub metadata: BTreeMap<String, String>,
}

/// The acknowledgement of a successful put call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PutResponse {
    /// An opaque version tag of the stored object, if the backend reports one.
    pub etag: Option<String>,
}

/// One page of a prefix listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Keys on this page, in backend order.
    pub keys: Vec<String>,
    /// Whether more keys exist beyond this page.
    pub truncated: bool,
}

/// The storage service the client talks to.
///
/// Implementations own the transport and decide which of their failures are transient by
/// returning [`BackendError::Transient`]. The client never second-guesses that classification.
#[async_trait::async_trait]
pub trait Backend: Debug + Send + Sync + 'static {
    /// The backend name, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Retrieves an object, or `None` if the backend reports it as absent.
    async fn get_object(&self, object: &ObjectRef) -> BackendResult<Option<GetResponse>>;

    /// Stores or overwrites an object with the given content type.
    async fn put_object(
        &self,
        object: &ObjectRef,
        body: Bytes,
        content_type: &str,
    ) -> BackendResult<PutResponse>;

    /// Lists one page of keys under `prefix`, starting from the first remaining key.
    async fn list_objects(&self, bucket: &str, prefix: &str) -> BackendResult<ListPage>;

    /// Deletes all objects of the batch in a single call.
    async fn delete_objects(&self, bucket: &str, batch: &DeleteBatch) -> BackendResult<()>;
}

#[async_trait::async_trait]
impl<B: Backend + ?Sized> Backend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn get_object(&self, object: &ObjectRef) -> BackendResult<Option<GetResponse>> {
        (**self).get_object(object).await
    }

    async fn put_object(
        &self,
        object: &ObjectRef,
        body: Bytes,
        content_type: &str,
    ) -> BackendResult<PutResponse> {
        (**self).put_object(object, body, content_type).await
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> BackendResult<ListPage> {
        (**self).list_objects(bucket, prefix).await
    }

    async fn delete_objects(&self, bucket: &str, batch: &DeleteBatch) -> BackendResult<()> {
        (**self).delete_objects(bucket, batch).await
    }
}

/// Failure of a backend call, classified by the backend itself.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The call may succeed if it is attempted again.
    #[error("transient backend error: {context}")]
    Transient {
        /// What the backend was doing.
        context: String,
        /// The underlying failure, if any.
        #[source]
        cause: Option<BoxError>,
    },

    /// The call will not succeed by attempting it again.
    #[error("backend error: {context}")]
    Terminal {
        /// What the backend was doing.
        context: String,
        /// The underlying failure, if any.
        #[source]
        cause: Option<BoxError>,
    },
}

impl BackendError {
    /// Creates a transient error without an underlying cause.
    pub fn transient(context: impl Into<String>) -> Self {
        Self::Transient {
            context: context.into(),
            cause: None,
        }
    }

    /// Creates a terminal error without an underlying cause.
    pub fn terminal(context: impl Into<String>) -> Self {
        Self::Terminal {
            context: context.into(),
            cause: None,
        }
    }

    /// Attaches the underlying failure to this error.
    pub fn with_cause(self, error: impl Into<BoxError>) -> Self {
        match self {
            Self::Transient { context, .. } => Self::Transient {
                context,
                cause: Some(error.into()),
            },
            Self::Terminal { context, .. } => Self::Terminal {
                context,
                cause: Some(error.into()),
            },
        }
    }

    /// Returns `true` if the backend considers the failure recoverable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Classifies an I/O error from `context`.
    pub(crate) fn io(context: impl Into<String>, error: io::Error) -> Self {
        let base = match error.kind() {
            io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                Self::transient(context)
            }
            _ => Self::terminal(context),
        };
        base.with_cause(error)
    }
}
