use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

use crate::backend::{Backend, BackendError, BackendResult, BoxedBackend, PutResponse};
use crate::error::{Error, Result};
use crate::format::{self, FormattedResult, OutputFormat};
use crate::object::ObjectRef;
use crate::retry::{self, RetryPolicy};

/// The content type stored along with objects written by [`Client::put_json_object`].
pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug)]
struct ClientInner {
    backend: BoxedBackend,
    retry: RetryPolicy,
}

/// A client for reading, writing and bulk-deleting objects in a [`Backend`].
///
/// The client validates inputs before anything is sent, retries calls the backend reports as
/// transient according to its [`RetryPolicy`], and converts payloads into the requested
/// [`OutputFormat`].
///
/// `Client` is cheap to clone; clones share the backend and the policy.
#[derive(Clone, Debug)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Creates a client for `backend` that retries transient failures according to `retry`.
    pub fn new(backend: impl Backend, retry: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                backend: Box::new(backend),
                retry,
            }),
        }
    }

    /// The retry policy this client was created with.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.retry
    }

    pub(crate) fn backend(&self) -> &dyn Backend {
        &*self.inner.backend
    }

    /// Fetches an object and returns it in the `output` representation.
    ///
    /// With `decompress`, the payload is gunzipped before decoding, except for
    /// [`OutputFormat::FullResponse`], which always returns the envelope as received.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if `bucket` or `key` is blank. Nothing is sent in that case.
    /// - [`Error::ObjectNotFound`] if the backend has no object or returns an empty payload.
    /// - [`Error::Backend`] if the call fails terminally, or transiently on every attempt.
    /// - [`Error::Decompression`] or [`Error::Format`] if the payload cannot be decoded.
    #[tracing::instrument(level = "debug", skip(self), fields(backend = self.inner.backend.name()))]
    pub async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        output: OutputFormat,
        decompress: bool,
    ) -> Result<FormattedResult> {
        let object = ObjectRef::new(bucket, key)?;

        let backend = self.backend();
        let target = &object;
        let response = self
            .call("get", move || backend.get_object(target))
            .await?;

        // Backends may report an empty object just like a missing one.
        let response = match response {
            Some(response) if !response.body.is_empty() => response,
            _ => {
                tracing::debug!("object has no payload");
                return Err(Error::ObjectNotFound {
                    bucket: object.bucket().to_owned(),
                    key: object.key().to_owned(),
                });
            }
        };

        format::format(response, output, decompress).await
    }

    /// Serializes `value` as JSON and stores it at `key`.
    ///
    /// Only structured values (JSON objects and arrays) are accepted.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if `bucket` or `key` is blank, or `value` does not serialize to
    ///   an object or array. Nothing is sent in that case.
    /// - [`Error::Backend`] if the call fails terminally, or transiently on every attempt.
    #[tracing::instrument(level = "debug", skip(self, value), fields(backend = self.inner.backend.name()))]
    pub async fn put_json_object<T>(&self, bucket: &str, key: &str, value: &T) -> Result<PutResponse>
    where
        T: Serialize + ?Sized,
    {
        let object = ObjectRef::new(bucket, key)?;

        let value = serde_json::to_value(value)
            .map_err(|err| Error::validation(format!("value cannot be serialized: {err}")))?;
        if !value.is_object() && !value.is_array() {
            return Err(Error::validation("value must be a JSON object or array"));
        }
        let body = serde_json::to_vec(&value)
            .map_err(|err| Error::validation(format!("value cannot be serialized: {err}")))?;
        let body = Bytes::from(body);

        let backend = self.backend();
        let target = &object;
        self.call("put", move || {
            backend.put_object(target, body.clone(), JSON_CONTENT_TYPE)
        })
        .await
    }

    /// Issues a backend call, and hands it to [`retry::with_backoff`] if it fails transiently.
    ///
    /// The first attempt is not counted against the retry policy. Before the hand-off, the client
    /// waits for the policy's first delay, so every retry is preceded by a pause.
    pub(crate) async fn call<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BackendResult<T>>,
    {
        match attempt().await {
            Ok(value) => Ok(value),
            Err(error) if error.is_retryable() => {
                let delay = self.inner.retry.delay_after(1);
                tracing::debug!(operation, %error, ?delay, "transient backend failure");
                tokio::time::sleep(delay).await;

                let value =
                    retry::with_backoff(&self.inner.retry, BackendError::is_retryable, attempt).await?;
                Ok(value)
            }
            Err(error) => Err(error.into()),
        }
    }
}
