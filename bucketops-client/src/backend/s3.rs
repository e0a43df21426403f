use std::fmt;

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use bytes::Bytes;

use super::common::{Backend, BackendError, BackendResult, GetResponse, ListPage, PutResponse};
use crate::object::{DeleteBatch, ObjectRef};

/// Connection settings for [`S3Backend`].
///
/// Credentials are resolved through the default AWS provider chain (environment, profile files,
/// instance metadata).
#[derive(Clone, Debug, Default)]
pub struct S3BackendConfig {
    /// Custom endpoint URL, for S3-compatible services such as MinIO.
    pub endpoint: Option<String>,
    /// Region override. Falls back to the provider chain when `None`.
    pub region: Option<String>,
    /// Use path-style addressing (`endpoint/bucket/key`), required by most self-hosted services.
    pub path_style: bool,
}

/// A [`Backend`] talking to Amazon S3 or an S3-compatible service.
#[derive(Clone)]
pub struct S3Backend {
    client: Client,
}

impl S3Backend {
    /// Creates a backend from the default AWS configuration plus the given overrides.
    pub async fn new(config: S3BackendConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(endpoint) = config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        if let Some(region) = config.region {
            loader = loader.region(Region::new(region));
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.path_style)
            .build();

        Self {
            client: Client::from_conf(s3_config),
        }
    }

    /// Wraps an already configured SDK client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

impl fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Backend").finish_non_exhaustive()
    }
}

/// Classifies an SDK failure: connection problems, throttling and server errors are transient.
fn classify<E>(context: &str, error: &SdkError<E, HttpResponse>) -> BackendError
where
    E: std::error::Error + 'static,
{
    let retryable = match error {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(service) => {
            let status = service.raw().status().as_u16();
            status == 429 || status >= 500
        }
        _ => false,
    };

    let context = format!("{context}: {}", DisplayErrorContext(error));
    if retryable {
        BackendError::transient(context)
    } else {
        BackendError::terminal(context)
    }
}

/// Reports per-key failures of a `DeleteObjects` call as a terminal error.
fn delete_failures(errors: &[aws_sdk_s3::types::Error], total: usize) -> BackendResult<()> {
    let Some(failure) = errors.first() else {
        return Ok(());
    };

    Err(BackendError::terminal(format!(
        "failed to delete {} of {} objects, first `{}`: {}",
        errors.len(),
        total,
        failure.key().unwrap_or_default(),
        failure.message().unwrap_or_default(),
    )))
}

#[async_trait::async_trait]
impl Backend for S3Backend {
    fn name(&self) -> &'static str {
        "s3"
    }

    #[tracing::instrument(level = "trace", fields(%object), skip_all)]
    async fn get_object(&self, object: &ObjectRef) -> BackendResult<Option<GetResponse>> {
        tracing::debug!("Reading from s3 backend");
        let result = self
            .client
            .get_object()
            .bucket(object.bucket())
            .key(object.key())
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|service| service.is_no_such_key()) =>
            {
                tracing::debug!("Object not found");
                return Ok(None);
            }
            Err(err) => return Err(classify("getting object", &err)),
        };

        let content_type = output.content_type().map(str::to_owned);
        let content_encoding = output.content_encoding().map(str::to_owned);
        let etag = output.e_tag().map(str::to_owned);
        let metadata = output
            .metadata()
            .map(|metadata| metadata.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        let body = output
            .body
            .collect()
            .await
            .map_err(|err| BackendError::transient("reading object body").with_cause(err))?
            .into_bytes();

        Ok(Some(GetResponse {
            body,
            content_type,
            content_encoding,
            etag,
            metadata,
        }))
    }

    #[tracing::instrument(level = "trace", fields(%object), skip_all)]
    async fn put_object(
        &self,
        object: &ObjectRef,
        body: Bytes,
        content_type: &str,
    ) -> BackendResult<PutResponse> {
        tracing::debug!("Writing to s3 backend");
        let output = self
            .client
            .put_object()
            .bucket(object.bucket())
            .key(object.key())
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| classify("putting object", &err))?;

        Ok(PutResponse {
            etag: output.e_tag().map(str::to_owned),
        })
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn list_objects(&self, bucket: &str, prefix: &str) -> BackendResult<ListPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .send()
            .await
            .map_err(|err| classify("listing objects", &err))?;

        let keys = output
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_owned))
            .collect();

        Ok(ListPage {
            keys,
            truncated: output.is_truncated().unwrap_or(false),
        })
    }

    #[tracing::instrument(level = "trace", fields(objects = batch.len()), skip_all)]
    async fn delete_objects(&self, bucket: &str, batch: &DeleteBatch) -> BackendResult<()> {
        let identifiers = batch
            .keys()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| BackendError::terminal("building delete request").with_cause(err))?;

        let delete = Delete::builder()
            .set_objects(Some(identifiers))
            .quiet(true)
            .build()
            .map_err(|err| BackendError::terminal("building delete request").with_cause(err))?;

        let output = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|err| classify("deleting objects", &err))?;

        delete_failures(output.errors(), batch.len())
    }
}
