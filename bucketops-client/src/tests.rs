use std::collections::VecDeque;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_compression::tokio::bufread::GzipEncoder;
use bytes::Bytes;
use serde_json::json;
use tokio::io::AsyncReadExt;

use super::*;
use crate::backend::{BackendResult, ListPage};

#[derive(Debug, Default)]
struct Calls {
    get: AtomicUsize,
    put: AtomicUsize,
    list: AtomicUsize,
    delete: AtomicUsize,
}

impl Calls {
    fn total(&self) -> usize {
        [&self.get, &self.put, &self.list, &self.delete]
            .iter()
            .map(|counter| counter.load(Ordering::SeqCst))
            .sum()
    }
}

/// Wraps an [`InMemoryBackend`], counting calls and failing them on demand.
#[derive(Debug, Clone)]
struct TestBackend {
    inner: InMemoryBackend,
    calls: Arc<Calls>,
    failures: Arc<Mutex<VecDeque<BackendError>>>,
}

impl TestBackend {
    fn new(inner: InMemoryBackend) -> Self {
        Self {
            inner,
            calls: Arc::default(),
            failures: Arc::default(),
        }
    }

    /// Makes the next `count` calls fail with transient errors numbered from 1.
    fn fail_transiently(&self, count: usize) {
        let mut failures = self.failures.lock().unwrap();
        for n in 1..=count {
            failures.push_back(BackendError::transient(format!("failure {n}")));
        }
    }

    fn fail_terminally(&self) {
        let mut failures = self.failures.lock().unwrap();
        failures.push_back(BackendError::terminal("access denied"));
    }

    fn record(&self, counter: &AtomicUsize) -> BackendResult<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        match self.failures.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl Backend for TestBackend {
    fn name(&self) -> &'static str {
        "test"
    }

    async fn get_object(&self, object: &ObjectRef) -> BackendResult<Option<GetResponse>> {
        self.record(&self.calls.get)?;
        self.inner.get_object(object).await
    }

    async fn put_object(
        &self,
        object: &ObjectRef,
        body: Bytes,
        content_type: &str,
    ) -> BackendResult<PutResponse> {
        self.record(&self.calls.put)?;
        self.inner.put_object(object, body, content_type).await
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> BackendResult<ListPage> {
        self.record(&self.calls.list)?;
        self.inner.list_objects(bucket, prefix).await
    }

    async fn delete_objects(&self, bucket: &str, batch: &DeleteBatch) -> BackendResult<()> {
        self.record(&self.calls.delete)?;
        self.inner.delete_objects(bucket, batch).await
    }
}

fn setup(max_attempts: u32) -> (Client, TestBackend) {
    bucketops_test::tracing::init();
    let backend = TestBackend::new(InMemoryBackend::with_page_size(2));
    let policy = RetryPolicy::new(NonZeroU32::new(max_attempts).unwrap());
    (Client::new(backend.clone(), policy), backend)
}

fn object(key: &str) -> ObjectRef {
    ObjectRef::new("bucket", key).unwrap()
}

async fn gzip(contents: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    GzipEncoder::new(contents)
        .read_to_end(&mut buf)
        .await
        .unwrap();
    buf
}

#[tokio::test]
async fn stores_and_parses_json() {
    let (client, backend) = setup(3);
    let value = json!({"name": "report", "tags": ["a", "b"], "nested": {"count": 2}});

    let ack = client
        .put_json_object("bucket", "report.json", &value)
        .await
        .unwrap();
    assert!(ack.etag.is_some());

    let (_, content_type) = backend.inner.get_stored(&object("report.json")).unwrap();
    assert_eq!(content_type.as_deref(), Some(JSON_CONTENT_TYPE));

    let result = client
        .get_object("bucket", "report.json", OutputFormat::Parsed, false)
        .await
        .unwrap();
    assert_eq!(result, FormattedResult::Parsed(value));
}

#[tokio::test]
async fn stores_serializable_structs() {
    #[derive(serde::Serialize)]
    struct Entry {
        id: u32,
        label: &'static str,
    }

    let (client, _backend) = setup(3);
    let entries = [Entry { id: 1, label: "one" }, Entry { id: 2, label: "two" }];

    client
        .put_json_object("bucket", "entries", &entries[..])
        .await
        .unwrap();

    let result = client
        .get_object("bucket", "entries", OutputFormat::Text, false)
        .await
        .unwrap();
    assert_eq!(
        result,
        FormattedResult::Text(r#"[{"id":1,"label":"one"},{"id":2,"label":"two"}]"#.into())
    );
}

#[tokio::test]
async fn missing_object_is_not_found() {
    let (client, backend) = setup(3);

    let output = "string".parse().unwrap();
    let err = client
        .get_object("b", "missing-key", output, false)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ObjectNotFound { .. }), "{err:?}");
    assert_eq!(err.to_string(), "object not found: b/missing-key");
    assert_eq!(backend.calls.get.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_body_is_not_found_for_every_format() {
    let (client, backend) = setup(3);
    backend.inner.insert(object("empty"), Bytes::new());

    for output in [
        OutputFormat::Raw,
        OutputFormat::Text,
        OutputFormat::Parsed,
        OutputFormat::FullResponse,
    ] {
        for decompress in [false, true] {
            let err = client
                .get_object("bucket", "empty", output, decompress)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::ObjectNotFound { .. }), "{output}: {err:?}");
        }
    }
}

#[tokio::test]
async fn returns_full_response_envelope() {
    let (client, backend) = setup(3);
    backend.inner.insert(object("blob"), "not gzip");

    let result = client
        .get_object("bucket", "blob", OutputFormat::FullResponse, true)
        .await
        .unwrap();

    let FormattedResult::FullResponse(response) = result else {
        panic!("expected the full response, got {result:?}");
    };
    assert_eq!(response.body, "not gzip");
    assert!(response.etag.is_some());
}

#[tokio::test]
async fn decompresses_payloads() {
    let (client, backend) = setup(3);
    backend
        .inner
        .insert(object("log.gz"), gzip(b"line one\nline two\n").await);

    let result = client
        .get_object("bucket", "log.gz", OutputFormat::Text, true)
        .await
        .unwrap();
    assert_eq!(result, FormattedResult::Text("line one\nline two\n".into()));

    let result = client
        .get_object("bucket", "log.gz", OutputFormat::Raw, false)
        .await
        .unwrap();
    assert_ne!(result, FormattedResult::Raw(Bytes::from_static(b"line one\nline two\n")));
}

#[tokio::test(start_paused = true)]
async fn decoding_errors_are_not_retried() {
    let (client, backend) = setup(3);
    backend.inner.insert(object("broken"), "definitely not gzip");

    let err = client
        .get_object("bucket", "broken", OutputFormat::Raw, true)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Decompression(_)), "{err:?}");

    let err = client
        .get_object("bucket", "broken", OutputFormat::Parsed, false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Format(_)), "{err:?}");
    assert!(!err.is_retryable());

    assert_eq!(backend.calls.get.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn validation_fails_before_any_call() {
    let (client, backend) = setup(3);

    let err = client
        .get_object("", "key", OutputFormat::Raw, false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "{err:?}");

    let err = client
        .get_object("bucket", "  ", OutputFormat::Raw, false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "{err:?}");

    for value in [json!(42), json!("text"), json!(null), json!(true)] {
        let err = client
            .put_json_object("bucket", "key", &value)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{value}: {err:?}");
    }

    let err = client
        .put_json_object("", "key", &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "{err:?}");

    assert_eq!(backend.calls.total(), 0);
}

#[tokio::test(start_paused = true)]
async fn retries_transient_get_failures() {
    let (client, backend) = setup(3);
    backend.inner.insert(object("flaky"), "hello");
    backend.fail_transiently(2);

    let result = client
        .get_object("bucket", "flaky", OutputFormat::Text, false)
        .await
        .unwrap();

    assert_eq!(result, FormattedResult::Text("hello".into()));
    assert_eq!(backend.calls.get.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn surfaces_last_transient_failure() {
    let (client, backend) = setup(3);
    backend.inner.insert(object("down"), "hello");
    backend.fail_transiently(10);

    let err = client
        .get_object("bucket", "down", OutputFormat::Text, false)
        .await
        .unwrap_err();

    // The initial call, then three attempts by the retry executor.
    assert_eq!(backend.calls.get.load(Ordering::SeqCst), 4);
    assert!(err.is_retryable());
    assert_eq!(err.to_string(), "transient backend error: failure 4");
}

#[tokio::test(start_paused = true)]
async fn pauses_before_every_retry() {
    let (client, backend) = setup(3);
    backend.inner.insert(object("flaky"), "hello");
    backend.fail_transiently(3);

    let start = tokio::time::Instant::now();
    client
        .get_object("bucket", "flaky", OutputFormat::Text, false)
        .await
        .unwrap();

    // 100ms before handing off, then 100ms and 200ms between the executor's attempts.
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(400), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(500), "{elapsed:?}");
    assert_eq!(backend.calls.get.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn pauses_before_first_retry() {
    let (client, backend) = setup(1);
    backend.fail_transiently(1);

    let start = tokio::time::Instant::now();
    client
        .put_json_object("bucket", "doc", &json!({"ok": true}))
        .await
        .unwrap();

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(100), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(200), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn terminal_failures_are_not_retried() {
    let (client, backend) = setup(3);
    backend.inner.insert(object("locked"), "hello");
    backend.fail_terminally();

    let err = client
        .get_object("bucket", "locked", OutputFormat::Text, false)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Backend(BackendError::Terminal { .. })), "{err:?}");
    assert!(!err.is_retryable());
    assert_eq!(backend.calls.get.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn retries_transient_put_failures() {
    let (client, backend) = setup(2);
    backend.fail_transiently(1);

    client
        .put_json_object("bucket", "doc", &json!({"ok": true}))
        .await
        .unwrap();

    assert_eq!(backend.calls.put.load(Ordering::SeqCst), 2);
    assert!(backend.inner.contains(&object("doc")));
}

#[tokio::test]
async fn empties_prefix_across_pages() {
    let (client, backend) = setup(3);
    for n in 0..6 {
        backend.inner.insert(object(&format!("logs/{n}")), "x");
    }
    backend.inner.insert(object("keep/me"), "x");

    let summary = client.empty_prefix("bucket", "logs/").await.unwrap();

    assert_eq!(summary, EmptyPrefixSummary { pages: 3, objects: 6 });
    assert_eq!(backend.calls.list.load(Ordering::SeqCst), 3);
    assert_eq!(backend.calls.delete.load(Ordering::SeqCst), 3);

    let page = backend.list_objects("bucket", "logs/").await.unwrap();
    assert!(page.keys.is_empty());
    assert!(backend.inner.contains(&object("keep/me")));
}

#[tokio::test]
async fn empty_prefix_without_objects_succeeds() {
    let (client, backend) = setup(3);

    let summary = client.empty_prefix("bucket", "nothing/").await.unwrap();

    assert_eq!(summary, EmptyPrefixSummary::default());
    assert_eq!(backend.calls.list.load(Ordering::SeqCst), 1);
    assert_eq!(backend.calls.delete.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_prefix_rejects_blank_arguments() {
    let (client, backend) = setup(3);
    backend.inner.insert(object("a"), "x");

    let err = client.empty_prefix("bucket", "").await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "{err:?}");

    let err = client.empty_prefix(" ", "a").await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "{err:?}");

    assert_eq!(backend.calls.total(), 0);
    assert!(backend.inner.contains(&object("a")));
}

#[tokio::test(start_paused = true)]
async fn empty_prefix_retries_transient_failures() {
    let (client, backend) = setup(3);
    for n in 0..3 {
        backend.inner.insert(object(&format!("tmp/{n}")), "x");
    }
    backend.fail_transiently(1);

    let summary = client.empty_prefix("bucket", "tmp/").await.unwrap();

    assert_eq!(summary, EmptyPrefixSummary { pages: 2, objects: 3 });
    assert!(backend.inner.is_empty());
}

#[tokio::test(start_paused = true)]
async fn empty_prefix_surfaces_terminal_failures() {
    let (client, backend) = setup(3);
    backend.inner.insert(object("tmp/a"), "x");
    backend.fail_terminally();

    let err = client.empty_prefix("bucket", "tmp/").await.unwrap_err();

    assert!(!err.is_retryable());
    assert_eq!(backend.calls.list.load(Ordering::SeqCst), 1);
    assert!(backend.inner.contains(&object("tmp/a")));
}
