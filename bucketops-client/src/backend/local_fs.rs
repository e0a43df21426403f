use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};

use super::common::{Backend, BackendError, BackendResult, GetResponse, ListPage, PutResponse};
use super::in_memory::DEFAULT_PAGE_SIZE;
use crate::object::{DeleteBatch, ObjectRef};

/// Suffix of directories holding the keys that share a prefix segment.
const DIR_SUFFIX: &str = ".d";
/// Suffix of files holding object payloads.
const FILE_SUFFIX: &str = ".f";

/// A [`Backend`] storing objects as files below a root directory.
///
/// Objects live at `<root>/<bucket>/<key>`, where `/` in keys maps to nested directories. Every
/// directory is named `<segment>.d` and every object file `<segment>.f`, so a key can be both an
/// object and the prefix of other keys, and segments such as `..` or empty ones stay inside the
/// bucket. The filesystem does not keep content types, so they are not reported on get.
#[derive(Debug)]
pub struct LocalFs {
    path: PathBuf,
    page_size: usize,
}

impl LocalFs {
    /// Creates a backend rooted at `path`. The directory is created on first write.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets the maximum number of keys returned per listing page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn bucket_path(&self, bucket: &str) -> BackendResult<PathBuf> {
        let mut components = Path::new(bucket).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Ok(self.path.join(name)),
            _ => Err(BackendError::terminal(format!(
                "`{bucket}` is not a valid bucket directory"
            ))),
        }
    }

    fn object_path(&self, bucket: &str, key: &str) -> BackendResult<PathBuf> {
        if key.contains('\0') {
            return Err(BackendError::terminal("object keys must not contain NUL"));
        }

        let mut path = self.bucket_path(bucket)?;
        let (prefix, name) = match key.rsplit_once('/') {
            Some((prefix, name)) => (Some(prefix), name),
            None => (None, key),
        };
        for segment in prefix.into_iter().flat_map(|prefix| prefix.split('/')) {
            path.push(format!("{segment}{DIR_SUFFIX}"));
        }
        path.push(format!("{name}{FILE_SUFFIX}"));
        Ok(path)
    }

    /// Collects all keys of a bucket, walking directories with an explicit stack.
    async fn walk_bucket(&self, bucket: &str) -> BackendResult<Vec<String>> {
        let root = self.bucket_path(bucket)?;
        let mut keys = Vec::new();
        let mut pending = vec![root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(BackendError::io("reading directory", err)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|err| BackendError::io("reading directory entry", err))?
            {
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|err| BackendError::io("reading file type", err))?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if let Some(key) = key_from_path(&root, &path) {
                    keys.push(key);
                }
            }
        }

        keys.sort_unstable();
        Ok(keys)
    }
}

/// Removes the directories of `path` that became empty, up to the bucket directory.
async fn prune_empty_dirs(bucket_dir: &Path, path: &Path) {
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir == bucket_dir || !dir.starts_with(bucket_dir) {
            break;
        }
        // Fails for non-empty directories, which also ends the walk upwards.
        if tokio::fs::remove_dir(dir).await.is_err() {
            break;
        }
        current = dir.parent();
    }
}

/// Reverses the path mapping of [`LocalFs::object_path`].
///
/// Entries that do not follow the naming scheme are not objects and yield `None`.
fn key_from_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let count = relative.components().count();

    let mut segments = Vec::with_capacity(count);
    for (index, component) in relative.components().enumerate() {
        let name = component.as_os_str().to_str()?;
        let suffix = if index + 1 == count {
            FILE_SUFFIX
        } else {
            DIR_SUFFIX
        };
        segments.push(name.strip_suffix(suffix)?);
    }
    Some(segments.join("/"))
}

#[async_trait::async_trait]
impl Backend for LocalFs {
    fn name(&self) -> &'static str {
        "local-fs"
    }

    #[tracing::instrument(level = "trace", fields(%object), skip_all)]
    async fn get_object(&self, object: &ObjectRef) -> BackendResult<Option<GetResponse>> {
        let path = self.object_path(object.bucket(), object.key())?;
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::NotFound | ErrorKind::IsADirectory | ErrorKind::NotADirectory
                ) =>
            {
                tracing::debug!("Object not found");
                return Ok(None);
            }
            Err(err) => return Err(BackendError::io("reading object", err)),
        };

        Ok(Some(GetResponse {
            body: body.into(),
            ..Default::default()
        }))
    }

    #[tracing::instrument(level = "trace", fields(%object), skip_all)]
    async fn put_object(
        &self,
        object: &ObjectRef,
        body: Bytes,
        _content_type: &str,
    ) -> BackendResult<PutResponse> {
        let path = self.object_path(object.bucket(), object.key())?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| BackendError::io("creating directories", err))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .await
            .map_err(|err| BackendError::io("opening object for writing", err))?;

        let mut writer = BufWriter::new(file);
        writer
            .write_all(&body)
            .await
            .map_err(|err| BackendError::io("writing object", err))?;
        writer
            .flush()
            .await
            .map_err(|err| BackendError::io("flushing object", err))?;
        writer
            .into_inner()
            .sync_data()
            .await
            .map_err(|err| BackendError::io("syncing object", err))?;

        Ok(PutResponse::default())
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn list_objects(&self, bucket: &str, prefix: &str) -> BackendResult<ListPage> {
        let mut matching = self
            .walk_bucket(bucket)
            .await?
            .into_iter()
            .filter(|key| key.starts_with(prefix));

        let keys: Vec<_> = matching.by_ref().take(self.page_size).collect();
        let truncated = matching.next().is_some();

        Ok(ListPage { keys, truncated })
    }

    #[tracing::instrument(level = "trace", fields(objects = batch.len()), skip_all)]
    async fn delete_objects(&self, bucket: &str, batch: &DeleteBatch) -> BackendResult<()> {
        let bucket_dir = self.bucket_path(bucket)?;
        for key in batch.keys() {
            let path = self.object_path(bucket, key)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => prune_empty_dirs(&bucket_dir, &path).await,
                Err(err) if err.kind() == ErrorKind::NotFound => (),
                Err(err) => return Err(BackendError::io("deleting object", err)),
            }
        }
        Ok(())
    }
}
