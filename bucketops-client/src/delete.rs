use crate::Client;
use crate::error::Result;
use crate::object::{DeleteBatch, validate_identifier};

/// What [`Client::empty_prefix`] removed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EmptyPrefixSummary {
    /// The number of listing pages that were deleted.
    pub pages: usize,
    /// The total number of deleted objects.
    pub objects: usize,
}

impl Client {
    /// Deletes every object whose key starts with `prefix`.
    ///
    /// The prefix is listed page by page, and each page is removed with one batched delete. Since
    /// deleted keys drop out of the listing, every round lists from the start again, until the
    /// backend returns an empty or non-truncated page.
    ///
    /// On success, no objects are left under `prefix`, unless other writers add objects while
    /// this runs. An empty prefix is rejected, since it would wipe the entire bucket.
    #[tracing::instrument(level = "debug", skip(self), fields(backend = self.backend().name()))]
    pub async fn empty_prefix(&self, bucket: &str, prefix: &str) -> Result<EmptyPrefixSummary> {
        validate_identifier("bucket", bucket)?;
        validate_identifier("prefix", prefix)?;

        let backend = self.backend();
        let mut summary = EmptyPrefixSummary::default();

        loop {
            let page = self
                .call("list", move || backend.list_objects(bucket, prefix))
                .await?;
            if page.keys.is_empty() {
                break;
            }

            let batch = DeleteBatch::from_keys(bucket, page.keys)?;
            let pending = &batch;
            self.call("delete", move || backend.delete_objects(bucket, pending))
                .await?;

            summary.pages += 1;
            summary.objects += batch.len();
            tracing::debug!(
                objects = batch.len(),
                truncated = page.truncated,
                "deleted listing page"
            );

            if !page.truncated {
                break;
            }
        }

        tracing::debug!(pages = summary.pages, objects = summary.objects, "prefix is empty");
        Ok(summary)
    }
}
