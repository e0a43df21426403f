use std::fmt;

use crate::error::{Error, Result};

/// Identifies a single object by bucket and key.
///
/// An `ObjectRef` can only be created through [`ObjectRef::new`], which rejects blank bucket
/// names and keys. It cannot be modified afterwards.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectRef {
    bucket: String,
    key: String,
}

impl ObjectRef {
    /// Creates a reference to the object `key` in `bucket`.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Result<Self> {
        let bucket = bucket.into();
        let key = key.into();
        validate_identifier("bucket", &bucket)?;
        validate_identifier("key", &key)?;
        Ok(Self { bucket, key })
    }

    /// The bucket containing the object.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The key of the object within its bucket.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

pub(crate) fn validate_identifier(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{name} must not be empty")));
    }
    Ok(())
}

/// The objects removed by a single batched delete call.
///
/// A batch is built from one listing page and always targets a single bucket.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeleteBatch {
    objects: Vec<ObjectRef>,
}

impl DeleteBatch {
    /// Builds a batch from the keys of a listing page.
    pub fn from_keys<I>(bucket: &str, keys: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let objects = keys
            .into_iter()
            .map(|key| ObjectRef::new(bucket, key))
            .collect::<Result<_>>()?;
        Ok(Self { objects })
    }

    /// The objects in this batch, in listing order.
    pub fn objects(&self) -> &[ObjectRef] {
        &self.objects
    }

    /// Iterates over the keys in this batch.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.objects.iter().map(ObjectRef::key)
    }

    /// The number of objects in this batch.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if the batch contains no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
