use std::sync::Arc;

use crate::error::StoreError;

/// Opaque storage key. Keys are assigned by the store and never reused.
pub type DocKey = u64;

/// A stored document blob. Cheap to clone (Arc bump).
pub type Blob = Arc<[u8]>;

/// Abstract document store: blobs in, opaque keys out.
///
/// The store knows nothing about document structure: callers hand it
/// serialized bytes and get back a key. Higher layers (indexes, the
/// collection core) are responsible for interpreting the bytes.
pub trait DocStore: Send + Sync {
    /// Store a new blob and return its key.
    fn insert(&self, blob: Vec<u8>) -> Result<DocKey, StoreError>;

    /// Fetch the blob stored under `key`, if any.
    fn fetch(&self, key: DocKey) -> Result<Option<Blob>, StoreError>;

    /// Overwrite the blob stored under `key`. The swap is atomic:
    /// concurrent readers observe either the old or the new blob.
    fn replace(&self, key: DocKey, blob: Vec<u8>) -> Result<(), StoreError>;

    /// Remove the blob stored under `key`, returning it.
    fn remove(&self, key: DocKey) -> Result<Option<Blob>, StoreError>;

    /// Iterate all live blobs in key (insertion) order, against a
    /// consistent snapshot taken at call time.
    fn scan(&self) -> Box<dyn Iterator<Item = (DocKey, Blob)> + Send>;

    /// Number of live blobs.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total size in bytes of all live blobs.
    fn data_size(&self) -> u64;

    /// Number of blobs removed over the store's lifetime.
    fn removed_count(&self) -> usize;
}
