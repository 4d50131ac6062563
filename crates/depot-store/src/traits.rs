use std::io::Read;

use depot_types::Digest;

use crate::error::{StoreError, StoreResult};

/// One blob to add, with an optional digest the content must hash to.
///
/// The expected digest protects against transport corruption: a mismatch
/// rejects that blob without committing it.
pub struct AddObjectRequest {
    pub data: Vec<u8>,
    pub expected: Option<Digest>,
}

impl AddObjectRequest {
    /// Add content with no expected digest (trusted local data).
    pub fn unchecked(data: Vec<u8>) -> Self {
        Self { data, expected: None }
    }

    /// Add content that must hash to `expected`.
    pub fn checked(data: Vec<u8>, expected: Digest) -> Self {
        Self { data, expected: Some(expected) }
    }
}

/// Per-item result of a batch add.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddObjectOutcome {
    /// The blob was written; it was not previously present.
    Stored(Digest),
    /// Identical content was already present; nothing was written.
    Present(Digest),
    /// The expected digest did not match the content; nothing was written.
    Corrupt { expected: Digest, computed: Digest },
}

impl AddObjectOutcome {
    /// The committed digest, or `None` for a rejected blob.
    pub fn digest(&self) -> Option<Digest> {
        match self {
            Self::Stored(digest) | Self::Present(digest) => Some(*digest),
            Self::Corrupt { .. } => None,
        }
    }

    /// Convert to a `Result`, mapping rejection to [`StoreError::CorruptData`].
    pub fn into_result(self) -> StoreResult<Digest> {
        match self {
            Self::Stored(digest) | Self::Present(digest) => Ok(digest),
            Self::Corrupt { expected, computed } => {
                Err(StoreError::CorruptData { expected, computed })
            }
        }
    }
}

/// Content-addressed blob repository.
///
/// All implementations must satisfy these invariants:
/// - An object exists iff it was explicitly added and never deleted.
/// - Identical content maps to the same digest and is stored at most once;
///   re-adding is a no-op beyond bookkeeping (idempotent under retry).
/// - A blob whose expected digest mismatches its content is rejected
///   without affecting the rest of its batch.
pub trait ObjectStore: Send + Sync {
    /// Add a batch of blobs, returning one outcome per request in order.
    ///
    /// The batch-level `Err` is reserved for storage failure; per-blob
    /// digest mismatches are reported in the outcome vector.
    fn add_objects(&self, requests: Vec<AddObjectRequest>) -> StoreResult<Vec<AddObjectOutcome>>;

    /// Membership test. Does not allocate or fetch object bodies.
    fn check_objects(&self, digests: &[Digest]) -> StoreResult<Vec<bool>>;

    /// Stream object bodies, one per requested digest, in request order.
    ///
    /// Fails with [`StoreError::NotFound`] if any digest is absent.
    fn get_objects(&self, digests: &[Digest]) -> StoreResult<Box<dyn ObjectsReader>>;

    /// Delete an object. Returns `true` if it existed.
    ///
    /// This is the garbage-collection entry point; collection policy
    /// (refcounting, mark-and-sweep) lives outside the store.
    fn delete_object(&self, digest: &Digest) -> StoreResult<bool>;

    /// Number of objects currently stored.
    fn object_count(&self) -> StoreResult<u64>;

    /// Total bytes across all stored objects.
    fn total_bytes(&self) -> StoreResult<u64>;
}

/// Ordered, lazy sequence of object bodies.
///
/// Each call to [`next_object`](Self::next_object) yields the size and a
/// reader for the next requested object. The returned reader borrows the
/// `ObjectsReader` mutably, so at most one body is in flight at a time:
/// drop (or drain) it before requesting the next.
pub trait ObjectsReader: Send {
    /// The next object body, in request order.
    ///
    /// Fails with [`StoreError::ReaderExhausted`] once every requested
    /// object has been yielded.
    fn next_object(&mut self) -> StoreResult<(u64, Box<dyn Read + Send + '_>)>;

    /// Number of objects not yet yielded.
    fn remaining(&self) -> usize;
}
