//! Content-addressed object storage for depot.
//!
//! Every regular file referenced by an image is stored here exactly once,
//! keyed by its [`Digest`](depot_types::Digest), regardless of how many
//! images reference it.
//!
//! # Design Rules
//!
//! 1. An object exists iff its digest was explicitly added and never
//!    deleted; identical content is stored at most once.
//! 2. Objects are immutable once written (content-addressing guarantees
//!    this).
//! 3. Adds validate a caller-supplied expected digest when present, so
//!    transport corruption is rejected before anything is committed.
//! 4. Reads stream one object body at a time, in request order; the
//!    borrow checker enforces that each body is drained or dropped before
//!    the next is requested.
//! 5. The store never interprets object contents — it is a pure
//!    key-value store.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use traits::{AddObjectOutcome, AddObjectRequest, ObjectStore, ObjectsReader};
