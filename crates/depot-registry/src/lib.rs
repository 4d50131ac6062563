//! The authoritative local image registry.
//!
//! Maps image names to committed [`Image`](depot_types::Image) records and
//! owns the staged-commit protocol: an image becomes visible to readers
//! only after every object it references is present in the local store,
//! and at most one staging operation per name is in flight at any time.
//!
//! # Locking
//!
//! Reads take the shared side of a `RwLock` (many concurrent readers);
//! every mutation takes the exclusive side, scoped to that call. The
//! per-name pending table is guarded by a separate short-held `Mutex` so
//! staging never blocks bulk reads.

pub mod auth;
pub mod error;
pub mod names;
pub mod registry;

pub use auth::AuthInfo;
pub use error::{RegistryError, RegistryResult};
pub use names::{validate_directory_name, validate_image_name};
pub use registry::{ImageRegistry, PendingImage};
