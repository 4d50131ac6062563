//! Foundation types for depot.
//!
//! This crate provides the identity and metadata types shared by every
//! other depot crate: content digests, image records, filesystem trees,
//! directory namespace nodes, and the name filters used by replication
//! policy.
//!
//! # Key Types
//!
//! - [`Digest`] — Content-addressed identifier (BLAKE3 hash) for stored
//!   objects
//! - [`Image`] — Named, immutable-once-committed filesystem tree plus
//!   metadata
//! - [`FileTree`] — Directory tree whose regular files reference digests
//!   instead of inline content
//! - [`Directory`] — Namespace node under which images are organized
//! - [`Filter`] / [`ImageSelector`] — Anchored name-pattern matching and
//!   the exclude-before-include replication policy

pub mod digest;
pub mod directory;
pub mod error;
pub mod filesystem;
pub mod filter;
pub mod image;

pub use digest::Digest;
pub use directory::Directory;
pub use error::TypeError;
pub use filesystem::{DirectoryEntry, FileEntry, FileTree, SymlinkEntry};
pub use filter::{Filter, ImageSelector};
pub use image::{ComputedFile, Image, Trigger};
