//! The depot replication engine.
//!
//! A [`ReplicationSession`] keeps a downstream replica's image set
//! consistent with an upstream source: it dials the upstream, consumes an
//! ordered update stream, reconciles local state against the initial full
//! list, downloads missing objects, and commits images through the
//! registry's staged-commit path. Connection loss of any kind drops the
//! session back to `Disconnected` and the backoff/reconnect cycle starts
//! a fresh sweep.
//!
//! The network itself is behind the [`UpstreamTransport`] trait, so the
//! whole state machine is testable against scripted update sequences.

pub mod backoff;
pub mod client;
pub mod error;
pub mod session;
pub mod transport;

pub use backoff::Backoff;
pub use client::{ObjectAdderQueue, ObjectClient};
pub use error::{SyncError, SyncResult};
pub use session::{ReplicationConfig, ReplicationSession, SessionState, SweepReport};
pub use transport::{ObjectStream, UpdateStream, UpstreamTransport};
