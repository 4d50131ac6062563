use async_trait::async_trait;
use chrono::{DateTime, Utc};
use depot_protocol::{AddObjectResult, GetImageRequest, ImageUpdate, ObjectPayload, UpdateStreamRequest};
use depot_types::{Digest, Image};

use crate::error::SyncResult;

/// The upstream image server, as seen by a downstream replica.
///
/// Dialing, framing, and authentication live behind implementations of
/// this trait; the replication session only sees these calls. Scripted
/// in-memory implementations drive the session in tests.
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    /// Open the long-lived update stream.
    ///
    /// The stream first replays the upstream's full current image list
    /// (the initial sweep), marks its end with the empty-name sentinel,
    /// and then carries incremental updates until the connection drops.
    async fn open_update_stream(
        &self,
        request: UpdateStreamRequest,
    ) -> SyncResult<Box<dyn UpdateStream>>;

    /// Fetch the full descriptor of one image.
    ///
    /// Returns `Ok(None)` if the upstream no longer has the image.
    async fn get_image(&self, request: GetImageRequest) -> SyncResult<Option<Image>>;

    /// The upstream's current expiration for an image. `None` means the
    /// image never expires.
    async fn get_image_expiration(&self, name: &str) -> SyncResult<Option<DateTime<Utc>>>;

    /// Add a batch of objects to the remote store.
    async fn add_objects(&self, objects: Vec<ObjectPayload>) -> SyncResult<Vec<AddObjectResult>>;

    /// Membership test against the remote store.
    async fn check_objects(&self, digests: &[Digest]) -> SyncResult<Vec<bool>>;

    /// Stream object bodies from the remote store, one per requested
    /// digest, in request order.
    async fn get_objects(&self, digests: &[Digest]) -> SyncResult<Box<dyn ObjectStream>>;
}

/// One open update stream.
#[async_trait]
pub trait UpdateStream: Send {
    /// The next update record, in stream order.
    ///
    /// `Ok(None)` means the remote closed the stream cleanly; any `Err`
    /// is a transport or decode failure. Both end the session.
    async fn next_update(&mut self) -> SyncResult<Option<ImageUpdate>>;
}

/// One open object download stream.
#[async_trait]
pub trait ObjectStream: Send {
    /// The next object body, in request order.
    ///
    /// Callers must request exactly as many bodies as digests they asked
    /// for; requesting more is a transport error.
    async fn next_object(&mut self) -> SyncResult<Vec<u8>>;
}
