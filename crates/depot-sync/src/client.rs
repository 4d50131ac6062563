use std::mem;
use std::sync::Arc;

use depot_protocol::{AddObjectResult, ObjectPayload};
use depot_types::Digest;
use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::transport::{ObjectStream, UpstreamTransport};

/// Client for a remote object store.
///
/// Thin wrapper over the object half of [`UpstreamTransport`]: batched
/// uploads, membership checks, and the ordered download stream.
pub struct ObjectClient {
    transport: Arc<dyn UpstreamTransport>,
}

impl ObjectClient {
    pub fn new(transport: Arc<dyn UpstreamTransport>) -> Self {
        Self { transport }
    }

    /// Add a batch of blobs to the remote store.
    pub async fn add_objects(
        &self,
        objects: Vec<ObjectPayload>,
    ) -> SyncResult<Vec<AddObjectResult>> {
        self.transport.add_objects(objects).await
    }

    /// Which of `digests` the remote store already has.
    pub async fn check_objects(&self, digests: &[Digest]) -> SyncResult<Vec<bool>> {
        self.transport.check_objects(digests).await
    }

    /// Stream object bodies from the remote store, in request order.
    pub async fn get_objects(&self, digests: &[Digest]) -> SyncResult<Box<dyn ObjectStream>> {
        self.transport.get_objects(digests).await
    }
}

/// Batches outgoing object writes to amortize round trips while bounding
/// memory.
///
/// [`add`](Self::add) computes each blob's digest locally and buffers the
/// blob; a batch is transmitted when buffered bytes would exceed the
/// configured ceiling, or on [`flush`](Self::flush). A digest returned by
/// `add` is durable in the remote store only after the next successful
/// flush.
pub struct ObjectAdderQueue {
    client: ObjectClient,
    max_bytes: u64,
    buffered_bytes: u64,
    payloads: Vec<ObjectPayload>,
}

impl ObjectAdderQueue {
    pub fn new(client: ObjectClient, max_bytes: u64) -> Self {
        Self {
            client,
            max_bytes,
            buffered_bytes: 0,
            payloads: Vec::new(),
        }
    }

    /// Buffer one blob for upload and return its digest.
    ///
    /// Flushes the current batch first if adding the blob would push the
    /// buffer past the ceiling.
    pub async fn add(&mut self, data: Vec<u8>) -> SyncResult<Digest> {
        let digest = Digest::of(&data);
        let len = data.len() as u64;
        if !self.payloads.is_empty() && self.buffered_bytes + len > self.max_bytes {
            self.flush().await?;
        }
        self.buffered_bytes += len;
        self.payloads.push(ObjectPayload {
            data,
            expected_digest: Some(digest),
        });
        Ok(digest)
    }

    /// Transmit any buffered blobs as a single batch.
    ///
    /// On partial validation failure the rejected digests are reported
    /// via [`SyncError::RejectedObjects`]; the accepted blobs in the same
    /// batch remain durable remotely.
    pub async fn flush(&mut self) -> SyncResult<()> {
        if self.payloads.is_empty() {
            return Ok(());
        }
        let payloads = mem::take(&mut self.payloads);
        self.buffered_bytes = 0;
        debug!(count = payloads.len(), "flushing object batch");
        let results = self.client.add_objects(payloads).await?;
        let rejected: Vec<Digest> = results
            .iter()
            .filter_map(|result| match result {
                AddObjectResult::Rejected { expected, .. } => Some(*expected),
                _ => None,
            })
            .collect();
        if !rejected.is_empty() {
            return Err(SyncError::RejectedObjects(rejected));
        }
        Ok(())
    }

    /// Bytes currently buffered, not yet transmitted.
    pub fn buffered_bytes(&self) -> u64 {
        self.buffered_bytes
    }

    /// Number of blobs currently buffered.
    pub fn buffered_count(&self) -> usize {
        self.payloads.len()
    }
}
