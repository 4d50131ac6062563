use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use depot_protocol::{GetImageRequest, Update, UpdateStreamRequest};
use depot_registry::{AuthInfo, ImageRegistry};
use depot_store::{AddObjectRequest, ObjectStore};
use depot_types::{Image, ImageSelector};
use tokio::sync::oneshot;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::backoff::{Backoff, INITIAL_BACKOFF, MAX_BACKOFF};
use crate::client::ObjectClient;
use crate::error::{SyncError, SyncResult};
use crate::transport::{UpdateStream, UpstreamTransport};

/// Configuration for one replication session.
#[derive(Clone, Debug)]
pub struct ReplicationConfig {
    /// Upstream address, used for log context; dialing lives in the
    /// transport.
    pub upstream: String,
    /// Which image names to replicate.
    pub selector: ImageSelector,
    /// Archive mode: keep historical images, suppress deletions.
    pub archive_mode: bool,
    /// In archive mode, replicate expiring images too instead of
    /// skipping them.
    pub retain_expiring_images: bool,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Bound on every upstream RPC (image fetch, expiration query,
    /// per-object download).
    pub rpc_timeout: Duration,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            upstream: String::new(),
            selector: ImageSelector::all(),
            archive_mode: false,
            retain_expiring_images: false,
            initial_backoff: INITIAL_BACKOFF,
            max_backoff: MAX_BACKOFF,
            rpc_timeout: Duration::from_secs(60),
        }
    }
}

/// Where the session is in its connect/stream/retry cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    /// Consuming the upstream's initial full image list.
    InitialSweep,
    /// The initial list is done; consuming incremental updates.
    SteadyState,
}

/// Outcome of one completed initial sweep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SweepReport {
    /// `false` if one or more images failed to replicate.
    pub complete: bool,
    pub elapsed: Duration,
}

/// Bookkeeping for the sweep in progress on one connection.
struct SweepTracker {
    /// Image names observed during the initial sweep, used to delete
    /// local images the upstream no longer has. `None` in archive mode
    /// and after the sentinel.
    seen: Option<HashSet<String>>,
    some_images_failed: bool,
    started: Instant,
}

impl SweepTracker {
    fn new(track_seen: bool) -> Self {
        Self {
            seen: track_seen.then(HashSet::new),
            some_images_failed: false,
            started: Instant::now(),
        }
    }
}

/// Pull-based streaming replication client.
///
/// Runs as one background task per upstream: dials, consumes the ordered
/// update stream, reconciles local state against the initial full list,
/// fetches missing objects, and commits images through the registry's
/// staged-commit path. Any stream loss drops back to
/// [`SessionState::Disconnected`] and the backoff cycle redials.
pub struct ReplicationSession {
    transport: Arc<dyn UpstreamTransport>,
    objects: ObjectClient,
    registry: Arc<ImageRegistry>,
    config: ReplicationConfig,
    state: SessionState,
    backoff: Backoff,
    first_sweep_tx: Option<oneshot::Sender<SweepReport>>,
}

impl ReplicationSession {
    pub fn new(
        transport: Arc<dyn UpstreamTransport>,
        registry: Arc<ImageRegistry>,
        config: ReplicationConfig,
    ) -> Self {
        let objects = ObjectClient::new(Arc::clone(&transport));
        let backoff = Backoff::new(config.initial_backoff, config.max_backoff);
        Self {
            transport,
            objects,
            registry,
            config,
            state: SessionState::Disconnected,
            backoff,
            first_sweep_tx: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// A channel that fires once, when the first initial sweep completes.
    pub fn notify_first_sweep(&mut self) -> oneshot::Receiver<SweepReport> {
        let (tx, rx) = oneshot::channel();
        self.first_sweep_tx = Some(tx);
        rx
    }

    /// Run the replication loop forever.
    pub async fn run(mut self) {
        loop {
            self.run_iteration().await;
        }
    }

    /// One connect/stream/backoff cycle.
    ///
    /// The session always sleeps out the remainder of the current backoff
    /// window before the next dial, which rate-limits reconnect storms;
    /// a session that outlived the window resets the backoff to its
    /// initial interval.
    async fn run_iteration(&mut self) {
        let window = self.backoff.window();
        let window_end = Instant::now() + window;
        let started = Instant::now();
        let stream_opened = self.connect_and_stream(window).await;
        let outlived = stream_opened && started.elapsed() >= window;
        self.backoff.record_session(outlived);
        time::sleep_until(window_end).await;
    }

    /// Dial the upstream and consume its update stream until it ends.
    /// Returns `true` if a stream was opened at all.
    async fn connect_and_stream(&mut self, dial_timeout: Duration) -> bool {
        self.state = SessionState::Connecting;
        let request = UpdateStreamRequest {
            ignore_expiring: self.config.archive_mode && !self.config.retain_expiring_images,
        };
        let stream = match time::timeout(dial_timeout, self.transport.open_update_stream(request))
            .await
        {
            Err(_) => {
                warn!(upstream = %self.config.upstream, "timed out dialing upstream");
                self.state = SessionState::Disconnected;
                return false;
            }
            Ok(Err(error)) => {
                warn!(upstream = %self.config.upstream, %error, "error connecting to upstream");
                self.state = SessionState::Disconnected;
                return false;
            }
            Ok(Ok(stream)) => stream,
        };
        info!(upstream = %self.config.upstream, "connected to image replicator");
        match self.stream_updates(stream).await {
            Ok(()) => info!("connection to image replicator closed"),
            Err(error) => warn!(%error, "replication stream failed"),
        }
        self.state = SessionState::Disconnected;
        true
    }

    /// Consume updates until clean close (`Ok`) or stream failure (`Err`).
    async fn stream_updates(&mut self, mut stream: Box<dyn UpdateStream>) -> SyncResult<()> {
        self.state = SessionState::InitialSweep;
        let mut sweep = SweepTracker::new(!self.config.archive_mode);
        loop {
            let record = match stream.next_update().await? {
                Some(record) => record,
                None => return Ok(()),
            };
            let update = Update::try_from(record)?;
            self.apply_update(update, &mut sweep).await?;
        }
    }

    /// Dispatch one classified update.
    ///
    /// Per-image add failures are logged and mark the sweep partial;
    /// delete and directory failures are fatal to the stream.
    async fn apply_update(&mut self, update: Update, sweep: &mut SweepTracker) -> SyncResult<()> {
        match update {
            Update::AddImage { name } => {
                if !self.config.selector.accepts(&name) {
                    debug!(image = %name, "excluded from replication");
                    return Ok(());
                }
                if self.state == SessionState::InitialSweep {
                    if let Some(seen) = sweep.seen.as_mut() {
                        seen.insert(name.clone());
                    }
                }
                if let Err(error) = self.sync_image(&name).await {
                    warn!(image = %name, %error, "error adding image");
                    sweep.some_images_failed = true;
                }
                Ok(())
            }
            Update::InitialListComplete => {
                self.finish_initial_sweep(sweep);
                Ok(())
            }
            Update::DeleteImage { name } => {
                if self.config.archive_mode {
                    debug!(image = %name, "ignoring delete in archive mode");
                    return Ok(());
                }
                info!(image = %name, "deleting image");
                if !self.registry.delete_image(&name, &AuthInfo::privileged())? {
                    debug!(image = %name, "image already absent");
                }
                Ok(())
            }
            Update::MakeDirectory { directory } => {
                debug!(directory = %directory.name, "updating directory");
                self.registry
                    .update_directory(directory, &AuthInfo::privileged())?;
                Ok(())
            }
        }
    }

    /// Handle the end-of-initial-list sentinel: reconcile, report, and
    /// move to steady state. Repeated sentinels are ignored.
    fn finish_initial_sweep(&mut self, sweep: &mut SweepTracker) {
        if self.state != SessionState::InitialSweep {
            debug!("ignoring repeated end-of-list sentinel");
            return;
        }
        if let Some(seen) = sweep.seen.take() {
            self.delete_missing_images(&seen);
        }
        self.state = SessionState::SteadyState;
        let report = SweepReport {
            complete: !sweep.some_images_failed,
            elapsed: sweep.started.elapsed(),
        };
        if let Some(tx) = self.first_sweep_tx.take() {
            let _ = tx.send(report);
        }
        if report.complete {
            info!(elapsed = ?report.elapsed, "replicated all current images");
        } else {
            warn!(elapsed = ?report.elapsed, "partially replicated images");
        }
    }

    /// Delete every local image not observed during the initial sweep.
    fn delete_missing_images(&self, seen: &HashSet<String>) {
        let auth = AuthInfo::privileged();
        for name in self.registry.list_images() {
            if seen.contains(&name) {
                continue;
            }
            info!(image = %name, "deleting image no longer present upstream");
            if let Err(error) = self.registry.delete_image(&name, &auth) {
                warn!(image = %name, %error, "failed to delete missing image");
            }
        }
    }

    /// Bring one upstream image up to date locally.
    async fn sync_image(&self, name: &str) -> SyncResult<()> {
        if let Some(existing) = self.registry.get_image(name) {
            if existing.never_expires() {
                return Ok(());
            }
            // Failures extending an expiration must not abort the stream.
            match self.extend_image_expiration(name).await {
                Ok(true) => info!(image = %name, "extended image expiration"),
                Ok(false) => {}
                Err(error) => {
                    warn!(image = %name, %error, "failed to extend image expiration");
                }
            }
            return Ok(());
        }
        info!(image = %name, "adding image");
        let request = GetImageRequest {
            name: name.to_string(),
            timeout: self.config.rpc_timeout,
            ignore_filesystem_if_expiring: self.config.archive_mode
                && !self.config.retain_expiring_images,
        };
        let image = self
            .rpc("GetImage", self.transport.get_image(request))
            .await?
            .ok_or_else(|| SyncError::ImageNotFound(name.to_string()))?;
        debug!(image = %name, "downloaded image descriptor");
        if self.config.archive_mode
            && !image.never_expires()
            && !self.config.retain_expiring_images
        {
            debug!(image = %name, "ignoring expiring image in archive mode");
            return Ok(());
        }
        let pending = self.registry.stage_image(name, image)?;
        self.fetch_missing_objects(pending.image()).await?;
        pending.commit(&AuthInfo::privileged())?;
        info!(image = %name, "added image");
        Ok(())
    }

    /// Query the upstream's current expiration and extend the local one.
    async fn extend_image_expiration(&self, name: &str) -> SyncResult<bool> {
        let expires_at = self
            .rpc(
                "GetImageExpiration",
                self.transport.get_image_expiration(name),
            )
            .await?;
        Ok(self
            .registry
            .change_image_expiration(name, expires_at, &AuthInfo::privileged())?)
    }

    /// Download every referenced object not already in the local store.
    ///
    /// Bodies are fetched and added one at a time, in request order, so
    /// at most one object body is held in memory. Each add is validated
    /// against the requested digest, so a corrupted transfer is rejected
    /// before it reaches the store.
    async fn fetch_missing_objects(&self, image: &Image) -> SyncResult<()> {
        let store = self.registry.object_store();
        let digests = image.referenced_digests();
        let present = store.check_objects(&digests)?;
        let missing: Vec<_> = digests
            .iter()
            .zip(&present)
            .filter(|(_, present)| !**present)
            .map(|(digest, _)| *digest)
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        debug!(count = missing.len(), "fetching missing objects");
        let mut stream = self
            .rpc("GetObjects", self.objects.get_objects(&missing))
            .await?;
        let mut fetched_bytes = 0u64;
        for digest in &missing {
            let data = self
                .rpc("GetObjects.next", stream.next_object())
                .await?;
            fetched_bytes += data.len() as u64;
            let outcomes = store.add_objects(vec![AddObjectRequest::checked(data, *digest)])?;
            for outcome in outcomes {
                outcome.into_result()?;
            }
        }
        info!(
            count = missing.len(),
            bytes = fetched_bytes,
            "fetched missing objects"
        );
        Ok(())
    }

    /// Bound an upstream RPC by the configured timeout.
    async fn rpc<T, F>(&self, operation: &'static str, call: F) -> SyncResult<T>
    where
        F: Future<Output = SyncResult<T>>,
    {
        match time::timeout(self.config.rpc_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout { operation }),
        }
    }
}
