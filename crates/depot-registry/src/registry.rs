use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use depot_store::ObjectStore;
use depot_types::{ComputedFile, Directory, Image};
use tracing::info;

use crate::auth::AuthInfo;
use crate::error::{RegistryError, RegistryResult};
use crate::names::{validate_directory_name, validate_image_name};

/// The authoritative name → image mapping for one replica.
///
/// Reads share the state lock; mutations take it exclusively for the
/// duration of one call. Staging slots live in a separate short-held
/// pending table so that an in-flight build never blocks readers.
pub struct ImageRegistry {
    store: Arc<dyn ObjectStore>,
    state: RwLock<RegistryState>,
    pending: Mutex<HashSet<String>>,
}

#[derive(Default)]
struct RegistryState {
    images: HashMap<String, Image>,
    directories: BTreeMap<String, Directory>,
}

impl ImageRegistry {
    /// Create an empty registry backed by the given object store.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            state: RwLock::new(RegistryState::default()),
            pending: Mutex::new(HashSet::new()),
        }
    }

    /// The object store backing this registry.
    pub fn object_store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Look up a committed image by name.
    pub fn get_image(&self, name: &str) -> Option<Image> {
        let state = self.state.read().expect("lock poisoned");
        state.images.get(name).cloned()
    }

    /// Sorted names of all committed images.
    pub fn list_images(&self) -> Vec<String> {
        let state = self.state.read().expect("lock poisoned");
        let mut names: Vec<String> = state.images.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of committed images.
    pub fn image_count(&self) -> usize {
        self.state.read().expect("lock poisoned").images.len()
    }

    /// Computed-file descriptors for an image, or `None` if the image is
    /// unknown.
    pub fn get_image_computed_files(&self, name: &str) -> Option<Vec<ComputedFile>> {
        let state = self.state.read().expect("lock poisoned");
        state.images.get(name).map(|image| image.computed_files.clone())
    }

    /// All directory namespace nodes, sorted by name.
    pub fn list_directories(&self) -> Vec<Directory> {
        let state = self.state.read().expect("lock poisoned");
        state.directories.values().cloned().collect()
    }

    /// Stage `image` for `name`, claiming the per-name staging slot.
    ///
    /// Fails with [`RegistryError::AlreadyPending`] if another staging
    /// operation holds the slot. The returned guard keeps the slot until
    /// it is committed or dropped; dropping it uncommitted leaves the
    /// name in its prior state with no trace.
    pub fn stage_image(&self, name: &str, image: Image) -> RegistryResult<PendingImage<'_>> {
        validate_image_name(name)?;
        let mut pending = self.pending.lock().expect("lock poisoned");
        if !pending.insert(name.to_string()) {
            return Err(RegistryError::AlreadyPending(name.to_string()));
        }
        drop(pending);
        Ok(PendingImage {
            image,
            slot: PendingSlot {
                registry: self,
                name: name.to_string(),
            },
        })
    }

    /// Stage, run `commit_fn`, and commit in one call.
    ///
    /// `commit_fn` is where the caller fetches any missing referenced
    /// objects into the store. If it fails, the stage is discarded and
    /// the name reverts to its prior state.
    pub fn do_with_pending_image<F>(
        &self,
        name: &str,
        image: Image,
        auth: &AuthInfo,
        commit_fn: F,
    ) -> RegistryResult<()>
    where
        F: FnOnce(&Image) -> RegistryResult<()>,
    {
        let pending = self.stage_image(name, image)?;
        commit_fn(pending.image())?;
        pending.commit(auth)
    }

    /// Directly add a committed image.
    ///
    /// Re-adding an existing never-expiring image is a no-op; re-adding
    /// an existing expiring image fails (the expiration path is the only
    /// way to change it). Every referenced object must already be present
    /// in the store.
    pub fn add_image(&self, name: &str, image: Image, auth: &AuthInfo) -> RegistryResult<()> {
        auth.require_write()?;
        validate_image_name(name)?;
        self.require_not_pending(name)?;
        self.require_objects_present(&image)?;
        let mut state = self.state.write().expect("lock poisoned");
        if let Some(existing) = state.images.get(name) {
            if existing.never_expires() {
                return Ok(());
            }
            return Err(RegistryError::AlreadyExists(name.to_string()));
        }
        Self::register_ancestors(&mut state.directories, name);
        state.images.insert(name.to_string(), image);
        Ok(())
    }

    /// Delete an image. Returns `true` if it existed.
    pub fn delete_image(&self, name: &str, auth: &AuthInfo) -> RegistryResult<bool> {
        auth.require_write()?;
        self.require_not_pending(name)?;
        let mut state = self.state.write().expect("lock poisoned");
        Ok(state.images.remove(name).is_some())
    }

    /// Create or refresh a directory namespace node, idempotently.
    /// Missing ancestors are created as well.
    pub fn update_directory(&self, directory: Directory, auth: &AuthInfo) -> RegistryResult<()> {
        auth.require_write()?;
        validate_directory_name(&directory.name)?;
        let mut state = self.state.write().expect("lock poisoned");
        Self::register_ancestors(&mut state.directories, &directory.name);
        state.directories.insert(directory.name.clone(), directory);
        Ok(())
    }

    /// Move an image's expiration later, never earlier.
    ///
    /// Returns `Ok(false)` without changing anything unless the new
    /// expiry strictly extends the current one; `None` (never expires)
    /// is the maximum and cannot be extended further.
    pub fn change_image_expiration(
        &self,
        name: &str,
        expires_at: Option<DateTime<Utc>>,
        auth: &AuthInfo,
    ) -> RegistryResult<bool> {
        auth.require_write()?;
        let mut state = self.state.write().expect("lock poisoned");
        let image = state
            .images
            .get_mut(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        let extends = match (image.expires_at, expires_at) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(current), Some(new)) => new > current,
        };
        if extends {
            image.expires_at = expires_at;
        }
        Ok(extends)
    }

    /// Sorted names of images whose expiration has passed.
    pub fn expired_images(&self, now: DateTime<Utc>) -> Vec<String> {
        let state = self.state.read().expect("lock poisoned");
        let mut names: Vec<String> = state
            .images
            .iter()
            .filter(|(_, image)| image.is_expired(now))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Delete every expired image, returning the removed names.
    /// Names with a staging operation in flight are left alone.
    pub fn delete_expired_images(
        &self,
        now: DateTime<Utc>,
        auth: &AuthInfo,
    ) -> RegistryResult<Vec<String>> {
        auth.require_write()?;
        let mut removed = Vec::new();
        for name in self.expired_images(now) {
            if self.is_pending(&name) {
                continue;
            }
            let mut state = self.state.write().expect("lock poisoned");
            let still_expired = state
                .images
                .get(&name)
                .is_some_and(|image| image.is_expired(now));
            if still_expired {
                state.images.remove(&name);
                drop(state);
                info!(image = %name, "deleted expired image");
                removed.push(name);
            }
        }
        Ok(removed)
    }

    /// Returns `true` if a staging operation holds the slot for `name`.
    pub fn is_pending(&self, name: &str) -> bool {
        self.pending.lock().expect("lock poisoned").contains(name)
    }

    fn require_not_pending(&self, name: &str) -> RegistryResult<()> {
        if self.is_pending(name) {
            return Err(RegistryError::AlreadyPending(name.to_string()));
        }
        Ok(())
    }

    fn require_objects_present(&self, image: &Image) -> RegistryResult<()> {
        let digests = image.referenced_digests();
        let present = self.store.check_objects(&digests)?;
        let mut absent = digests
            .iter()
            .zip(&present)
            .filter(|(_, present)| !**present)
            .map(|(digest, _)| *digest);
        if let Some(first) = absent.next() {
            return Err(RegistryError::MissingObjects {
                missing: 1 + absent.count(),
                first,
            });
        }
        Ok(())
    }

    fn register_ancestors(directories: &mut BTreeMap<String, Directory>, name: &str) {
        let mut end = 0;
        for component in name.split('/') {
            if end > 0 {
                let ancestor = &name[..end - 1];
                directories
                    .entry(ancestor.to_string())
                    .or_insert_with(|| Directory::new(ancestor));
            }
            end += component.len() + 1;
        }
    }

    /// Publish a staged image, replacing any prior image at that name.
    fn publish(&self, name: &str, image: Image, auth: &AuthInfo) -> RegistryResult<()> {
        auth.require_write()?;
        self.require_objects_present(&image)?;
        let mut state = self.state.write().expect("lock poisoned");
        Self::register_ancestors(&mut state.directories, name);
        state.images.insert(name.to_string(), image);
        Ok(())
    }

    fn release_pending(&self, name: &str) {
        self.pending.lock().expect("lock poisoned").remove(name);
    }
}

/// RAII handle for a staged image.
///
/// Exists only while a commit is in flight for its name; no other write
/// to that name can happen until it is committed or dropped.
pub struct PendingImage<'a> {
    image: Image,
    slot: PendingSlot<'a>,
}

impl PendingImage<'_> {
    /// The name being staged.
    pub fn name(&self) -> &str {
        &self.slot.name
    }

    /// The staged image.
    pub fn image(&self) -> &Image {
        &self.image
    }

    /// Publish the staged image as a durable registry entry.
    ///
    /// Fails with [`RegistryError::MissingObjects`] if any referenced
    /// object is still absent from the store; the stage is discarded in
    /// that case and the name reverts to its prior state.
    pub fn commit(self, auth: &AuthInfo) -> RegistryResult<()> {
        let Self { image, slot } = self;
        slot.registry.publish(&slot.name, image, auth)
    }
}

/// Holds the pending-table entry; dropping releases the slot.
struct PendingSlot<'a> {
    registry: &'a ImageRegistry,
    name: String,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.registry.release_pending(&self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use depot_store::{AddObjectRequest, InMemoryObjectStore};
    use depot_types::{DirectoryEntry, FileEntry, FileTree};

    fn registry() -> ImageRegistry {
        ImageRegistry::new(Arc::new(InMemoryObjectStore::new()))
    }

    /// An image referencing `contents`, with the objects loaded into the
    /// registry's store when `store_objects` is set.
    fn image_for(registry: &ImageRegistry, contents: &[&[u8]], store_objects: bool) -> Image {
        let mut root = DirectoryEntry::new("");
        for (i, content) in contents.iter().enumerate() {
            root.files.push(FileEntry::for_content(format!("f{i}"), content));
        }
        if store_objects {
            let requests = contents
                .iter()
                .map(|content| AddObjectRequest::unchecked(content.to_vec()))
                .collect();
            registry.object_store().add_objects(requests).unwrap();
        }
        Image::new(FileTree { root })
    }

    #[test]
    fn add_and_get_image() {
        let registry = registry();
        let image = image_for(&registry, &[b"content"], true);
        registry.add_image("prod/web", image.clone(), &AuthInfo::privileged()).unwrap();
        assert_eq!(registry.get_image("prod/web"), Some(image));
        assert_eq!(registry.list_images(), vec!["prod/web".to_string()]);
    }

    #[test]
    fn add_requires_write_access() {
        let registry = registry();
        let image = image_for(&registry, &[], false);
        assert!(matches!(
            registry.add_image("img", image, &AuthInfo::read_only()),
            Err(RegistryError::PermissionDenied)
        ));
    }

    #[test]
    fn add_with_missing_objects_is_rejected() {
        let registry = registry();
        let image = image_for(&registry, &[b"not stored"], false);
        assert!(matches!(
            registry.add_image("img", image, &AuthInfo::privileged()),
            Err(RegistryError::MissingObjects { missing: 1, .. })
        ));
        assert!(registry.get_image("img").is_none());
    }

    #[test]
    fn readding_never_expiring_image_is_noop() {
        let registry = registry();
        let image = image_for(&registry, &[b"a"], true);
        registry.add_image("img", image.clone(), &AuthInfo::privileged()).unwrap();
        registry.add_image("img", image, &AuthInfo::privileged()).unwrap();
        assert_eq!(registry.image_count(), 1);
    }

    #[test]
    fn readding_expiring_image_fails() {
        let registry = registry();
        let mut image = image_for(&registry, &[], false);
        image.expires_at = Some(Utc::now() + Duration::hours(1));
        registry.add_image("img", image.clone(), &AuthInfo::privileged()).unwrap();
        assert!(matches!(
            registry.add_image("img", image, &AuthInfo::privileged()),
            Err(RegistryError::AlreadyExists(_))
        ));
    }

    #[test]
    fn staged_commit_publishes() {
        let registry = registry();
        let image = image_for(&registry, &[b"data"], true);
        let pending = registry.stage_image("img", image).unwrap();
        assert!(registry.is_pending("img"));
        pending.commit(&AuthInfo::privileged()).unwrap();
        assert!(!registry.is_pending("img"));
        assert!(registry.get_image("img").is_some());
    }

    #[test]
    fn commit_fn_failure_leaves_no_trace() {
        let registry = registry();
        let image = image_for(&registry, &[b"data"], true);
        let result = registry.do_with_pending_image(
            "img",
            image,
            &AuthInfo::privileged(),
            |_| Err(RegistryError::NotFound("upstream gone".into())),
        );
        assert!(result.is_err());
        assert!(registry.get_image("img").is_none());
        assert!(!registry.is_pending("img"));
    }

    #[test]
    fn commit_fn_failure_preserves_previous_image() {
        let registry = registry();
        let old = image_for(&registry, &[b"old"], true);
        registry.add_image("img", old.clone(), &AuthInfo::privileged()).unwrap();
        // The old image is never-expiring, so stage a replacement directly.
        let new = image_for(&registry, &[b"new"], true);
        let result = registry.do_with_pending_image(
            "img",
            new,
            &AuthInfo::privileged(),
            |_| Err(RegistryError::NotFound("fetch failed".into())),
        );
        assert!(result.is_err());
        assert_eq!(registry.get_image("img"), Some(old));
    }

    #[test]
    fn commit_with_absent_objects_fails_and_reverts() {
        let registry = registry();
        let image = image_for(&registry, &[b"never fetched"], false);
        let pending = registry.stage_image("img", image).unwrap();
        assert!(matches!(
            pending.commit(&AuthInfo::privileged()),
            Err(RegistryError::MissingObjects { .. })
        ));
        assert!(registry.get_image("img").is_none());
        assert!(!registry.is_pending("img"));
    }

    #[test]
    fn concurrent_staging_for_same_name_is_rejected() {
        let registry = registry();
        let image = image_for(&registry, &[], false);
        let _pending = registry.stage_image("img", image.clone()).unwrap();
        assert!(matches!(
            registry.stage_image("img", image),
            Err(RegistryError::AlreadyPending(_))
        ));
    }

    #[test]
    fn dropping_stage_releases_the_slot() {
        let registry = registry();
        let image = image_for(&registry, &[], false);
        drop(registry.stage_image("img", image.clone()).unwrap());
        assert!(!registry.is_pending("img"));
        assert!(registry.stage_image("img", image).is_ok());
    }

    #[test]
    fn pending_name_blocks_direct_writes() {
        let registry = registry();
        let image = image_for(&registry, &[], false);
        let _pending = registry.stage_image("img", image.clone()).unwrap();
        assert!(matches!(
            registry.add_image("img", image, &AuthInfo::privileged()),
            Err(RegistryError::AlreadyPending(_))
        ));
        assert!(matches!(
            registry.delete_image("img", &AuthInfo::privileged()),
            Err(RegistryError::AlreadyPending(_))
        ));
    }

    #[test]
    fn delete_absent_image_returns_false() {
        let registry = registry();
        assert!(!registry.delete_image("ghost", &AuthInfo::privileged()).unwrap());
    }

    #[test]
    fn expiration_only_extends() {
        let registry = registry();
        let now = Utc::now();
        let mut image = image_for(&registry, &[], false);
        image.expires_at = Some(now + Duration::hours(2));
        registry.add_image("img", image, &AuthInfo::privileged()).unwrap();
        let auth = AuthInfo::privileged();

        // Earlier: refused.
        assert!(!registry
            .change_image_expiration("img", Some(now + Duration::hours(1)), &auth)
            .unwrap());
        // Later: applied.
        assert!(registry
            .change_image_expiration("img", Some(now + Duration::hours(3)), &auth)
            .unwrap());
        // Never: the maximum.
        assert!(registry.change_image_expiration("img", None, &auth).unwrap());
        // Nothing extends never.
        assert!(!registry
            .change_image_expiration("img", Some(now + Duration::hours(9)), &auth)
            .unwrap());
    }

    #[test]
    fn expiration_change_on_unknown_image_fails() {
        let registry = registry();
        assert!(matches!(
            registry.change_image_expiration("ghost", None, &AuthInfo::privileged()),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn directories_are_created_idempotently_with_ancestors() {
        let registry = registry();
        let auth = AuthInfo::privileged();
        registry.update_directory(Directory::new("users/alice/scratch"), &auth).unwrap();
        registry.update_directory(Directory::new("users/alice/scratch"), &auth).unwrap();
        let names: Vec<String> = registry
            .list_directories()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["users", "users/alice", "users/alice/scratch"]);
    }

    #[test]
    fn adding_nested_image_registers_ancestor_directories() {
        let registry = registry();
        let image = image_for(&registry, &[], false);
        registry.add_image("users/bob/test", image, &AuthInfo::privileged()).unwrap();
        let names: Vec<String> = registry
            .list_directories()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["users", "users/bob"]);
    }

    #[test]
    fn expired_images_are_listed_and_deleted() {
        let registry = registry();
        let now = Utc::now();
        let auth = AuthInfo::privileged();

        let mut stale = image_for(&registry, &[], false);
        stale.expires_at = Some(now - Duration::minutes(5));
        registry.add_image("stale", stale, &auth).unwrap();

        let mut fresh = image_for(&registry, &[], false);
        fresh.expires_at = Some(now + Duration::hours(5));
        registry.add_image("fresh", fresh, &auth).unwrap();

        assert_eq!(registry.expired_images(now), vec!["stale".to_string()]);
        assert_eq!(
            registry.delete_expired_images(now, &auth).unwrap(),
            vec!["stale".to_string()]
        );
        assert_eq!(registry.list_images(), vec!["fresh".to_string()]);
    }

    #[test]
    fn computed_files_are_returned_for_known_images() {
        let registry = registry();
        let mut image = image_for(&registry, &[], false);
        image.computed_files.push(ComputedFile {
            filename: "/etc/hostname".into(),
            source: "fleet-manager:6977".into(),
        });
        registry.add_image("img", image, &AuthInfo::privileged()).unwrap();
        let files = registry.get_image_computed_files("img").unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "/etc/hostname");
        assert!(registry.get_image_computed_files("ghost").is_none());
    }

    #[test]
    fn invalid_names_are_rejected() {
        let registry = registry();
        let image = image_for(&registry, &[], false);
        assert!(matches!(
            registry.add_image("", image.clone(), &AuthInfo::privileged()),
            Err(RegistryError::InvalidName { .. })
        ));
        assert!(matches!(
            registry.stage_image("a//b", image),
            Err(RegistryError::InvalidName { .. })
        ));
    }
}
