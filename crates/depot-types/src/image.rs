use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::Digest;
use crate::filesystem::FileTree;
use crate::filter::Filter;

/// A named, immutable-once-committed filesystem tree plus metadata.
///
/// The image name is the registry key and is not stored in the record
/// itself. File content is referenced by digest; only metadata travels
/// with the image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// The filesystem tree. Regular files reference objects by digest.
    pub file_tree: FileTree,
    /// The build-time file inclusion filter, carried for provenance.
    pub filter: Option<Filter>,
    /// Post-update actions. Opaque to the replication core.
    pub triggers: Vec<Trigger>,
    /// Expiration timestamp. `None` means the image never expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Files materialized from external data sources, not object-backed.
    pub computed_files: Vec<ComputedFile>,
}

impl Image {
    /// A minimal image wrapping a file tree, never expiring.
    pub fn new(file_tree: FileTree) -> Self {
        Self {
            file_tree,
            filter: None,
            triggers: Vec::new(),
            expires_at: None,
            computed_files: Vec::new(),
        }
    }

    /// All object digests this image references.
    pub fn referenced_digests(&self) -> Vec<Digest> {
        self.file_tree.referenced_digests()
    }

    /// Returns `true` if the image never expires.
    pub fn never_expires(&self) -> bool {
        self.expires_at.is_none()
    }

    /// Returns `true` if the image has an expiration in the past.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now)
    }
}

/// A post-update action descriptor, matched against changed paths.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub match_paths: Vec<String>,
    pub service: String,
    pub high_impact: bool,
}

/// A file whose content comes from an external data source at deploy time
/// rather than from the object store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedFile {
    pub filename: String,
    pub source: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::{DirectoryEntry, FileEntry};
    use chrono::Duration;

    fn image_with_content(contents: &[&[u8]]) -> Image {
        let mut root = DirectoryEntry::new("");
        for (i, content) in contents.iter().enumerate() {
            root.files.push(FileEntry::for_content(format!("f{i}"), content));
        }
        Image::new(FileTree { root })
    }

    #[test]
    fn new_image_never_expires() {
        let image = image_with_content(&[b"data"]);
        assert!(image.never_expires());
        assert!(!image.is_expired(Utc::now()));
    }

    #[test]
    fn expired_image_detected() {
        let mut image = image_with_content(&[]);
        image.expires_at = Some(Utc::now() - Duration::hours(1));
        assert!(image.is_expired(Utc::now()));
    }

    #[test]
    fn future_expiration_is_not_expired() {
        let mut image = image_with_content(&[]);
        image.expires_at = Some(Utc::now() + Duration::hours(1));
        assert!(!image.is_expired(Utc::now()));
        assert!(!image.never_expires());
    }

    #[test]
    fn referenced_digests_come_from_tree() {
        let image = image_with_content(&[b"one", b"two", b"one"]);
        assert_eq!(image.referenced_digests().len(), 2);
    }

    #[test]
    fn serde_roundtrip() {
        let mut image = image_with_content(&[b"payload"]);
        image.computed_files.push(ComputedFile {
            filename: "/etc/hostname".into(),
            source: "fleet-manager:6977".into(),
        });
        image.triggers.push(Trigger {
            match_paths: vec!["/etc/ssh/.*".into()],
            service: "sshd".into(),
            high_impact: false,
        });
        let json = serde_json::to_string(&image).unwrap();
        let parsed: Image = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, image);
    }
}
