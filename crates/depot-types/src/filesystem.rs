use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// A filesystem tree whose regular files reference content digests.
///
/// The tree carries structure and metadata only; file content lives in the
/// object store, keyed by [`Digest`]. Zero-length files carry no digest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTree {
    pub root: DirectoryEntry,
}

impl FileTree {
    /// An empty tree (bare root directory).
    pub fn empty() -> Self {
        Self {
            root: DirectoryEntry::new(""),
        }
    }

    /// All digests referenced by regular files, deduplicated and sorted.
    pub fn referenced_digests(&self) -> Vec<Digest> {
        let mut digests = BTreeSet::new();
        self.root.collect_digests(&mut digests);
        digests.into_iter().collect()
    }

    /// Number of regular files in the tree.
    pub fn num_files(&self) -> usize {
        self.root.count_files()
    }

    /// Sum of regular file sizes.
    pub fn total_file_bytes(&self) -> u64 {
        self.root.sum_file_bytes()
    }
}

/// A directory node: regular files, symlinks, and subdirectories.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub mode: u32,
    pub files: Vec<FileEntry>,
    pub symlinks: Vec<SymlinkEntry>,
    pub directories: Vec<DirectoryEntry>,
}

impl DirectoryEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: 0o755,
            files: Vec::new(),
            symlinks: Vec::new(),
            directories: Vec::new(),
        }
    }

    fn collect_digests(&self, out: &mut BTreeSet<Digest>) {
        for file in &self.files {
            if let Some(digest) = file.digest {
                out.insert(digest);
            }
        }
        for dir in &self.directories {
            dir.collect_digests(out);
        }
    }

    fn count_files(&self) -> usize {
        self.files.len() + self.directories.iter().map(|d| d.count_files()).sum::<usize>()
    }

    fn sum_file_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum::<u64>()
            + self.directories.iter().map(|d| d.sum_file_bytes()).sum::<u64>()
    }
}

/// A regular file entry. `digest` is `None` for zero-length files.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub mode: u32,
    pub size: u64,
    pub digest: Option<Digest>,
}

impl FileEntry {
    /// A file entry referencing the given content.
    pub fn for_content(name: impl Into<String>, content: &[u8]) -> Self {
        let digest = if content.is_empty() {
            None
        } else {
            Some(Digest::of(content))
        };
        Self {
            name: name.into(),
            mode: 0o644,
            size: content.len() as u64,
            digest,
        }
    }
}

/// A symbolic link entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymlinkEntry {
    pub name: String,
    pub target: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> FileTree {
        let mut root = DirectoryEntry::new("");
        root.files.push(FileEntry::for_content("motd", b"welcome"));
        root.files.push(FileEntry::for_content("empty", b""));
        let mut etc = DirectoryEntry::new("etc");
        etc.files.push(FileEntry::for_content("passwd", b"root:x:0:0"));
        etc.files.push(FileEntry::for_content("motd-copy", b"welcome"));
        etc.symlinks.push(SymlinkEntry {
            name: "mtab".into(),
            target: "/proc/mounts".into(),
        });
        root.directories.push(etc);
        FileTree { root }
    }

    #[test]
    fn referenced_digests_deduplicates_identical_content() {
        let tree = sample_tree();
        // motd and etc/motd-copy share content; empty has no digest.
        assert_eq!(tree.referenced_digests().len(), 2);
    }

    #[test]
    fn referenced_digests_are_sorted() {
        let digests = sample_tree().referenced_digests();
        let mut sorted = digests.clone();
        sorted.sort();
        assert_eq!(digests, sorted);
    }

    #[test]
    fn empty_file_has_no_digest() {
        let entry = FileEntry::for_content("empty", b"");
        assert!(entry.digest.is_none());
        assert_eq!(entry.size, 0);
    }

    #[test]
    fn num_files_counts_recursively() {
        assert_eq!(sample_tree().num_files(), 4);
    }

    #[test]
    fn total_file_bytes_sums_recursively() {
        let tree = sample_tree();
        assert_eq!(tree.total_file_bytes(), 7 + 10 + 7);
    }

    #[test]
    fn empty_tree_references_nothing() {
        let tree = FileTree::empty();
        assert!(tree.referenced_digests().is_empty());
        assert_eq!(tree.num_files(), 0);
    }
}
