use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One child of a directory scan, classified without following symlinks. A
/// symlink therefore reports neither directory nor file and is skipped by
/// the lister.
#[derive(Debug, Clone)]
pub struct ChildEntry {
    pub name: String,
    pub is_dir: bool,
    pub is_file: bool,
}

/// Capability the tree endpoint needs from the backing storage.
pub trait StorageBackend {
    /// Whether abstract api paths can be resolved to physical locations at
    /// all. When this is false the endpoint answers 501 without traversing.
    fn supports_tree(&self) -> bool;
    fn resolve(&self, api_path: &str) -> PathBuf;
    fn is_directory(&self, location: &Path) -> bool;
    fn can_write(&self, location: &Path) -> bool;
    fn list_children(&self, location: &Path) -> io::Result<Vec<ChildEntry>>;
    fn allow_hidden(&self) -> bool;
}

/// Storage rooted at a sandbox directory on the local filesystem.
pub struct LocalStorage {
    root: PathBuf,
    allow_hidden: bool,
}

impl LocalStorage {
    pub fn new(root: PathBuf, allow_hidden: bool) -> Self {
        Self { root, allow_hidden }
    }
}

impl StorageBackend for LocalStorage {
    fn supports_tree(&self) -> bool {
        true
    }

    fn resolve(&self, api_path: &str) -> PathBuf {
        let mut resolved = self.root.clone();
        // `.` and `..` segments are dropped, so no api path escapes the root.
        for component in api_path.split('/') {
            if component.is_empty() || component == "." || component == ".." {
                continue;
            }
            resolved.push(component);
        }
        resolved
    }

    fn is_directory(&self, location: &Path) -> bool {
        location.is_dir()
    }

    fn can_write(&self, location: &Path) -> bool {
        fs::metadata(location)
            .map(|meta| !meta.permissions().readonly())
            .unwrap_or(false)
    }

    fn list_children(&self, location: &Path) -> io::Result<Vec<ChildEntry>> {
        let mut children = Vec::new();
        for entry in fs::read_dir(location)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            children.push(ChildEntry {
                name,
                is_dir: file_type.is_dir(),
                is_file: file_type.is_file(),
            });
        }
        Ok(children)
    }

    fn allow_hidden(&self) -> bool {
        self.allow_hidden
    }
}
