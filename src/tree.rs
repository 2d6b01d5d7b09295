use std::collections::HashSet;

use serde_json::Value;

use crate::models::tree::{EntryType, TreeEntry};
use crate::storage::StorageBackend;

/// Canonical form of a client-supplied path: surrounding whitespace and
/// leading/trailing slashes removed. Total and idempotent; the empty string
/// denotes the serve root.
pub fn normalize_api_path(raw: &str) -> String {
    raw.trim().trim_matches('/').to_string()
}

/// Coerces the untrusted `open_paths` payload value into a set of normalized
/// paths. Anything that is not an array yields the empty set; non-string
/// elements are discarded.
pub fn normalize_open_paths(value: Option<&Value>) -> HashSet<String> {
    value
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(normalize_api_path)
                .collect()
        })
        .unwrap_or_default()
}

/// The set of directories that must be listed for one request: every open
/// path, the root itself, and the full ancestor chain of the update path.
pub fn expanded_paths(
    root_path: &str,
    open_paths: &HashSet<String>,
    update_path: &str,
) -> HashSet<String> {
    let mut expanded = open_paths.clone();
    expanded.insert(root_path.to_string());

    if !update_path.is_empty() {
        let mut partial = String::new();
        for part in update_path.split('/') {
            if !partial.is_empty() {
                partial.push('/');
            }
            partial.push_str(part);
            expanded.insert(partial.clone());
        }
    }

    expanded
}

/// Sorted immediate children of `api_path`: directories first, then files,
/// each group ascending by name. A path that does not resolve to an existing
/// directory yields an empty listing, never an error, so stale entries in
/// the open set are tolerated.
pub fn list_directory(storage: &dyn StorageBackend, api_path: &str) -> Vec<TreeEntry> {
    let location = storage.resolve(api_path);
    if !storage.is_directory(&location) {
        return Vec::new();
    }

    // Writability is probed once on the directory and inherited by every
    // child entry: it gates create/rename/delete in the browser.
    let parent_writable = storage.can_write(&location);
    let children = storage.list_children(&location).unwrap_or_default();

    let mut directories = Vec::new();
    let mut files = Vec::new();
    for child in children {
        if !storage.allow_hidden() && child.name.starts_with('.') {
            continue;
        }
        let entry_type = if child.is_dir {
            EntryType::Directory
        } else if child.is_file {
            EntryType::File
        } else {
            continue;
        };
        let child_path = join_api_path(api_path, &child.name);
        let entry = TreeEntry::new(child.name, child_path, entry_type, parent_writable);
        match entry_type {
            EntryType::Directory => directories.push(entry),
            EntryType::File => files.push(entry),
        }
    }

    directories.sort_by(|a, b| a.name.cmp(&b.name));
    files.sort_by(|a, b| a.name.cmp(&b.name));
    directories.append(&mut files);
    directories
}

fn join_api_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}/{child}")
    }
}

#[derive(Debug, Clone)]
pub struct TreeSnapshot {
    pub items: Vec<TreeEntry>,
    pub listed_dirs: usize,
}

/// Flattens the visible tree in depth-first pre-order: an expanded
/// directory's children land contiguously after the directory itself,
/// before later siblings, so the client can rebuild the tree from path
/// prefixes and sequence position alone. `listed_dirs` counts every lister
/// invocation, the root and empty listings included.
pub fn collect_tree(
    storage: &dyn StorageBackend,
    root_path: &str,
    expanded: &HashSet<String>,
) -> TreeSnapshot {
    let mut items = Vec::new();
    let mut listed_dirs = 0usize;
    walk(storage, root_path, expanded, &mut items, &mut listed_dirs);
    TreeSnapshot { items, listed_dirs }
}

fn walk(
    storage: &dyn StorageBackend,
    api_path: &str,
    expanded: &HashSet<String>,
    items: &mut Vec<TreeEntry>,
    listed_dirs: &mut usize,
) {
    let entries = list_directory(storage, api_path);
    *listed_dirs += 1;

    for entry in entries {
        let descend = entry.is_directory() && expanded.contains(&entry.path);
        let child_path = entry.path.clone();
        items.push(entry);
        if descend {
            walk(storage, &child_path, expanded, items, listed_dirs);
        }
    }
}
