use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sentinel timestamp carried on every entry: this endpoint skips per-file
/// metadata lookups for speed.
pub const PLACEHOLDER_TIMESTAMP: &str = "1970-01-01T00:00:00Z";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Directory,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub writable: bool,
    pub created: String,
    pub last_modified: String,
    pub content: Option<Value>,
    pub format: Option<String>,
    pub mimetype: Option<String>,
    pub size: Option<u64>,
}

impl TreeEntry {
    pub fn new(name: String, path: String, entry_type: EntryType, writable: bool) -> Self {
        Self {
            name,
            path,
            entry_type,
            writable,
            created: PLACEHOLDER_TIMESTAMP.into(),
            last_modified: PLACEHOLDER_TIMESTAMP.into(),
            content: None,
            format: None,
            mimetype: None,
            size: None,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.entry_type == EntryType::Directory
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeTimings {
    pub tree_ms: f64,
    pub listed_dirs: usize,
    pub item_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeResponse {
    pub items: Vec<TreeEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timings: Option<TreeTimings>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_serializes_wire_shape() {
        let entry = TreeEntry::new(
            "guide".into(),
            "docs/guide".into(),
            EntryType::Directory,
            true,
        );
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "directory");
        assert_eq!(value["writable"], true);
        assert_eq!(value["created"], PLACEHOLDER_TIMESTAMP);
        assert!(value["content"].is_null());
        assert!(value["size"].is_null());
    }

    #[test]
    fn timings_omitted_unless_present() {
        let response = TreeResponse {
            items: Vec::new(),
            timings: None,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("timings").is_none());
    }
}
