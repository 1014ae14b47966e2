//! Snapshot store model and persistence
//!
//! The store file is written by the external build pipeline; this crate only
//! ever reads it, wholesale, and treats the result as an immutable value for
//! the duration of one resolution pass.
//!
//! Global invariants enforced:
//! - Snapshot iteration order is ascending by id (BTreeMap), which is also
//!   the documented tie-break for equal timestamps
//! - A missing `metadata` block degrades to watermark 0, never an error

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Store directory and file names, fixed by the build pipeline
pub const STORE_DIR: &str = ".functions";
pub const STORE_FILE: &str = "cache.json";

/// Build status recorded for one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    Compiling,
    Success,
    Failure,
}

/// Generated code payload of a successful build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCode {
    /// Source text of an async function declaration
    #[serde(rename = "fn")]
    pub function: String,
}

/// One persisted build attempt for a description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The description the snapshot was built from
    #[serde(rename = "do")]
    pub description: String,
    /// Creation/update time, epoch millis
    pub timestamp: i64,
    pub status: SnapshotStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<GeneratedCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Store freshness watermark
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskMetadata {
    /// "The store as of this read", epoch millis. A snapshot is current only
    /// while its timestamp is >= this watermark.
    #[serde(rename = "lastUpdated", default)]
    pub last_updated: i64,
}

/// Full in-memory view of the persisted snapshot store
///
/// `Disk::default()` is the empty store with watermark 0, the state before
/// any store has been discovered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    #[serde(default)]
    pub data: BTreeMap<String, Snapshot>,
    #[serde(default)]
    pub metadata: DiskMetadata,
}

impl Disk {
    /// Read the whole store file
    ///
    /// Always a full re-read; the store is never patched incrementally.
    pub fn load(path: &Path) -> Result<Disk> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot store: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse snapshot store: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const STORE_JSON: &str = r#"{
        "data": {
            "fn-2": {
                "do": "adds numbers",
                "timestamp": 200,
                "status": "success",
                "code": { "fn": "async function(a,b){ return a+b; }" }
            },
            "fn-1": {
                "do": "adds numbers",
                "timestamp": 100,
                "status": "failure",
                "error": "type mismatch"
            },
            "fn-3": {
                "do": "formats dates",
                "timestamp": 150,
                "status": "compiling"
            }
        },
        "metadata": { "lastUpdated": 150 }
    }"#;

    #[test]
    fn test_load_store() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(STORE_JSON.as_bytes()).unwrap();

        let disk = Disk::load(file.path()).unwrap();
        assert_eq!(disk.data.len(), 3);
        assert_eq!(disk.metadata.last_updated, 150);

        let success = &disk.data["fn-2"];
        assert_eq!(success.description, "adds numbers");
        assert_eq!(success.status, SnapshotStatus::Success);
        assert_eq!(
            success.code.as_ref().unwrap().function,
            "async function(a,b){ return a+b; }"
        );
        assert!(success.error.is_none());

        let failure = &disk.data["fn-1"];
        assert_eq!(failure.status, SnapshotStatus::Failure);
        assert_eq!(failure.error.as_deref(), Some("type mismatch"));
    }

    #[test]
    fn test_iteration_order_is_ascending_by_id() {
        let disk: Disk = serde_json::from_str(STORE_JSON).unwrap();
        let ids: Vec<&str> = disk.data.keys().map(String::as_str).collect();
        assert_eq!(ids, ["fn-1", "fn-2", "fn-3"]);
    }

    #[test]
    fn test_missing_metadata_defaults_to_zero() {
        let disk: Disk = serde_json::from_str(r#"{ "data": {} }"#).unwrap();
        assert_eq!(disk.metadata.last_updated, 0);
        assert!(disk.data.is_empty());
    }

    #[test]
    fn test_default_is_empty_store() {
        let disk = Disk::default();
        assert!(disk.data.is_empty());
        assert_eq!(disk.metadata.last_updated, 0);
    }

    #[test]
    fn test_load_malformed_store_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        assert!(Disk::load(file.path()).is_err());
    }

    #[test]
    fn test_load_missing_file_is_error() {
        assert!(Disk::load(Path::new("/nonexistent/cache.json")).is_err());
    }
}
