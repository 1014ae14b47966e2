//! Snapshot store discovery and change watching
//!
//! Discovers the single `.functions/cache.json` under a workspace root,
//! retrying with a fixed backoff until one exists, then watches it and
//! delivers a complete, freshly-read `Disk` to the callback on every change.
//! Deleting the store tears the watcher down and restarts discovery.
//!
//! Finding more than one store is an explicit error; the listener never
//! guesses which one to use.

use crate::disk::{Disk, STORE_DIR, STORE_FILE};
use anyhow::Result;
use notify::{EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

/// Discovery failure modes
#[derive(Debug, thiserror::Error)]
pub enum DiscoverError {
    #[error("no snapshot store found (expected {}/{})", STORE_DIR, STORE_FILE)]
    NotFound,
    #[error("multiple snapshot stores found: {}; there must be exactly one", format_paths(.0))]
    Multiple(Vec<PathBuf>),
    #[error("failed to scan workspace: {0}")]
    Io(#[from] std::io::Error),
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Listener tuning
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Delay between discovery attempts while no store exists
    pub backoff: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        WatchOptions {
            backoff: Duration::from_secs(5),
        }
    }
}

/// Find the store file under `root`
///
/// Exactly one store must exist. Zero is `NotFound` (retryable), more than
/// one is `Multiple` (fatal to this attempt).
pub fn find_store(root: &Path) -> Result<PathBuf, DiscoverError> {
    let mut found = Vec::new();
    collect_stores(root, &mut found)?;

    // Sort for a deterministic error message on the multiple-stores path
    found.sort();

    if found.len() > 1 {
        return Err(DiscoverError::Multiple(found));
    }
    found.pop().ok_or(DiscoverError::NotFound)
}

/// Recursively collect store files, skipping dependency and hidden directories
fn collect_stores(dir: &Path, found: &mut Vec<PathBuf>) -> Result<(), std::io::Error> {
    for entry in std::fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("skipping unreadable entry under {}: {}", dir.display(), err);
                continue;
            }
        };
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };

        if name == STORE_DIR {
            let store = path.join(STORE_FILE);
            if store.is_file() {
                found.push(store);
            }
            continue;
        }
        if name == "node_modules" || name.starts_with('.') {
            continue;
        }

        if let Err(err) = collect_stores(&path, found) {
            log::warn!("skipping unreadable directory {}: {}", path.display(), err);
        }
    }
    Ok(())
}

/// Retry discovery with a fixed backoff until a store appears
///
/// `Multiple` and I/O failures on the root itself propagate; `NotFound` is
/// never surfaced, only retried.
pub fn wait_for_store(root: &Path, backoff: Duration) -> Result<PathBuf> {
    loop {
        match find_store(root) {
            Ok(path) => {
                log::info!("found snapshot store at {}", path.display());
                return Ok(path);
            }
            Err(DiscoverError::NotFound) => {
                log::debug!("no snapshot store under {} yet; retrying", root.display());
                std::thread::sleep(backoff);
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Watch the store under `root`, delivering a full `Disk` on every change
///
/// The callback receives a complete, self-consistent store value each time:
/// an initial read after discovery, then one read per change/create event.
/// Unreadable intermediate states are logged and skipped, so the caller's
/// previous value stays authoritative. On store deletion (or watcher loss)
/// the watcher is torn down and discovery restarts. Runs until an
/// unrecoverable discovery or watch error.
pub fn watch_store<F>(root: &Path, options: &WatchOptions, mut on_update: F) -> Result<()>
where
    F: FnMut(Disk),
{
    loop {
        let store = wait_for_store(root, options.backoff)?;

        match Disk::load(&store) {
            Ok(disk) => on_update(disk),
            Err(err) => log::warn!("initial store read failed: {:#}", err),
        }

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |event| {
            // Receiver hang-up means we are already restarting
            let _ = tx.send(event);
        })?;
        watcher.watch(&store, RecursiveMode::NonRecursive)?;

        for event in &rx {
            let event = match event {
                Ok(event) => event,
                Err(err) => {
                    log::warn!("watch error on {}: {}", store.display(), err);
                    continue;
                }
            };
            match event.kind {
                EventKind::Remove(_) => {
                    log::info!("snapshot store removed; restarting discovery");
                    break;
                }
                EventKind::Create(_) | EventKind::Modify(_) => match Disk::load(&store) {
                    Ok(disk) => on_update(disk),
                    Err(err) => log::warn!("store re-read failed: {:#}", err),
                },
                _ => {}
            }
        }
        // Either the store was removed or the watcher backend went away;
        // both tear down to a fresh discovery cycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_store(dir: &Path) -> PathBuf {
        let store_dir = dir.join(STORE_DIR);
        fs::create_dir_all(&store_dir).unwrap();
        let store = store_dir.join(STORE_FILE);
        fs::write(&store, r#"{ "data": {}, "metadata": { "lastUpdated": 0 } }"#).unwrap();
        store
    }

    #[test]
    fn test_find_store_single() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("packages/app");
        fs::create_dir_all(&nested).unwrap();
        let store = write_store(&nested);

        assert_eq!(find_store(root.path()).unwrap(), store);
    }

    #[test]
    fn test_find_store_none() {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            find_store(root.path()),
            Err(DiscoverError::NotFound)
        ));
    }

    #[test]
    fn test_find_store_multiple_is_explicit_error() {
        let root = tempfile::tempdir().unwrap();
        let a = root.path().join("a");
        let b = root.path().join("b");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        let store_a = write_store(&a);
        let store_b = write_store(&b);

        match find_store(root.path()) {
            Err(DiscoverError::Multiple(paths)) => {
                assert_eq!(paths, vec![store_a, store_b]);
            }
            other => panic!("expected Multiple, got {:?}", other),
        }
    }

    #[test]
    fn test_find_store_skips_node_modules_and_hidden_dirs() {
        let root = tempfile::tempdir().unwrap();
        let shadowed = root.path().join("node_modules/dep");
        let hidden = root.path().join(".git/objects");
        fs::create_dir_all(&shadowed).unwrap();
        fs::create_dir_all(&hidden).unwrap();
        write_store(&shadowed);
        write_store(&hidden);

        assert!(matches!(
            find_store(root.path()),
            Err(DiscoverError::NotFound)
        ));
    }

    #[test]
    fn test_find_store_requires_cache_file() {
        // An empty .functions directory is not a store
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join(STORE_DIR)).unwrap();
        assert!(matches!(
            find_store(root.path()),
            Err(DiscoverError::NotFound)
        ));
    }
}
