//! Funclens core library - correlates declarative compiler calls with build snapshots
//!
//! Source text identifies its compiler calls structurally, not positionally:
//! a chunk pattern re-locates each call only while its interior is unchanged,
//! and a description pattern joins the call against snapshots recorded by the
//! external build pipeline. Each resolution pass is recomputed from scratch.

#![deny(warnings)]

// Global invariants enforced in this crate:
// - A resolution pass is a pure function of (text, calls, disk)
// - No state is cached across passes; identity is re-derived fresh each time
// - Deterministic traversal and selection order must be explicit
// - Whitespace-only changes must not affect whether a call is re-located

pub mod apply;
pub mod disk;
pub mod extract;
pub mod listener;
pub mod matcher;
pub mod parser;
pub mod resolve;

pub use disk::{Disk, DiskMetadata, GeneratedCode, Snapshot, SnapshotStatus};
pub use extract::{extract_compiler_calls, CompilerCall};
pub use listener::{find_store, watch_store, DiscoverError, WatchOptions};
pub use resolve::{resolve, Decision, DecisionKind};

use anyhow::Result;
use swc_common::{sync::Lrc, SourceMap};

/// Run one full extraction + resolution pass over a source text
///
/// Parse failures propagate; callers should treat them as "no call sites for
/// this revision" at the presentation layer, never as a crash.
pub fn resolve_source(source: &str, filename: &str, disk: &Disk) -> Result<Vec<Decision>> {
    let cm: Lrc<SourceMap> = Default::default();
    let module = parser::parse_source(source, &cm, filename)?;
    let calls = extract::extract_compiler_calls(&module, source, &cm);
    Ok(resolve::resolve(source, &calls, disk))
}

/// Extract the compiler calls of a source text without resolving them
pub fn scan_source(source: &str, filename: &str) -> Result<Vec<CompilerCall>> {
    let cm: Lrc<SourceMap> = Default::default();
    let module = parser::parse_source(source, &cm, filename)?;
    Ok(extract::extract_compiler_calls(&module, source, &cm))
}
