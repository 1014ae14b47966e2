//! Correlation of compiler calls with store snapshots
//!
//! Each pass is a pure function of (current text, extracted calls, disk):
//! no state survives between passes, so identity is always re-derived fresh.
//!
//! Global invariants enforced:
//! - A call whose chunk pattern no longer matches yields no decision at all;
//!   stale information is never shown for changed code
//! - Candidate selection is deterministic: greatest timestamp, then smallest
//!   snapshot id
//! - A malformed success payload is swallowed (no decision), never propagated

use crate::disk::{Disk, Snapshot, SnapshotStatus};
use crate::extract::CompilerCall;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Display decision for one call site, one pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Byte range of the chunk-pattern match in the current text; the anchor
    /// for any presentational affordance
    pub anchor_start: usize,
    pub anchor_end: usize,
    #[serde(flatten)]
    pub kind: DecisionKind,
}

/// The display state of a call site plus any payload needed to act on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum DecisionKind {
    /// Not yet (re)compiled for the current state of the store
    Pending,
    /// The build pipeline is working on this description
    InProgress,
    /// The last build failed; carries the error text for a copy affordance
    Failed { error: String },
    /// The last build succeeded; carries the rewritten code and the byte
    /// offset at which to insert it (as a trailing call argument)
    Ready { insert_at: usize, code: String },
}

/// Resolve every call against the current text and store
///
/// Emits at most one decision per call, in call order. Calls whose anchor is
/// lost, or whose success payload is malformed, are silently dropped.
pub fn resolve(source: &str, calls: &[CompilerCall], disk: &Disk) -> Vec<Decision> {
    calls
        .iter()
        .filter_map(|call| resolve_call(source, call, disk))
        .collect()
}

fn resolve_call(source: &str, call: &CompilerCall, disk: &Disk) -> Option<Decision> {
    // 1. Re-locate the call in the current text. No match means the interior
    //    diverged since extraction (or the call is gone).
    let anchor = call.chunk.find(source)?;

    // 2. Join against the store by description, pick the authoritative
    //    candidate: greatest timestamp, ties to the smallest id.
    let selected = disk
        .data
        .iter()
        .filter(|(_, snapshot)| call.description.is_match(&snapshot.description))
        .max_by(|(id_a, a), (id_b, b)| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| id_b.cmp(id_a))
        })
        .map(|(_, snapshot)| snapshot);

    let kind = match selected {
        // No build recorded for this description yet
        None => DecisionKind::Pending,
        // Superseded by a newer store generation
        Some(snapshot) if snapshot.timestamp < disk.metadata.last_updated => {
            DecisionKind::Pending
        }
        Some(snapshot) => match snapshot.status {
            SnapshotStatus::Compiling => DecisionKind::InProgress,
            SnapshotStatus::Failure => DecisionKind::Failed {
                error: snapshot.error.clone().unwrap_or_default(),
            },
            SnapshotStatus::Success => {
                ready_kind(source, anchor.start(), anchor.end(), snapshot)?
            }
        },
    };

    Some(Decision {
        anchor_start: anchor.start(),
        anchor_end: anchor.end(),
        kind,
    })
}

/// Build the `ready` payload, or `None` when the stored code is not a
/// recognizable async function declaration or the anchor has no closing brace
fn ready_kind(
    source: &str,
    anchor_start: usize,
    anchor_end: usize,
    snapshot: &Snapshot,
) -> Option<DecisionKind> {
    let code = snapshot.code.as_ref()?;
    let arrow = rewrite_async_fn(&code.function)?;
    let insert_at = insertion_offset(source, anchor_start, anchor_end)?;
    Some(DecisionKind::Ready {
        insert_at,
        // Appended as an additional trailing argument to the call
        code: format!(", {}", arrow),
    })
}

/// Rewrite an async function declaration into an anonymous async arrow with
/// the identical parameter list and body
///
/// `async function sum(a, b) { return a + b; }` becomes
/// `async (a, b) => { return a + b; }`.
fn rewrite_async_fn(code: &str) -> Option<String> {
    static ASYNC_FN_RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let async_fn_re = ASYNC_FN_RE.get_or_init(|| {
        Regex::new(
            r"(?s)^\s*async\s+function\s*(?:[A-Za-z_$][A-Za-z0-9_$]*)?\s*\(([^)]*)\)\s*\{(.*)\}\s*$",
        )
        .unwrap()
    });

    let caps = async_fn_re.captures(code)?;
    Some(format!("async ({}) => {{{}}}", &caps[1], &caps[2]))
}

/// Offset immediately after the last closing brace within the anchor range
fn insertion_offset(source: &str, anchor_start: usize, anchor_end: usize) -> Option<usize> {
    let brace = source.get(anchor_start..anchor_end)?.rfind('}')?;
    Some(anchor_start + brace + 1)
}
