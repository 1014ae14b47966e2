//! Applying a ready decision to source text
//!
//! The single textual edit this system performs: inserting the generated
//! code as a trailing argument at the offset the resolver computed.

use anyhow::{bail, Result};

/// Insert `text` into `source` at byte `offset`
///
/// The offset must lie on a char boundary within the source; resolver
/// offsets always do for the text they were computed against, so a failure
/// here means the text changed since resolution.
pub fn insert_at(source: &str, offset: usize, text: &str) -> Result<String> {
    if offset > source.len() || !source.is_char_boundary(offset) {
        bail!(
            "insertion offset {} does not fall on a char boundary of the current text",
            offset
        );
    }
    let mut patched = String::with_capacity(source.len() + text.len());
    patched.push_str(&source[..offset]);
    patched.push_str(text);
    patched.push_str(&source[offset..]);
    Ok(patched)
}
