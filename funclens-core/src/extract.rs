//! Compiler-call extraction from the AST
//!
//! Finds every call expression whose first argument is an object literal with
//! a `do` field, and derives the two identity patterns for it.
//!
//! Global invariants enforced:
//! - Deterministic output order by span start (source order)
//! - A call is emitted with both patterns or not at all, never partially
//!
//! Ignored constructs:
//! - Calls without arguments, or whose first argument is not an object literal
//! - `do` keys that are computed or non-identifier
//! - `do` values that are not a plain string literal or a template literal
//!   with cooked segments

use crate::matcher;
use regex::Regex;
use swc_common::{BytePos, SourceMap};
use swc_ecma_ast::*;
use swc_ecma_visit::{Visit, VisitWith};

/// A detected compiler call, identified by its two patterns
///
/// `chunk` matches the current text only while the call's interior is
/// unchanged; `description` matches the semantic label the call was built
/// from, independent of position.
#[derive(Debug, Clone)]
pub struct CompilerCall {
    pub chunk: Regex,
    pub description: Regex,
}

/// Collect all compiler calls from a parsed module
///
/// Returns calls sorted deterministically by span start position.
pub fn extract_compiler_calls(
    module: &Module,
    source: &str,
    source_map: &SourceMap,
) -> Vec<CompilerCall> {
    let mut collector = CallCollector {
        source,
        source_map,
        calls: Vec::new(),
    };

    module.visit_with(&mut collector);

    // Sort by span start for deterministic ordering
    collector.calls.sort_by_key(|(lo, _)| *lo);

    collector.calls.into_iter().map(|(_, call)| call).collect()
}

/// Visitor to collect qualifying call expressions from the AST
struct CallCollector<'a> {
    source: &'a str,
    source_map: &'a SourceMap,
    calls: Vec<(BytePos, CompilerCall)>,
}

impl Visit for CallCollector<'_> {
    fn visit_call_expr(&mut self, call: &CallExpr) {
        if let Some(compiler_call) = self.qualify(call) {
            self.calls.push((call.span.lo, compiler_call));
        }

        // Continue visiting children (calls nest inside call arguments)
        call.visit_children_with(self);
    }
}

impl CallCollector<'_> {
    /// Derive both patterns for a call, or `None` if it does not qualify
    fn qualify(&self, call: &CallExpr) -> Option<CompilerCall> {
        // A call without a resolvable source span cannot be re-located
        if call.span.is_dummy() {
            return None;
        }

        let first = call.args.first()?;
        if first.spread.is_some() {
            return None;
        }

        let obj = match &*first.expr {
            Expr::Object(obj) => obj,
            _ => return None,
        };

        let description = description_pattern(find_do_value(obj)?)?;

        let start_line = self.source_map.lookup_char_pos(call.span.lo).line;
        let end_line = self.source_map.lookup_char_pos(call.span.hi).line;
        let chunk = matcher::chunk_pattern(self.source, start_line, end_line)?;

        Some(CompilerCall { chunk, description })
    }
}

/// Find the value of a plain-identifier `do` property, if any
fn find_do_value(obj: &ObjectLit) -> Option<&Expr> {
    for prop in &obj.props {
        let prop = match prop {
            PropOrSpread::Prop(prop) => prop,
            PropOrSpread::Spread(_) => continue,
        };
        let kv = match &**prop {
            Prop::KeyValue(kv) => kv,
            _ => continue,
        };
        let key = match &kv.key {
            PropName::Ident(ident) => ident,
            _ => continue,
        };
        if &*key.sym == "do" {
            return Some(&kv.value);
        }
    }
    None
}

/// Build a description pattern from a recognized literal `do` value
fn description_pattern(value: &Expr) -> Option<Regex> {
    match value {
        Expr::Lit(Lit::Str(str_lit)) => {
            // Wtf8Atom to String via to_atom_lossy (borrows when possible)
            let text = str_lit.value.to_atom_lossy().to_string();
            matcher::literal_pattern(&text)
        }
        Expr::Tpl(tpl) => {
            let mut chunks = Vec::with_capacity(tpl.quasis.len());
            for quasi in &tpl.quasis {
                // Segments with invalid escapes have no cooked value; the
                // whole call is unrecognized in that case
                let cooked = quasi.cooked.as_ref()?;
                chunks.push(cooked.to_atom_lossy().to_string());
            }
            matcher::template_pattern(&chunks)
        }
        _ => None,
    }
}
