//! TypeScript and JavaScript parser using SWC
//!
//! Global invariants enforced:
//! - Deterministic parsing order
//! - A parse failure is a hard failure for the whole pass, never a partial result

use anyhow::Result;
use swc_common::{sync::Lrc, FileName, SourceFile, SourceMap};
use swc_ecma_ast::{EsVersion, Module};
use swc_ecma_parser::{lexer::Lexer, Parser, StringInput, Syntax};

/// Determine the appropriate syntax configuration based on file extension
///
/// Source files are a typed superset of ECMAScript, so everything parses as
/// TypeScript; JSX is enabled only for `.tsx`/`.jsx` files because it makes
/// `<T>(...)` generic arrows ambiguous in plain `.ts`.
fn syntax_for_file(filename: &str) -> Syntax {
    let jsx = filename.ends_with(".tsx") || filename.ends_with(".jsx");
    Syntax::Typescript(swc_ecma_parser::TsSyntax {
        tsx: jsx,
        decorators: false,
        dts: filename.ends_with(".d.ts"),
        ..Default::default()
    })
}

/// Parse TypeScript, JavaScript, JSX, or TSX source code into an AST module
///
/// Returns an error on any parse failure. Callers must treat "cannot parse"
/// as "no call sites for this revision", not as a crash.
pub fn parse_source(src: &str, source_map: &Lrc<SourceMap>, filename: &str) -> Result<Module> {
    let syntax = syntax_for_file(filename);

    let source_file: Lrc<SourceFile> = source_map.new_source_file(
        FileName::Custom(filename.into()).into(),
        src.to_string(),
    );

    let input = StringInput::from(&*source_file);

    let lexer = Lexer::new(syntax, EsVersion::Es2022, input, None);

    let mut parser = Parser::new_from(lexer);

    parser.parse_module().map_err(|e| {
        let error_msg = e.kind().msg();
        anyhow::anyhow!("Parse error: {}", error_msg)
            .context(format!("Failed to parse source file: {}", filename))
    })
}
