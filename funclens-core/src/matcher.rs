//! Pattern construction for structural call-site identity
//!
//! Two kinds of patterns are built from a call expression:
//! - a chunk pattern, which re-locates the call in the current text only if
//!   its interior is unchanged (whitespace runs excepted), and
//! - a description pattern, which identifies the semantic label of the call
//!   independent of position.
//!
//! Global invariants enforced:
//! - Formatting and whitespace must not affect whether a chunk pattern matches
//! - Any non-whitespace edit inside the span must break the chunk pattern

use regex::Regex;

/// Build the chunk pattern for a call spanning `start_line..=end_line` (1-based)
///
/// Takes the full original lines of the span (line-level granularity is
/// intentional: siblings sharing a line are included, trading a little
/// over-matching for simplicity), trims each, joins with single spaces,
/// escapes regex metacharacters, and widens every whitespace run to `\s*`.
///
/// Returns `None` when the line range does not resolve against the source;
/// such calls are excluded from extraction entirely.
pub fn chunk_pattern(source: &str, start_line: usize, end_line: usize) -> Option<Regex> {
    if start_line == 0 || end_line < start_line {
        return None;
    }
    let lines: Vec<&str> = source.lines().collect();
    if end_line > lines.len() {
        return None;
    }

    let joined = lines[start_line - 1..end_line]
        .iter()
        .map(|line| line.trim())
        .collect::<Vec<_>>()
        .join(" ");

    let escaped = regex::escape(joined.trim());
    Regex::new(&collapse_whitespace(&escaped)).ok()
}

/// Build the description pattern for a plain string literal `do` value
///
/// The pattern matches the literal as a substring, nothing looser.
pub fn literal_pattern(value: &str) -> Option<Regex> {
    Regex::new(&regex::escape(value)).ok()
}

/// Build the description pattern for a template literal `do` value
///
/// Cooked chunks are escaped and joined with `.*`, so the pattern matches any
/// instantiation of the template whose literal boundaries are unchanged,
/// regardless of interpolated values.
pub fn template_pattern(cooked_chunks: &[String]) -> Option<Regex> {
    let pattern = cooked_chunks
        .iter()
        .map(|chunk| regex::escape(chunk))
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&pattern).ok()
}

/// Replace every run of whitespace in an escaped pattern with `\s*`
fn collapse_whitespace(escaped: &str) -> String {
    let mut pattern = String::with_capacity(escaped.len());
    let mut in_run = false;
    for ch in escaped.chars() {
        if ch.is_whitespace() {
            if !in_run {
                pattern.push_str(r"\s*");
                in_run = true;
            }
        } else {
            in_run = false;
            pattern.push(ch);
        }
    }
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "\
const sum = compiler({
  do: \"adds numbers\",
  in: z.number().array(),
  out: z.number(),
});";

    #[test]
    fn test_chunk_round_trip() {
        let pattern = chunk_pattern(SOURCE, 1, 5).unwrap();
        assert!(pattern.is_match(SOURCE));
    }

    #[test]
    fn test_chunk_matches_reformatted_source() {
        let pattern = chunk_pattern(SOURCE, 1, 5).unwrap();
        let reformatted =
            "const sum = compiler({ do: \"adds numbers\", in: z.number().array(), out: z.number(), });";
        assert!(pattern.is_match(reformatted));

        let reindented = SOURCE.replace("  ", "\t\t");
        assert!(pattern.is_match(&reindented));
    }

    #[test]
    fn test_chunk_rejects_edited_interior() {
        let pattern = chunk_pattern(SOURCE, 1, 5).unwrap();
        let edited = SOURCE.replace("adds numbers", "adds integers");
        assert!(!pattern.is_match(&edited));

        let retyped = SOURCE.replace("z.number()", "z.bigint()");
        assert!(!pattern.is_match(&retyped));
    }

    #[test]
    fn test_chunk_matches_at_any_offset() {
        let pattern = chunk_pattern(SOURCE, 1, 5).unwrap();
        let embedded = format!("// preamble\nlet x = 1;\n{}\nlet y = 2;\n", SOURCE);
        assert!(pattern.is_match(&embedded));
    }

    #[test]
    fn test_chunk_escapes_metacharacters() {
        // Dots and parens in the source must match literally, not as regex
        let pattern = chunk_pattern(SOURCE, 3, 3).unwrap();
        assert!(pattern.is_match("in: z.number().array(),"));
        assert!(!pattern.is_match("in: zXnumber()Xarray(),"));
    }

    #[test]
    fn test_chunk_out_of_range_lines() {
        assert!(chunk_pattern(SOURCE, 0, 2).is_none());
        assert!(chunk_pattern(SOURCE, 4, 2).is_none());
        assert!(chunk_pattern(SOURCE, 1, 99).is_none());
    }

    #[test]
    fn test_literal_pattern_matches_exact_substring() {
        let pattern = literal_pattern("ABC").unwrap();
        assert!(pattern.is_match("ABC"));
        assert!(pattern.is_match("xx ABC yy"));
        assert!(!pattern.is_match("AB C"));
    }

    #[test]
    fn test_literal_pattern_escapes_metacharacters() {
        let pattern = literal_pattern("a+b (c)").unwrap();
        assert!(pattern.is_match("a+b (c)"));
        assert!(!pattern.is_match("aab c"));
    }

    #[test]
    fn test_template_pattern_wildcards_interpolations() {
        let pattern = template_pattern(&["ABC".to_string(), "ABC".to_string()]).unwrap();
        assert!(pattern.is_match("ABCABC"));
        assert!(pattern.is_match("ABC anything at all ABC"));
        assert!(!pattern.is_match("ABC only once"));
    }

    #[test]
    fn test_template_pattern_single_chunk() {
        // A template with no interpolations behaves like a string literal
        let pattern = template_pattern(&["ABC".to_string()]).unwrap();
        assert!(pattern.is_match("ABC"));
    }
}
