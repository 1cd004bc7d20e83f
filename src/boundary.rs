//! Function-boundary detection over raw source text.
//!
//! Scans source line by line and records the span of every function
//! definition. Matching is guarded by a small lexical state machine
//! (states `Code` / `InLiteral`) so definition-like text inside
//! multi-line string literals and docstrings is never mistaken for a
//! real definition — the classic failure mode of pure line-pattern
//! matching.
//!
//! Language knowledge lives behind the [`LanguageProfile`] trait; use
//! [`create_profile`] to instantiate one by name.

use anyhow::{bail, Result};
use regex::Regex;

use crate::models::Boundary;

/// Language-specific knowledge needed to locate function definitions.
///
/// A profile supplies the definition-start predicate, the identifier
/// extractor for a matched line, and the lexical details (string
/// delimiters, comment prefix) the scanner needs to avoid matching
/// inside literals.
pub trait LanguageProfile: Send + Sync {
    /// Profile name as used in configuration (e.g. `"python"`).
    fn name(&self) -> &str;

    /// If `line` opens a function definition, returns the function's
    /// identifier. `line` may include its trailing newline.
    fn definition_identifier(&self, line: &str) -> Option<String>;

    /// Multi-line string delimiters that can hide definition-like text
    /// (e.g. `"""` and `'''` for Python).
    fn literal_delimiters(&self) -> &[&'static str];

    /// Single-line comment prefix (e.g. `"#"`).
    fn comment_prefix(&self) -> &str;
}

/// Lexical scanner state, carried across lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Code,
    InLiteral(&'static str),
}

/// Profile for Python source: `def` / `async def` at any indentation.
pub struct PythonProfile {
    def_re: Regex,
}

impl PythonProfile {
    pub fn new() -> Result<Self> {
        let def_re = Regex::new(r"^[ \t]*(?:async[ \t]+)?def[ \t]+([A-Za-z_][A-Za-z0-9_]*)[ \t]*\(")?;
        Ok(Self { def_re })
    }
}

impl LanguageProfile for PythonProfile {
    fn name(&self) -> &str {
        "python"
    }

    fn definition_identifier(&self, line: &str) -> Option<String> {
        self.def_re
            .captures(line)
            .map(|caps| caps[1].to_string())
    }

    fn literal_delimiters(&self) -> &[&'static str] {
        &["\"\"\"", "'''"]
    }

    fn comment_prefix(&self) -> &str {
        "#"
    }
}

/// Create the [`LanguageProfile`] named in configuration.
pub fn create_profile(language: &str) -> Result<Box<dyn LanguageProfile>> {
    match language {
        "python" => Ok(Box::new(PythonProfile::new()?)),
        other => bail!("Unknown language profile: '{}'. Must be python.", other),
    }
}

/// Find ordered, non-overlapping function-definition spans in `source`.
///
/// A boundary's span runs from the start of its definition line to the
/// start of the next recognized definition, or end-of-source. With
/// `top_level_only`, indented definitions are folded into their
/// enclosing function's span rather than split out. Zero matches is a
/// valid result, not an error.
pub fn find_boundaries(
    source: &str,
    profile: &dyn LanguageProfile,
    top_level_only: bool,
) -> Vec<Boundary> {
    let mut starts: Vec<(String, usize)> = Vec::new();
    let mut state = ScanState::Code;
    let mut offset = 0usize;

    for line in source.split_inclusive('\n') {
        if state == ScanState::Code {
            if let Some(identifier) = profile.definition_identifier(line) {
                let indent = line.len() - line.trim_start_matches([' ', '\t']).len();
                if !top_level_only || indent == 0 {
                    starts.push((identifier, offset));
                }
            }
        }
        state = advance_line(state, line, profile);
        offset += line.len();
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, (identifier, start))| Boundary {
            identifier: identifier.clone(),
            start_offset: *start,
            end_offset: starts.get(i + 1).map(|(_, s)| *s).unwrap_or(source.len()),
        })
        .collect()
}

/// Advance the lexical state across one line.
///
/// In `Code`, single-line strings are skipped in place, a comment prefix
/// consumes the rest of the line, and a multi-line delimiter switches to
/// `InLiteral`. In `InLiteral`, only the matching unescaped closing
/// delimiter returns to `Code`.
fn advance_line(state: ScanState, line: &str, profile: &dyn LanguageProfile) -> ScanState {
    let bytes = line.as_bytes();
    let comment = profile.comment_prefix().as_bytes();
    let mut state = state;
    let mut i = 0usize;

    while i < bytes.len() {
        match state {
            ScanState::InLiteral(delim) => match find_unescaped(bytes, i, delim.as_bytes()) {
                Some(pos) => {
                    state = ScanState::Code;
                    i = pos + delim.len();
                }
                None => return state,
            },
            ScanState::Code => {
                if bytes[i..].starts_with(comment) {
                    return state;
                }
                if let Some(delim) = profile
                    .literal_delimiters()
                    .iter()
                    .find(|d| bytes[i..].starts_with(d.as_bytes()))
                {
                    state = ScanState::InLiteral(delim);
                    i += delim.len();
                } else if bytes[i] == b'"' || bytes[i] == b'\'' {
                    // Single-line string: skip to its closing quote so quote
                    // characters inside it cannot open a multi-line literal.
                    let quote = [bytes[i]];
                    match find_unescaped(bytes, i + 1, &quote) {
                        Some(pos) => i = pos + 1,
                        None => return state, // unterminated; not our problem
                    }
                } else {
                    i += 1;
                }
            }
        }
    }

    state
}

/// Find `pat` in `bytes` at or after `from`, skipping backslash escapes.
fn find_unescaped(bytes: &[u8], from: usize, pat: &[u8]) -> Option<usize> {
    let mut i = from;
    while i + pat.len() <= bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i..].starts_with(pat) {
            return Some(i);
        }
        i += 1;
    }
    None
}
