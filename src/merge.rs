//! Safety merge of oracle output against the original segment.
//!
//! The oracle is prompted to *add* comments or docstrings, but nothing
//! stops it from rewriting executable code. This module enforces the
//! invariant that only pure-insertion edits survive:
//!
//! - **comment style** — a longest-common-subsequence line diff of the
//!   original against the oracle text; accepted only when every original
//!   line appears verbatim, in order, in the oracle text, and every
//!   inserted line is blank or comment-only.
//! - **docstring style** — the oracle text is wrapped as one contiguous
//!   docstring block inserted directly after the definition line; any
//!   existing docstring is stripped first and the rest of the body is
//!   carried over verbatim, so executable code cannot change.
//!
//! A rejected merge returns the original text untouched with
//! `accepted = false`.

use crate::boundary::LanguageProfile;
use crate::models::{AnnotatedSegment, Segment};

/// What kind of annotation the oracle is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationStyle {
    /// Inline comments interleaved with the function body.
    Comments,
    /// One docstring block inserted after the definition line.
    Docstring,
}

/// Style plus the language-specific lexical details the merge needs.
#[derive(Debug, Clone)]
pub struct MergePolicy {
    pub style: AnnotationStyle,
    pub comment_prefix: String,
    pub docstring_delimiters: Vec<String>,
}

impl MergePolicy {
    pub fn new(style: AnnotationStyle, profile: &dyn LanguageProfile) -> Self {
        Self {
            style,
            comment_prefix: profile.comment_prefix().to_string(),
            docstring_delimiters: profile
                .literal_delimiters()
                .iter()
                .map(|d| d.to_string())
                .collect(),
        }
    }
}

/// Merge `oracle_text` against `original`, accepting only additive edits.
pub fn merge(original: &Segment, oracle_text: &str, policy: &MergePolicy) -> AnnotatedSegment {
    match policy.style {
        AnnotationStyle::Comments => merge_comments(original, oracle_text, policy),
        AnnotationStyle::Docstring => merge_docstring(original, oracle_text, policy),
    }
}

fn merge_comments(original: &Segment, oracle_text: &str, policy: &MergePolicy) -> AnnotatedSegment {
    // A function's span ends with the blank lines separating it from the
    // next definition, but oracle generation halts at the stop sequence
    // and loses them. Diff without the tails and restore the original's
    // afterwards so that never counts as a deletion.
    let (orig_head, orig_tail) = split_trailing_blanks(&original.raw_text);
    let (new_head, _) = split_trailing_blanks(oracle_text);

    let orig_lines: Vec<&str> = orig_head.lines().collect();
    let new_lines: Vec<&str> = new_head.lines().collect();

    let table = lcs_table(&orig_lines, &new_lines);

    // Every original line must survive; anything less means a deletion
    // or substitution slipped in.
    if table[orig_lines.len()][new_lines.len()] < orig_lines.len() {
        return AnnotatedSegment::rejected(original);
    }

    let inserted = inserted_lines(&table, &orig_lines, &new_lines);
    let prefix = policy.comment_prefix.as_str();
    if inserted
        .iter()
        .any(|line| !line.trim().is_empty() && !line.trim_start().starts_with(prefix))
    {
        return AnnotatedSegment::rejected(original);
    }

    let mut annotated = match_trailing_newline(new_head, orig_head);
    annotated.push_str(orig_tail);

    AnnotatedSegment {
        original: original.clone(),
        annotated_text: annotated,
        accepted: true,
    }
}

/// Split off the run of blank lines (and any trailing newline-free
/// whitespace) at the end of `text`.
fn split_trailing_blanks(text: &str) -> (&str, &str) {
    let mut cut = text.len();
    for line in text.split_inclusive('\n').rev() {
        if line.trim().is_empty() {
            cut -= line.len();
        } else {
            break;
        }
    }
    (&text[..cut], &text[cut..])
}

fn merge_docstring(original: &Segment, oracle_text: &str, policy: &MergePolicy) -> AnnotatedSegment {
    let Some(def_line) = original.definition_line.as_deref() else {
        return AnnotatedSegment::rejected(original);
    };

    let text = oracle_text.trim();
    if text.is_empty() {
        return AnnotatedSegment::rejected(original);
    }
    // A delimiter inside the docstring would terminate it early and leak
    // the rest of the oracle output into executable position.
    if policy
        .docstring_delimiters
        .iter()
        .any(|d| text.contains(d.as_str()))
    {
        return AnnotatedSegment::rejected(original);
    }

    let delim = policy
        .docstring_delimiters
        .first()
        .map(String::as_str)
        .unwrap_or("\"\"\"");
    let body_indent: String = def_line
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .chain("    ".chars())
        .collect();

    let stripped = strip_leading_docstring(&original.body, &policy.docstring_delimiters);

    let mut annotated = format!(
        "{}\n{}{}{}\n{}{}\n{}",
        def_line, body_indent, delim, text, body_indent, delim, stripped
    );
    annotated = match_trailing_newline(&annotated, &original.raw_text);

    AnnotatedSegment {
        original: original.clone(),
        annotated_text: annotated,
        accepted: true,
    }
}

/// Remove a docstring sitting at the top of a function body, if any.
/// Leading blank lines are preserved; a malformed (unterminated)
/// docstring leaves the body untouched.
fn strip_leading_docstring(body: &str, delims: &[String]) -> String {
    let mut idx = 0usize;
    for line in body.split_inclusive('\n') {
        if line.trim().is_empty() {
            idx += line.len();
            continue;
        }
        let trimmed = line.trim_start();
        let Some(delim) = delims.iter().find(|d| trimmed.starts_with(d.as_str())) else {
            return body.to_string();
        };
        // Opening delimiter is within this line by construction.
        let open = idx + (line.len() - trimmed.len());
        let search_from = open + delim.len();
        let Some(rel) = body[search_from..].find(delim.as_str()) else {
            return body.to_string();
        };
        let close_end = search_from + rel + delim.len();
        let line_end = match body[close_end..].find('\n') {
            Some(p) => close_end + p + 1,
            None => body.len(),
        };
        return format!("{}{}", &body[..idx], &body[line_end..]);
    }
    body.to_string()
}

/// Give `text` the same trailing-newline shape as `reference`, in both
/// directions: a source that ends without a newline keeps ending without
/// one after the merge.
fn match_trailing_newline(text: &str, reference: &str) -> String {
    let mut out = text.to_string();
    if reference.ends_with('\n') {
        if !out.ends_with('\n') {
            out.push('\n');
        }
    } else if out.ends_with('\n') {
        out.pop();
    }
    out
}

/// LCS length table: `table[i][j]` = LCS of `a[..i]` and `b[..j]`.
fn lcs_table(a: &[&str], b: &[&str]) -> Vec<Vec<usize>> {
    let mut table = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            table[i][j] = if a[i - 1] == b[j - 1] {
                table[i - 1][j - 1] + 1
            } else {
                table[i - 1][j].max(table[i][j - 1])
            };
        }
    }
    table
}

/// Lines of `b` not matched by the LCS alignment. Only meaningful when
/// every line of `a` was matched.
fn inserted_lines<'b>(table: &[Vec<usize>], a: &[&str], b: &[&'b str]) -> Vec<&'b str> {
    let mut inserted = Vec::new();
    let (mut i, mut j) = (a.len(), b.len());
    while i > 0 && j > 0 {
        if a[i - 1] == b[j - 1] {
            i -= 1;
            j -= 1;
        } else if table[i - 1][j] >= table[i][j - 1] {
            i -= 1;
        } else {
            inserted.push(b[j - 1]);
            j -= 1;
        }
    }
    while j > 0 {
        inserted.push(b[j - 1]);
        j -= 1;
    }
    inserted.reverse();
    inserted
}
