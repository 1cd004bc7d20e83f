//! Boundary-driven source segmentation.
//!
//! Splits source text into an ordered sequence of [`Segment`]s: one
//! preamble (possibly empty) before the first boundary, then one
//! function-body segment per boundary. The last function body extends to
//! end-of-source, so no trailing segment is needed. Concatenating every
//! segment's `raw_text` in order reproduces the original source
//! byte-for-byte — the rest of the pipeline depends on that invariant.

use crate::models::{Boundary, Segment, SegmentKind};

/// Split `source` into segments according to `boundaries`.
///
/// `boundaries` must be ordered and non-overlapping, as produced by
/// [`crate::boundary::find_boundaries`]. With no boundaries the whole
/// source becomes a single preamble segment.
pub fn split(source: &str, boundaries: &[Boundary]) -> Vec<Segment> {
    let preamble_end = boundaries
        .first()
        .map(|b| b.start_offset)
        .unwrap_or(source.len());

    let mut segments = Vec::with_capacity(boundaries.len() + 1);
    segments.push(Segment {
        kind: SegmentKind::Preamble,
        definition_line: None,
        body: source[..preamble_end].to_string(),
        raw_text: source[..preamble_end].to_string(),
    });

    for boundary in boundaries {
        let raw = &source[boundary.start_offset..boundary.end_offset];
        let (definition_line, body) = match raw.find('\n') {
            Some(pos) => (&raw[..pos], &raw[pos + 1..]),
            None => (raw, ""),
        };
        segments.push(Segment {
            kind: SegmentKind::FunctionBody,
            definition_line: Some(definition_line.to_string()),
            body: body.to_string(),
            raw_text: raw.to_string(),
        });
    }

    segments
}
