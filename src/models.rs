//! Core data models used throughout code-gloss.
//!
//! These types represent the boundaries, segments, and merge results that
//! flow through the annotation pipeline.

/// One detected function definition's span within the scanned source.
///
/// Offsets are byte positions into the immutable source the scan ran
/// against. Boundaries from a single scan are strictly ordered by
/// `start_offset` and never overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary {
    /// Function name extracted from the definition line.
    pub identifier: String,
    /// Byte offset of the start of the definition line.
    pub start_offset: usize,
    /// Byte offset one past the end of the function's span.
    pub end_offset: usize,
}

/// Classification of a contiguous span of source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Text before the first function definition. Never sent to the oracle.
    Preamble,
    /// One function definition, including its definition line.
    FunctionBody,
    /// Text after the last function definition. Never sent to the oracle.
    Trailer,
}

/// One contiguous, classified span of source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    /// The definition line (without trailing newline) for function bodies;
    /// `None` for preamble and trailer segments.
    pub definition_line: Option<String>,
    /// Text after the definition line. Equals `raw_text` for non-functions.
    pub body: String,
    /// Verbatim original text of the span. Concatenating all segments'
    /// `raw_text` in order reproduces the source byte-for-byte.
    pub raw_text: String,
}

impl Segment {
    /// Name to show in progress output and skip reports.
    pub fn display_name(&self) -> &str {
        match self.kind {
            SegmentKind::Preamble => "(preamble)",
            SegmentKind::Trailer => "(trailer)",
            SegmentKind::FunctionBody => {
                self.definition_line.as_deref().unwrap_or("(function)")
            }
        }
    }
}

/// Result of merging oracle output back against an original segment.
///
/// When the merge rejects the oracle's edit, `accepted` is `false` and
/// `annotated_text` equals the original's `raw_text` unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedSegment {
    pub original: Segment,
    pub annotated_text: String,
    pub accepted: bool,
}

impl AnnotatedSegment {
    /// An unmodified pass-through of the original segment.
    pub fn rejected(original: &Segment) -> Self {
        Self {
            annotated_text: original.raw_text.clone(),
            original: original.clone(),
            accepted: false,
        }
    }
}
