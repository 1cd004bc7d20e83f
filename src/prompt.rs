//! Oracle prompt construction.
//!
//! Builds the exact text sent to the completion oracle for one segment.
//! Two modes share one code path:
//!
//! - **growing** — the prompt carries everything annotated so far plus the
//!   current segment, so the oracle sees naming and style already
//!   established. Prompt size is capped; overflow truncates the oldest
//!   context first, at line boundaries.
//! - **fixed_example** — the prompt carries a static worked-example asset
//!   plus only the current segment. Size is bounded and segments become
//!   independent of each other.
//!
//! The sentinel is a marker line appended after the segment telling the
//! oracle where annotation begins; the stop sequence is chosen to match
//! the start of the next structural unit so generation halts there.

use anyhow::{Context, Result};

use crate::config::{OracleConfig, PromptConfig};
use crate::merge::AnnotationStyle;
use crate::models::Segment;

/// How much prior context a prompt carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMode {
    Growing,
    FixedExample,
}

/// A fully assembled prompt for one segment.
#[derive(Debug, Clone)]
pub struct Prompt {
    /// Prior context plus the current segment's raw text.
    pub context: String,
    /// Worked-example text (fixed_example mode only).
    pub example: Option<String>,
    /// Marker line telling the oracle where to begin annotating.
    pub sentinel: String,
    /// The definition line restated after the sentinel to prime generation.
    pub primer: String,
    /// Literal string the oracle must stop at.
    pub stop_sequence: String,
}

impl Prompt {
    /// The single string payload sent to the oracle.
    pub fn payload(&self) -> String {
        let mut out = String::new();
        if let Some(example) = &self.example {
            out.push_str(example);
            if !out.ends_with('\n') {
                out.push('\n');
            }
            out.push('\n');
        }
        out.push_str(&self.context);
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&self.sentinel);
        out.push('\n');
        out.push_str(&self.primer);
        out.push('\n');
        out
    }
}

/// Builds prompts for function segments according to configuration.
pub struct PromptBuilder {
    mode: ContextMode,
    sentinel: String,
    stop_sequence: String,
    max_context_chars: usize,
    example: Option<String>,
}

impl PromptBuilder {
    /// Create a builder for the configured mode and annotation style.
    ///
    /// In fixed_example mode the worked-example asset is loaded here; a
    /// missing asset is a fatal configuration error in that mode only.
    pub fn new(
        prompt: &PromptConfig,
        oracle: &OracleConfig,
        style: AnnotationStyle,
    ) -> Result<Self> {
        let mode = prompt.mode();

        let example = match mode {
            ContextMode::FixedExample => Some(
                std::fs::read_to_string(&prompt.example_path).with_context(|| {
                    format!(
                        "Failed to read worked-example asset: {}",
                        prompt.example_path.display()
                    )
                })?,
            ),
            ContextMode::Growing => None,
        };

        let sentinel = prompt
            .sentinel
            .clone()
            .unwrap_or_else(|| default_sentinel(style).to_string());
        let stop_sequence = oracle
            .stop
            .clone()
            .unwrap_or_else(|| default_stop(style).to_string());

        Ok(Self {
            mode,
            sentinel,
            stop_sequence,
            max_context_chars: prompt.max_context_chars,
            example,
        })
    }

    pub fn mode(&self) -> ContextMode {
        self.mode
    }

    pub fn stop_sequence(&self) -> &str {
        &self.stop_sequence
    }

    /// Build the prompt for one function segment.
    ///
    /// `accumulated` is the rewritten-so-far source (growing mode reads
    /// it, fixed_example mode ignores it).
    pub fn build(&self, segment: &Segment, accumulated: &str) -> Prompt {
        let primer = segment
            .definition_line
            .clone()
            .unwrap_or_else(|| segment.raw_text.lines().next().unwrap_or("").to_string());

        let context = match self.mode {
            ContextMode::Growing => {
                let fixed_len =
                    segment.raw_text.len() + self.sentinel.len() + primer.len() + 3;
                let budget = self.max_context_chars.saturating_sub(fixed_len);
                let mut context = truncate_front(accumulated, budget).to_string();
                context.push_str(&segment.raw_text);
                context
            }
            ContextMode::FixedExample => segment.raw_text.clone(),
        };

        Prompt {
            context,
            example: self.example.clone(),
            sentinel: self.sentinel.clone(),
            primer,
            stop_sequence: self.stop_sequence.clone(),
        }
    }

    /// Remove echoed sentinel lines from a completion.
    ///
    /// Oracles sometimes repeat the sentinel marker inside their output;
    /// those lines are scaffolding, not annotation.
    pub fn strip_sentinel_echo(&self, completion: &str) -> String {
        completion
            .split_inclusive('\n')
            .filter(|line| line.trim_end_matches('\n').trim() != self.sentinel.trim())
            .collect()
    }
}

fn default_sentinel(style: AnnotationStyle) -> &'static str {
    match style {
        AnnotationStyle::Comments => "# With inline comments",
        AnnotationStyle::Docstring => {
            "#autodoc: A comprehensive docstring, including a brief one-line summary of the function."
        }
    }
}

/// The stop must match the start of the next structural unit and never
/// content that legitimately appears inside a comment.
fn default_stop(style: AnnotationStyle) -> &'static str {
    match style {
        AnnotationStyle::Comments => "\ndef ",
        AnnotationStyle::Docstring => "#autodoc",
    }
}

/// Drop the oldest (front) content of `text` until it fits `max_len`,
/// cutting at a line boundary.
fn truncate_front(text: &str, max_len: usize) -> &str {
    if text.len() <= max_len {
        return text;
    }
    // The byte budget may land mid-character; slicing there panics.
    let mut cut = text.len() - max_len;
    while !text.is_char_boundary(cut) {
        cut += 1;
    }
    match text[cut..].find('\n') {
        Some(pos) => &text[cut + pos + 1..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SegmentKind;

    fn function_segment(def: &str, body: &str) -> Segment {
        Segment {
            kind: SegmentKind::FunctionBody,
            definition_line: Some(def.to_string()),
            body: body.to_string(),
            raw_text: format!("{}\n{}", def, body),
        }
    }

    fn builder(mode: &str, max_chars: usize) -> PromptBuilder {
        let prompt_cfg = PromptConfig {
            context_mode: mode.to_string(),
            max_context_chars: max_chars,
            ..Default::default()
        };
        PromptBuilder::new(
            &prompt_cfg,
            &OracleConfig::default(),
            AnnotationStyle::Comments,
        )
        .unwrap()
    }

    #[test]
    fn test_growing_includes_accumulated_and_segment() {
        let b = builder("growing", 12_000);
        let seg = function_segment("def add(a, b):", "    return a + b\n");
        let prompt = b.build(&seg, "import os\n\n");
        assert!(prompt.context.starts_with("import os\n"));
        assert!(prompt.context.ends_with("    return a + b\n"));
        let payload = prompt.payload();
        assert!(payload.contains("# With inline comments\n"));
        assert!(payload.ends_with("def add(a, b):\n"));
    }

    #[test]
    fn test_growing_truncates_oldest_first() {
        let b = builder("growing", 200);
        let seg = function_segment("def f():", "    pass\n");
        let accumulated: String = (0..50).map(|i| format!("line {}\n", i)).collect();
        let prompt = b.build(&seg, &accumulated);
        assert!(prompt.payload().len() <= 200 + seg.raw_text.len());
        // Oldest lines dropped, newest retained.
        assert!(!prompt.context.contains("line 0\n"));
        assert!(prompt.context.contains("line 49\n"));
        // Cut happens at a line boundary.
        assert!(prompt.context.starts_with("line ") || prompt.context.starts_with("def "));
    }

    #[test]
    fn test_fixed_example_ignores_accumulated() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "def ex(): pass\n#autodoc\nAn example.\n").unwrap();
        let prompt_cfg = PromptConfig {
            context_mode: "fixed_example".to_string(),
            example_path: tmp.path().to_path_buf(),
            ..Default::default()
        };
        let b = PromptBuilder::new(
            &prompt_cfg,
            &OracleConfig::default(),
            AnnotationStyle::Docstring,
        )
        .unwrap();

        let seg = function_segment("def add(a, b):", "    return a + b\n");
        let prompt = b.build(&seg, "previously annotated stuff\n");
        assert!(!prompt.context.contains("previously annotated"));
        assert_eq!(prompt.context, seg.raw_text);
        let payload = prompt.payload();
        assert!(payload.starts_with("def ex(): pass\n"));
        assert!(payload.contains("#autodoc:"));
    }

    #[test]
    fn test_fixed_example_missing_asset_fatal() {
        let prompt_cfg = PromptConfig {
            context_mode: "fixed_example".to_string(),
            example_path: "/nonexistent/example.txt".into(),
            ..Default::default()
        };
        let result = PromptBuilder::new(
            &prompt_cfg,
            &OracleConfig::default(),
            AnnotationStyle::Docstring,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_growing_missing_asset_is_fine() {
        let prompt_cfg = PromptConfig {
            context_mode: "growing".to_string(),
            example_path: "/nonexistent/example.txt".into(),
            ..Default::default()
        };
        assert!(PromptBuilder::new(
            &prompt_cfg,
            &OracleConfig::default(),
            AnnotationStyle::Comments,
        )
        .is_ok());
    }

    #[test]
    fn test_default_stop_per_style() {
        let b = builder("growing", 1000);
        assert_eq!(b.stop_sequence(), "\ndef ");
        let prompt_cfg = PromptConfig::default();
        let b = PromptBuilder::new(
            &prompt_cfg,
            &OracleConfig::default(),
            AnnotationStyle::Docstring,
        )
        .unwrap();
        assert_eq!(b.stop_sequence(), "#autodoc");
    }

    #[test]
    fn test_stop_override_from_config() {
        let oracle_cfg = OracleConfig {
            stop: Some("\nclass ".to_string()),
            ..Default::default()
        };
        let b = PromptBuilder::new(
            &PromptConfig::default(),
            &oracle_cfg,
            AnnotationStyle::Comments,
        )
        .unwrap();
        assert_eq!(b.stop_sequence(), "\nclass ");
    }

    #[test]
    fn test_strip_sentinel_echo() {
        let b = builder("growing", 1000);
        let cleaned =
            b.strip_sentinel_echo("    x = 1\n    # With inline comments\n    return x\n");
        assert_eq!(cleaned, "    x = 1\n    return x\n");
    }

    #[test]
    fn test_truncate_front_line_boundary() {
        assert_eq!(truncate_front("aaa\nbbb\nccc\n", 100), "aaa\nbbb\nccc\n");
        assert_eq!(truncate_front("aaa\nbbb\nccc\n", 8), "bbb\nccc\n");
        assert_eq!(truncate_front("aaa\nbbb\nccc\n", 5), "ccc\n");
        assert_eq!(truncate_front("no-newline", 4), "");
    }

    #[test]
    fn test_truncate_front_multibyte_text() {
        // The budget may land inside a multi-byte character; the cut must
        // move forward to a character boundary instead of panicking.
        let text = "aé\n".repeat(30);
        for max in 0..text.len() {
            let kept = truncate_front(&text, max);
            assert!(kept.len() <= max);
            assert!(kept.is_empty() || kept.starts_with("aé\n"));
        }
    }

    #[test]
    fn test_growing_truncation_with_accented_context() {
        let seg = function_segment("def f():", "    pass\n");
        let accumulated = "# café résumé naïveté\n".repeat(20);
        for max in 52..90 {
            let b = builder("growing", max);
            let prompt = b.build(&seg, &accumulated);
            assert!(prompt.context.ends_with("    pass\n"));
        }
    }
}
