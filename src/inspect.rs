//! The `gloss segments` command: show how the input would be segmented,
//! without touching the oracle. Useful for checking boundary detection
//! against a file before spending tokens on it.

use anyhow::Result;
use std::path::Path;

use crate::annotate_cmd::read_source;
use crate::boundary::{create_profile, find_boundaries};
use crate::config::Config;
use crate::models::SegmentKind;
use crate::segment::split;

pub fn run_segments(config: &Config, file: Option<&Path>) -> Result<()> {
    let source = read_source(file)?;
    let profile = create_profile(&config.annotate.language)?;
    let boundaries = find_boundaries(&source, profile.as_ref(), config.annotate.top_level_only);
    let segments = split(&source, &boundaries);

    let name = file
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<stdin>".to_string());
    println!("segments {}", name);
    println!("  language: {}", profile.name());
    println!("  functions: {}", boundaries.len());

    for segment in &segments {
        match segment.kind {
            SegmentKind::Preamble => {
                println!("  preamble  {} bytes", segment.raw_text.len());
            }
            SegmentKind::Trailer => {
                println!("  trailer  {} bytes", segment.raw_text.len());
            }
            SegmentKind::FunctionBody => {
                let lines = segment.raw_text.lines().count();
                println!(
                    "  {}  {} lines, {} bytes",
                    segment.display_name(),
                    lines,
                    segment.raw_text.len()
                );
            }
        }
    }

    Ok(())
}
