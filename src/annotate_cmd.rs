//! The `gloss annotate` command: read input, run the pipeline, write the
//! annotated result, print a summary.
//!
//! Input comes from a file path argument or stdin. With a file path the
//! result goes to a sibling path with the configured suffix (the input
//! is never overwritten); in stdin mode the result goes to stdout and
//! the summary moves to stderr so stdout stays clean.

use anyhow::{Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::boundary::{create_profile, find_boundaries};
use crate::config::Config;
use crate::driver::{self, RunOutcome};
use crate::models::SegmentKind;
use crate::oracle::HttpOracle;
use crate::progress::ProgressMode;
use crate::segment::split;

/// Read the source to annotate from `file`, or stdin when absent.
pub fn read_source(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {}", path.display())),
        None => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .context("Failed to read source from stdin")?;
            Ok(source)
        }
    }
}

pub async fn run_annotate(
    config: &Config,
    file: Option<&Path>,
    dry_run: bool,
    progress: ProgressMode,
) -> Result<()> {
    let source = read_source(file)?;
    let input_name = display_name(file);

    if dry_run {
        let profile = create_profile(&config.annotate.language)?;
        let boundaries =
            find_boundaries(&source, profile.as_ref(), config.annotate.top_level_only);
        let segments = split(&source, &boundaries);
        let functions = segments
            .iter()
            .filter(|s| s.kind == SegmentKind::FunctionBody)
            .count();
        println!("annotate {} (dry-run)", input_name);
        println!("  segments: {}", segments.len());
        println!("  functions: {}", functions);
        return Ok(());
    }

    // Credential pre-flight happens here, before any segment is touched.
    let oracle = Arc::new(HttpOracle::new(&config.oracle)?);

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    let reporter = progress.reporter();
    let outcome = driver::run(config, oracle, &source, cancel, reporter.as_ref()).await?;

    let out_path = match file {
        Some(path) => {
            let out_path = sibling_output_path(path, &config.annotate.output_suffix);
            std::fs::write(&out_path, &outcome.output)
                .with_context(|| format!("Failed to write output file: {}", out_path.display()))?;
            Some(out_path)
        }
        None => {
            print!("{}", outcome.output);
            None
        }
    };

    print_summary(&input_name, &outcome, out_path.as_deref(), file.is_none());
    Ok(())
}

fn display_name(file: Option<&Path>) -> String {
    file.map(|p| p.display().to_string())
        .unwrap_or_else(|| "<stdin>".to_string())
}

/// Output path next to the input, never equal to it (suffix is validated
/// non-empty at config load).
fn sibling_output_path(input: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}{}", input.display(), suffix))
}

fn print_summary(input_name: &str, outcome: &RunOutcome, out_path: Option<&Path>, to_stderr: bool) {
    let mut lines = Vec::new();
    lines.push(format!("annotate {}", input_name));
    lines.push(format!("  functions: {}", outcome.report.functions));
    lines.push(format!("  annotated: {}", outcome.report.annotated));
    lines.push(format!("  skipped: {}", outcome.report.skipped.len()));
    for skip in &outcome.report.skipped {
        lines.push(format!("    - {}  ({})", skip.identifier, skip.reason));
    }
    if outcome.report.cancelled {
        lines.push("  cancelled: remaining segments left unannotated".to_string());
    }
    if let Some(detail) = &outcome.report.auth_aborted {
        lines.push(format!(
            "  aborted: credential rejected, partial output kept ({})",
            detail
        ));
    }
    if let Some(path) = out_path {
        lines.push(format!("  output: {}", path.display()));
    }

    for line in lines {
        if to_stderr {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sibling_output_path_never_input() {
        let out = sibling_output_path(Path::new("dir/code.py"), ".new");
        assert_eq!(out, PathBuf::from("dir/code.py.new"));
        assert_ne!(out, PathBuf::from("dir/code.py"));
    }
}
