//! # code-gloss CLI (`gloss`)
//!
//! The `gloss` binary annotates source code with machine-generated
//! comments or docstrings via an external completion API.
//!
//! ## Usage
//!
//! ```bash
//! gloss annotate code.py                 # writes code.py.new
//! gloss annotate --dry-run code.py       # segment counts only
//! gloss annotate < code.py > out.py      # stdin to stdout
//! gloss segments code.py                 # inspect segmentation
//! ```
//!
//! All commands accept a `--config` flag pointing to a TOML configuration
//! file; without one, built-in defaults apply. The completion API key is
//! read from the environment variable named in `[oracle].api_key_env`
//! (default `GPT_API_KEY`).

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use code_gloss::{annotate_cmd, config, inspect, progress::ProgressMode};

/// code-gloss — annotate source code with machine-generated comments and
/// docstrings via a completion API.
#[derive(Parser)]
#[command(
    name = "gloss",
    about = "Annotate source code with machine-generated comments and docstrings",
    version,
    long_about = "code-gloss segments source code into function-level units, sends each unit \
    to an external completion API with context, and safely splices the generated annotations \
    back — accepting only pure-insertion edits so code semantics are never silently changed."
)]
struct Cli {
    /// Path to configuration file (TOML). Built-in defaults apply when
    /// the file does not exist.
    #[arg(long, global = true, default_value = "./config/gloss.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Annotate a source file (or stdin) with generated documentation.
    ///
    /// With a file path, the result is written next to the input with the
    /// configured suffix (default `.new`); the input is never touched.
    /// Without a path, reads stdin and writes the result to stdout.
    Annotate {
        /// Source file to annotate. Reads stdin when omitted.
        file: Option<PathBuf>,

        /// Show segment and function counts without calling the oracle.
        #[arg(long)]
        dry_run: bool,

        /// Annotation style: `comments` or `docstring`. Overrides config.
        #[arg(long)]
        style: Option<String>,

        /// Context mode: `growing` or `fixed_example`. Overrides config.
        #[arg(long)]
        context_mode: Option<String>,

        /// Progress reporting on stderr: `off`, `human`, or `json`.
        /// Defaults to `human` when stderr is a TTY.
        #[arg(long)]
        progress: Option<String>,
    },

    /// Show how the input would be segmented, without oracle calls.
    Segments {
        /// Source file to inspect. Reads stdin when omitted.
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Annotate {
            file,
            dry_run,
            style,
            context_mode,
            progress,
        } => {
            // CLI overrides are re-validated the same way the file is.
            if let Some(style) = style {
                cfg.annotate.style = style;
            }
            if let Some(mode) = context_mode {
                cfg.prompt.context_mode = mode;
            }
            config::revalidate(&cfg)?;

            let progress = match progress.as_deref() {
                Some(value) => ProgressMode::parse(value)
                    .ok_or_else(|| anyhow::anyhow!("Unknown progress mode: '{}'", value))?,
                None => ProgressMode::default_for_tty(),
            };

            annotate_cmd::run_annotate(&cfg, file.as_deref(), dry_run, progress).await?;
        }
        Commands::Segments { file } => {
            inspect::run_segments(&cfg, file.as_deref())?;
        }
    }

    Ok(())
}
