//! Annotation progress reporting.
//!
//! Reports observable progress while segments are sent to the oracle so
//! users see which function is in flight and how much is left. Progress
//! is emitted on **stderr** so stdout remains usable for the annotated
//! output in stdin mode.

use std::io::Write;

/// A single progress event for an annotation run.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// Boundary scan finished; `functions` segments will be annotated.
    Scanned { functions: usize },
    /// Function `n` of `total` is being sent to the oracle.
    Annotating {
        n: usize,
        total: usize,
        identifier: String,
    },
}

/// Reports annotation progress. Implementations write to stderr.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress: "annotate  2 / 5  parse_args".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Scanned { functions } => {
                format!("annotate  found {} function(s)\n", functions)
            }
            ProgressEvent::Annotating { n, total, identifier } => {
                format!("annotate  {} / {}  {}\n", n, total, identifier)
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Scanned { functions } => serde_json::json!({
                "event": "progress",
                "phase": "scanned",
                "functions": functions
            }),
            ProgressEvent::Annotating { n, total, identifier } => serde_json::json!({
                "event": "progress",
                "phase": "annotating",
                "n": n,
                "total": total,
                "identifier": identifier
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parse a `--progress` flag value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "off" => Some(ProgressMode::Off),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            _ => None,
        }
    }

    /// Build a reporter for this mode. Caller passes it to the driver.
    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress_mode() {
        assert_eq!(ProgressMode::parse("off"), Some(ProgressMode::Off));
        assert_eq!(ProgressMode::parse("human"), Some(ProgressMode::Human));
        assert_eq!(ProgressMode::parse("json"), Some(ProgressMode::Json));
        assert_eq!(ProgressMode::parse("loud"), None);
    }
}
