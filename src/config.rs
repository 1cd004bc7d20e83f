use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::merge::AnnotationStyle;
use crate::prompt::ContextMode;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub annotate: AnnotateConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OracleConfig {
    /// Completions endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// 0.0 for deterministic runs; >0 for exploratory runs.
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retry budget per segment for rate-limit and transport failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff delay between retries (doubles per attempt).
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Override the style-derived stop sequence.
    #[serde(default)]
    pub stop: Option<String>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            stop: None,
        }
    }
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/engines/davinci-codex/completions".to_string()
}
fn default_api_key_env() -> String {
    "GPT_API_KEY".to_string()
}
fn default_max_tokens() -> u32 {
    1500
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptConfig {
    /// `growing` or `fixed_example`.
    #[serde(default = "default_context_mode")]
    pub context_mode: String,
    /// Total prompt size budget; growing context is truncated from its
    /// oldest content when exceeded.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    /// Worked-example asset for fixed_example mode.
    #[serde(default = "default_example_path")]
    pub example_path: PathBuf,
    /// Override the style-derived sentinel line.
    #[serde(default)]
    pub sentinel: Option<String>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            context_mode: default_context_mode(),
            max_context_chars: default_max_context_chars(),
            example_path: default_example_path(),
            sentinel: None,
        }
    }
}

fn default_context_mode() -> String {
    "growing".to_string()
}
fn default_max_context_chars() -> usize {
    12_000
}
fn default_example_path() -> PathBuf {
    PathBuf::from("assets/docstring-example.txt")
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnnotateConfig {
    /// `comments` or `docstring`.
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default = "default_language")]
    pub language: String,
    /// Fold indented definitions into their enclosing function instead of
    /// annotating them independently.
    #[serde(default)]
    pub top_level_only: bool,
    /// Suffix appended to the input path for the output file.
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,
    /// Keep already-spliced output when the oracle rejects the credential
    /// mid-run; by default the run aborts with nothing written.
    #[serde(default)]
    pub keep_partial_on_auth_error: bool,
    /// Worker count for fixed_example mode. Growing mode is always
    /// sequential regardless of this setting.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for AnnotateConfig {
    fn default() -> Self {
        Self {
            style: default_style(),
            language: default_language(),
            top_level_only: false,
            output_suffix: default_output_suffix(),
            keep_partial_on_auth_error: false,
            concurrency: default_concurrency(),
        }
    }
}

fn default_style() -> String {
    "comments".to_string()
}
fn default_language() -> String {
    "python".to_string()
}
fn default_output_suffix() -> String {
    ".new".to_string()
}
fn default_concurrency() -> usize {
    4
}

impl PromptConfig {
    /// Parsed context mode. Only valid after [`load_config`] validation.
    pub fn mode(&self) -> ContextMode {
        match self.context_mode.as_str() {
            "fixed_example" => ContextMode::FixedExample,
            _ => ContextMode::Growing,
        }
    }
}

impl AnnotateConfig {
    /// Parsed annotation style. Only valid after [`load_config`] validation.
    pub fn annotation_style(&self) -> AnnotationStyle {
        match self.style.as_str() {
            "docstring" => AnnotationStyle::Docstring,
            _ => AnnotationStyle::Comments,
        }
    }
}

/// Load configuration from `path`, falling back to built-in defaults when
/// the file does not exist (the tool works without a config file).
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    validate(&config)?;
    Ok(config)
}

/// Re-check a config after CLI flag overrides have been applied.
pub fn revalidate(config: &Config) -> Result<()> {
    validate(config)
}

fn validate(config: &Config) -> Result<()> {
    if !(0.0..=1.0).contains(&config.oracle.temperature) {
        anyhow::bail!("oracle.temperature must be in [0.0, 1.0]");
    }
    if config.oracle.max_tokens == 0 {
        anyhow::bail!("oracle.max_tokens must be > 0");
    }
    if config.oracle.api_key_env.is_empty() {
        anyhow::bail!("oracle.api_key_env must not be empty");
    }

    match config.prompt.context_mode.as_str() {
        "growing" | "fixed_example" => {}
        other => anyhow::bail!(
            "Unknown context mode: '{}'. Must be growing or fixed_example.",
            other
        ),
    }
    if config.prompt.max_context_chars == 0 {
        anyhow::bail!("prompt.max_context_chars must be > 0");
    }

    match config.annotate.style.as_str() {
        "comments" | "docstring" => {}
        other => anyhow::bail!("Unknown annotation style: '{}'. Must be comments or docstring.", other),
    }
    // The output file must never collide with the input file.
    if config.annotate.output_suffix.is_empty() {
        anyhow::bail!("annotate.output_suffix must not be empty");
    }
    if config.annotate.concurrency == 0 {
        anyhow::bail!("annotate.concurrency must be >= 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config(Path::new("/nonexistent/gloss.toml")).unwrap();
        assert_eq!(config.annotate.style, "comments");
        assert_eq!(config.oracle.api_key_env, "GPT_API_KEY");
    }

    #[test]
    fn test_parse_partial_config() {
        let config: Config = toml::from_str(
            r#"
[annotate]
style = "docstring"

[prompt]
context_mode = "fixed_example"
"#,
        )
        .unwrap();
        assert_eq!(config.annotate.style, "docstring");
        assert_eq!(config.prompt.context_mode, "fixed_example");
        assert_eq!(config.oracle.max_tokens, 1500);
    }

    #[test]
    fn test_rejects_bad_temperature() {
        let mut config = Config::default();
        config.oracle.temperature = 1.5;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_unknown_style() {
        let mut config = Config::default();
        config.annotate.style = "prose".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_empty_suffix() {
        let mut config = Config::default();
        config.annotate.output_suffix = String::new();
        assert!(validate(&config).is_err());
    }
}
