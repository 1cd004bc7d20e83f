//! Completion-oracle abstraction and HTTP implementation.
//!
//! Defines the [`Oracle`] trait plus [`HttpOracle`], which calls a
//! completions endpoint speaking the classic wire contract:
//! request `{prompt, max_tokens, temperature, stop}`, response JSON with
//! a `choices` list whose first candidate carries a `text` field.
//!
//! The client performs exactly one outbound call per invocation and no
//! retries — retry policy belongs to the driver. Failures are typed so
//! the driver can tell fatal (auth) from retryable (rate limit,
//! transport) from segment-local (malformed response) outcomes.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::config::OracleConfig;

/// Typed completion failure.
#[derive(Debug, Error)]
pub enum OracleError {
    /// Network-level failure, including timeouts. Retryable.
    #[error("transport error: {0}")]
    Transport(String),
    /// Credential missing or rejected. Fatal for the whole run.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// HTTP 429. The driver backs off and retries the same segment.
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// Non-2xx status or a response body without the expected completion
    /// field. The affected segment passes through unannotated.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl OracleError {
    /// Whether the driver may retry the same segment after this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OracleError::Transport(_) | OracleError::RateLimited(_))
    }
}

/// Generation parameters for one completion call.
#[derive(Debug, Clone)]
pub struct CompletionParams {
    /// Upper bound on generated length; sized to the largest expected
    /// function plus its annotation.
    pub max_tokens: u32,
    /// 0.0 for deterministic runs, >0 for exploratory runs.
    pub temperature: f32,
    /// Literal string generation must not exceed.
    pub stop: String,
}

/// An opaque text-completion capability.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Generate a completion for `prompt`. One network call, no retries.
    async fn complete(&self, prompt: &str, params: &CompletionParams)
        -> Result<String, OracleError>;
}

/// [`Oracle`] backed by an HTTP completions endpoint.
#[derive(Debug)]
pub struct HttpOracle {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpOracle {
    /// Build the client, resolving the API key from the configured
    /// environment variable. A missing key is a fatal configuration
    /// error reported before any processing begins.
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let api_key = match std::env::var(&config.api_key_env) {
            Ok(key) if !key.is_empty() => key,
            _ => bail!("{} environment variable not set", config.api_key_env),
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl Oracle for HttpOracle {
    async fn complete(
        &self,
        prompt: &str,
        params: &CompletionParams,
    ) -> Result<String, OracleError> {
        let body = serde_json::json!({
            "prompt": prompt,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
            "stop": params.stop,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let json: serde_json::Value = response
                .json()
                .await
                .map_err(|e| OracleError::MalformedResponse(e.to_string()))?;
            return extract_completion(&json);
        }

        let body_text = response.text().await.unwrap_or_default();
        match status.as_u16() {
            401 | 403 => Err(OracleError::Auth(format!("HTTP {}: {}", status, body_text))),
            429 => Err(OracleError::RateLimited(format!(
                "HTTP {}: {}",
                status, body_text
            ))),
            _ => Err(OracleError::MalformedResponse(format!(
                "HTTP {}: {}",
                status, body_text
            ))),
        }
    }
}

/// Pull `choices[0].text` out of a completion response body.
fn extract_completion(json: &serde_json::Value) -> Result<String, OracleError> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .and_then(|c| c.get("text"))
        .and_then(|t| t.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            OracleError::MalformedResponse("response missing choices[0].text".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_completion_valid() {
        let json = serde_json::json!({
            "id": "cmpl-1",
            "choices": [{"text": "    # a comment\n    return 1\n", "index": 0}]
        });
        assert_eq!(
            extract_completion(&json).unwrap(),
            "    # a comment\n    return 1\n"
        );
    }

    #[test]
    fn test_extract_completion_reads_candidate_zero() {
        let json = serde_json::json!({
            "choices": [{"text": "first"}, {"text": "second"}]
        });
        assert_eq!(extract_completion(&json).unwrap(), "first");
    }

    #[test]
    fn test_extract_completion_missing_field() {
        let json = serde_json::json!({"choices": [{"index": 0}]});
        assert!(matches!(
            extract_completion(&json),
            Err(OracleError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_extract_completion_empty_choices() {
        let json = serde_json::json!({"choices": []});
        assert!(extract_completion(&json).is_err());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(OracleError::Transport("timeout".into()).is_retryable());
        assert!(OracleError::RateLimited("429".into()).is_retryable());
        assert!(!OracleError::Auth("401".into()).is_retryable());
        assert!(!OracleError::MalformedResponse("missing".into()).is_retryable());
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let config = OracleConfig {
            api_key_env: "GLOSS_TEST_KEY_THAT_IS_NOT_SET".to_string(),
            ..Default::default()
        };
        let err = HttpOracle::new(&config).unwrap_err();
        assert!(err.to_string().contains("GLOSS_TEST_KEY_THAT_IS_NOT_SET"));
    }
}
