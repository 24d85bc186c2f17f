//! OpenAI-compatible chat completion client.
//!
//! One user message per call. Timeouts, transport failures, HTTP 429 and 5xx
//! responses are retried with exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use projectiq_core::config::CompletionConfig;
use projectiq_core::error::CompletionError;
use projectiq_core::traits::CompletionService;

pub struct OpenAiCompletion {
    config: CompletionConfig,
    client: reqwest::Client,
}

impl OpenAiCompletion {
    pub fn new(config: CompletionConfig) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CompletionError::Transport(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn endpoint(&self) -> String { format!("{}/chat/completions", self.config.base_url.trim_end_matches('/')) }

    /// Explicit `api_key` first, then the configured environment variable.
    fn api_key(&self) -> Result<String, CompletionError> {
        resolve_api_key(self.config.api_key.as_deref(), std::env::var(&self.config.api_key_env).ok())
            .ok_or_else(|| CompletionError::MissingApiKey(self.config.api_key_env.clone()))
    }

    async fn send_once(&self, api_key: &str, body: &Value) -> Result<String, CompletionError> {
        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.classify(e))?;
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CompletionError::RateLimited);
        }
        if !status.is_success() {
            return Err(CompletionError::Status { status: status.as_u16(), body: text });
        }
        parse_response(&text)
    }

    fn classify(&self, e: reqwest::Error) -> CompletionError {
        if e.is_timeout() { CompletionError::Timeout(self.config.timeout_secs) } else { CompletionError::Transport(e.to_string()) }
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let api_key = self.api_key()?;
        let body = request_body(&self.config.model, self.config.temperature, prompt);
        let mut attempt = 0u32;
        loop {
            match self.send_once(&api_key, &body).await {
                Ok(answer) => {
                    debug!("Completion succeeded after {} attempt(s)", attempt + 1);
                    return Ok(answer);
                }
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = backoff_delay(self.config.initial_backoff_ms, attempt);
                    warn!("Completion attempt {} failed ({}); retrying in {:?}", attempt + 1, e, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

pub fn resolve_api_key(configured: Option<&str>, from_env: Option<String>) -> Option<String> {
    configured
        .map(str::to_string)
        .or(from_env)
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

/// `initial * 2^attempt`, capped at one minute.
pub fn backoff_delay(initial_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt.min(16)).unwrap_or(u64::MAX);
    Duration::from_millis(initial_ms.saturating_mul(factor).min(60_000))
}

pub fn request_body(model: &str, temperature: f32, prompt: &str) -> Value {
    json!({
        "model": model,
        "temperature": temperature,
        "messages": [{ "role": "user", "content": prompt }],
    })
}

/// `choices[0].message.content` of a chat completion response.
pub fn parse_response(body: &str) -> Result<String, CompletionError> {
    let json: Value = serde_json::from_str(body).map_err(|e| CompletionError::Malformed(format!("invalid JSON: {e}")))?;
    json.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CompletionError::Malformed("no choices[0].message.content in response".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_has_single_user_message() {
        let body = request_body("gpt-4o-mini", 0.0, "hi");
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hi");
    }

    #[test]
    fn parses_first_choice() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Monday."}}]}"#;
        assert_eq!(parse_response(body).unwrap(), "Monday.");
    }

    #[test]
    fn malformed_responses_are_reported() {
        assert!(matches!(parse_response("not json"), Err(CompletionError::Malformed(_))));
        assert!(matches!(parse_response(r#"{"choices":[]}"#), Err(CompletionError::Malformed(_))));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff_delay(500, 0), Duration::from_millis(500));
        assert_eq!(backoff_delay(500, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(500, 3), Duration::from_millis(4000));
        assert_eq!(backoff_delay(500, 40), Duration::from_millis(60_000));
    }

    #[test]
    fn api_key_prefers_config_over_env() {
        assert_eq!(resolve_api_key(Some("cfg"), Some("env".into())).as_deref(), Some("cfg"));
        assert_eq!(resolve_api_key(None, Some("env".into())).as_deref(), Some("env"));
        assert_eq!(resolve_api_key(Some("  "), None), None);
        assert_eq!(resolve_api_key(None, None), None);
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let config = CompletionConfig { base_url: "http://localhost:8080/v1/".into(), ..CompletionConfig::default() };
        assert_eq!(OpenAiCompletion::new(config).unwrap().endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let config = CompletionConfig { api_key: None, api_key_env: "PROJECTIQ_TEST_UNSET_KEY_VAR".into(), ..CompletionConfig::default() };
        let err = OpenAiCompletion::new(config).unwrap().complete("hi").await.unwrap_err();
        assert!(matches!(err, CompletionError::MissingApiKey(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error_after_retries() {
        let config = CompletionConfig {
            base_url: "http://127.0.0.1:9".into(),
            api_key: Some("k".into()),
            max_retries: 1,
            initial_backoff_ms: 1,
            timeout_secs: 5,
            ..CompletionConfig::default()
        };
        let err = OpenAiCompletion::new(config).unwrap().complete("hi").await.unwrap_err();
        assert!(matches!(err, CompletionError::Transport(_) | CompletionError::Timeout(_)));
    }
}
