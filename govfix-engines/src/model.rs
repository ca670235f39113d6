//! Semantic-model collaborator.

use crate::error::ModelError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait SemanticModel: Send + Sync {
    /// Model name, recorded in logs.
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    pub endpoint: Option<String>,
    pub model: String,
    pub timeout: Duration,
    pub api_key: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "llama3".to_string(),
            timeout: Duration::from_secs(60),
            api_key: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Ollama-compatible `/api/generate` client.
#[derive(Debug, Clone)]
pub struct HttpModel {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpModel {
    pub fn new(config: &ModelConfig) -> Result<Self, ModelError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or(ModelError::NotConfigured)?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ModelError::Unavailable(format!("http client: {e}")))?;
        Ok(Self {
            client,
            url: format!("{}/api/generate", endpoint.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SemanticModel for HttpModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        debug!(url = %self.url, model = %self.model, prompt_len = prompt.len(), "model request");
        let mut req = self.client.post(&self.url).json(&GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| ModelError::Unavailable(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ModelError::Status(status.as_u16()));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| ModelError::Unavailable(format!("read body: {e}")))?;
        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        Ok(parsed.response.trim().to_string())
    }
}

/// Drop a surrounding markdown code fence, if the reply has one.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return text.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    if lines.first().is_some_and(|l| l.starts_with("```")) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|l| l.trim_start().starts_with("```")) {
        lines.pop();
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_endpoint_is_not_configured() {
        let err = HttpModel::new(&ModelConfig::default()).unwrap_err();
        assert_eq!(err, ModelError::NotConfigured);
        let blank = ModelConfig {
            endpoint: Some("  ".into()),
            ..ModelConfig::default()
        };
        assert_eq!(HttpModel::new(&blank).unwrap_err(), ModelError::NotConfigured);
    }

    #[test]
    fn url_is_joined_once() {
        let m = HttpModel::new(&ModelConfig {
            endpoint: Some("http://localhost:11434/".into()),
            ..ModelConfig::default()
        })
        .unwrap();
        assert_eq!(m.url(), "http://localhost:11434/api/generate");
    }

    #[test]
    fn fences_are_stripped() {
        assert_eq!(strip_code_fences("```java\nclass A {}\n```"), "class A {}\n");
        assert_eq!(strip_code_fences("```\na\nb\n```\n"), "a\nb\n");
        assert_eq!(strip_code_fences("class A {}\n"), "class A {}\n");
    }
}
