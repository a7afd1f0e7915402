//! Gemini HTTP backend for the [`Oracle`] trait.

use anyhow::{Context, Result};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::io::config::OracleConfig;
use crate::oracle::{Oracle, OracleError};

const API_KEY_VAR: &str = "GOOGLE_API_KEY";
const MAX_OUTPUT_TOKENS: u32 = 8192;

/// Blocking client for the Gemini `generateContent` endpoint.
pub struct GeminiOracle {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    api_base: String,
    temperature: f64,
}

impl GeminiOracle {
    /// Build a client from config, reading the API key from `GOOGLE_API_KEY`.
    pub fn from_config(config: &OracleConfig) -> Result<Self> {
        let api_key = std::env::var(API_KEY_VAR)
            .with_context(|| format!("{API_KEY_VAR} not set in the environment"))?;
        Ok(Self {
            client: reqwest::blocking::Client::new(),
            api_key,
            model: config.model.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            temperature: config.temperature,
        })
    }
}

impl Oracle for GeminiOracle {
    #[instrument(skip_all, fields(model = %self.model, prompt_bytes = prompt.len()))]
    fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base, self.model, self.api_key
        );
        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {
                "temperature": self.temperature,
                "topP": 0.95,
                "topK": 40,
                "maxOutputTokens": MAX_OUTPUT_TOKENS,
            }
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|err| OracleError::Transport(err.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(OracleError::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(OracleError::Api {
                status: status.as_u16(),
                message: message.chars().take(500).collect(),
            });
        }

        let payload: Value = response
            .json()
            .map_err(|err| OracleError::Transport(format!("read response body: {err}")))?;
        let text = candidate_text(&payload);
        if text.is_empty() {
            return Err(OracleError::EmptyResponse);
        }
        debug!(response_bytes = text.len(), "oracle responded");
        Ok(text)
    }
}

/// Concatenate the text parts of the first candidate.
fn candidate_text(payload: &Value) -> String {
    let Some(parts) = payload
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
    else {
        return String::new();
    };
    parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_text_concatenates_parts() {
        let payload = json!({
            "candidates": [{
                "content": {"parts": [{"text": "{\"a\":"}, {"text": " 1}"}]}
            }]
        });
        assert_eq!(candidate_text(&payload), "{\"a\": 1}");
    }

    #[test]
    fn candidate_text_empty_on_unexpected_shape() {
        assert_eq!(candidate_text(&json!({"error": "nope"})), "");
    }
}
