//! Remote classifier/enhancer: the LLM provider behind a trait seam.
//!
//! The pipeline never talks to a provider SDK directly. Everything goes
//! through [`RemoteAnalyzer`], an object-safe async trait, so:
//!
//! * tests can substitute a counting mock and assert the cost contract
//!   ("never call remote when local confidence clears the threshold"),
//! * callers can plug in middleware (caching, rate limiting) without
//!   touching pipeline code.
//!
//! [`OpenAiAnalyzer`] is the built-in implementation — an OpenAI-compatible
//! `/chat/completions` client over reqwest with a JSON-object structured
//! output request. Providers occasionally wrap the JSON in prose or fences;
//! [`parse_structured_json`] digs the object out before giving up.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::{Doc2TexError, RemoteError};
use crate::pipeline::classify::DocumentAnalysis;
use crate::prompts;

/// Default model when the caller names none.
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Structured classification response from the remote tier.
///
/// Every field except `document_type` is optional: the merge step keeps the
/// local value wherever the remote left a gap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteAnalysis {
    pub document_type: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub classification: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub key_sections: Vec<String>,
    #[serde(default)]
    pub suggested_template: Option<String>,
    #[serde(default)]
    pub confidence_score: f32,
}

/// The remote document intelligence service.
///
/// Both methods are best-effort from the pipeline's perspective: all errors
/// are [`RemoteError`] and the classifier recovers from every one of them.
#[async_trait]
pub trait RemoteAnalyzer: Send + Sync {
    /// Classify a bounded excerpt into the closed document-type set.
    async fn analyze(&self, excerpt: &str) -> Result<RemoteAnalysis, RemoteError>;

    /// Rewrite/restructure document content for a cleaner template fit.
    async fn enhance(
        &self,
        text: &str,
        analysis: &DocumentAnalysis,
    ) -> Result<String, RemoteError>;
}

/// OpenAI-compatible chat-completions analyzer.
pub struct OpenAiAnalyzer {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenAiAnalyzer {
    pub fn new(
        api_key: impl Into<String>,
        model: Option<&str>,
        api_base: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self, Doc2TexError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Doc2TexError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(OpenAiAnalyzer {
            client,
            api_base: api_base.unwrap_or(DEFAULT_API_BASE).trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            timeout_secs,
        })
    }

    /// Build from `OPENAI_API_KEY` (and optional `DOC2TEX_API_BASE`).
    ///
    /// Returns `None` when no key is present — the pipeline then runs on
    /// the rule tier alone.
    pub fn from_env(model: Option<&str>, timeout_secs: u64) -> Option<Self> {
        let key = std::env::var("OPENAI_API_KEY").ok()?;
        if key.is_empty() {
            return None;
        }
        let base = std::env::var("DOC2TEX_API_BASE").ok();
        OpenAiAnalyzer::new(key, model, base.as_deref(), timeout_secs).ok()
    }

    async fn chat(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
        json_mode: bool,
    ) -> Result<String, RemoteError> {
        let mut body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": temperature,
            "max_tokens": max_tokens,
        });
        if json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RemoteError::Timeout {
                        secs: self.timeout_secs,
                    }
                } else {
                    RemoteError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(RemoteError::Api {
                status: status.as_u16(),
                message: truncate(&text, 400),
            });
        }

        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| RemoteError::MalformedResponse(format!("response not JSON: {e}")))?;

        value["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                RemoteError::MalformedResponse("response carries no message content".into())
            })
    }
}

#[async_trait]
impl RemoteAnalyzer for OpenAiAnalyzer {
    async fn analyze(&self, excerpt: &str) -> Result<RemoteAnalysis, RemoteError> {
        let user = prompts::classification_prompt(excerpt);
        let content = self
            .chat(prompts::CLASSIFY_SYSTEM_PROMPT, &user, 0.1, 1000, true)
            .await?;
        debug!(bytes = content.len(), "remote classification response");
        parse_structured_json(&content)
    }

    async fn enhance(
        &self,
        text: &str,
        analysis: &DocumentAnalysis,
    ) -> Result<String, RemoteError> {
        let user = prompts::enhancement_prompt(text, analysis);
        self.chat(prompts::ENHANCE_SYSTEM_PROMPT, &user, 0.2, 2000, false)
            .await
    }
}

static RE_JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Parse the model's reply into [`RemoteAnalysis`].
///
/// Tries the whole reply first, then the outermost brace-delimited span —
/// models sometimes add prose or fences around the object even in JSON mode.
pub fn parse_structured_json(content: &str) -> Result<RemoteAnalysis, RemoteError> {
    let trimmed = content.trim();
    if let Ok(parsed) = serde_json::from_str::<RemoteAnalysis>(trimmed) {
        return Ok(parsed);
    }
    let span = RE_JSON_OBJECT
        .find(trimmed)
        .ok_or_else(|| RemoteError::MalformedResponse("no JSON object in response".into()))?;
    serde_json::from_str(span.as_str())
        .map_err(|e| RemoteError::MalformedResponse(format!("invalid analysis JSON: {e}")))
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let cut = s
            .char_indices()
            .take_while(|(i, _)| *i < max)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}…", &s[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json() {
        let content = r#"{"document_type": "circular", "confidence_score": 0.8}"#;
        let a = parse_structured_json(content).unwrap();
        assert_eq!(a.document_type, "circular");
        assert_eq!(a.confidence_score, 0.8);
        assert!(a.title.is_none());
    }

    #[test]
    fn parses_json_wrapped_in_prose() {
        let content = "Here is the analysis:\n```json\n{\"document_type\": \"report\",\n\"title\": \"Q3\"}\n```\nHope that helps!";
        let a = parse_structured_json(content).unwrap();
        assert_eq!(a.document_type, "report");
        assert_eq!(a.title.as_deref(), Some("Q3"));
    }

    #[test]
    fn rejects_json_free_response() {
        let err = parse_structured_json("I could not classify this document.").unwrap_err();
        assert!(matches!(err, RemoteError::MalformedResponse(_)));
    }
}
