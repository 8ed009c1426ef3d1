//! Chat model backends.
//!
//! A [`ChatModel`] turns a system prompt plus an ordered list of
//! [`ChatMessage`]s into one reply. Backends:
//!
//! - **[`GeminiModel`]**: Google `generateContent` REST API (default).
//! - **[`OpenAIChatModel`]**: `POST /v1/chat/completions`.
//! - **[`DisabledModel`]**: fails every call.
//!
//! API keys are read from the environment on every call, so a missing key
//! surfaces as a failed answer rather than a startup error. Calls are made
//! once: a failed request is reported, never retried.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::models::{ChatMessage, Role};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Reply used when Gemini returns a response with no text parts.
pub const EMPTY_REPLY_FALLBACK: &str = "I'm not sure based on the provided documents.";

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Generate a reply to the last message in `messages`.
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String>;
}

// ============ Disabled ============

pub struct DisabledModel;

#[async_trait]
impl ChatModel for DisabledModel {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _system: &str, _messages: &[ChatMessage]) -> Result<String> {
        bail!("Language model is disabled. Set [llm] provider in config.")
    }
}

// ============ Gemini ============

pub struct GeminiModel {
    model: String,
    temperature: f32,
    key_env: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiModel {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            key_env: config.key_env().to_string(),
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl ChatModel for GeminiModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
        let api_key = read_key(&self.key_env)?;
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let response = client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&gemini_body(system, messages, self.temperature))
            .send()
            .await?;

        let status = response.status();
        let json: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            bail!("Gemini API error {}: {}", status, api_error_message(&json));
        }
        Ok(parse_gemini_reply(&json))
    }
}

fn gemini_body(system: &str, messages: &[ChatMessage], temperature: f32) -> Value {
    let contents: Vec<Value> = messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "model",
            };
            json!({ "role": role, "parts": [{ "text": m.content }] })
        })
        .collect();

    json!({
        "systemInstruction": { "parts": [{ "text": system }] },
        "contents": contents,
        "generationConfig": { "temperature": temperature },
    })
}

/// Joins the text parts of the first candidate.
fn parse_gemini_reply(json: &Value) -> String {
    let text: String = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        EMPTY_REPLY_FALLBACK.to_string()
    } else {
        text
    }
}

// ============ OpenAI ============

pub struct OpenAIChatModel {
    model: String,
    temperature: f32,
    key_env: String,
    base_url: String,
    timeout: Duration,
}

impl OpenAIChatModel {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            key_env: config.key_env().to_string(),
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
        let api_key = read_key(&self.key_env)?;
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        let mut wire = vec![json!({ "role": "system", "content": system })];
        wire.extend(messages.iter().map(|m| json!(m)));

        let response = client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&json!({
                "model": self.model,
                "temperature": self.temperature,
                "messages": wire,
            }))
            .send()
            .await?;

        let status = response.status();
        let json: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            bail!("OpenAI API error {}: {}", status, api_error_message(&json));
        }
        parse_openai_reply(&json)
    }
}

fn parse_openai_reply(json: &Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))
}

// ============ Shared ============

fn read_key(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => bail!("{} environment variable not set", var),
    }
}

/// Both APIs report failures as `{"error": {"message": ...}}`.
fn api_error_message(json: &Value) -> String {
    json.pointer("/error/message")
        .and_then(|m| m.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| json.to_string())
}

/// Create the [`ChatModel`] named by `config.provider`.
pub fn create_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledModel)),
        "gemini" => Ok(Arc::new(GeminiModel::new(config))),
        "openai" => Ok(Arc::new(OpenAIChatModel::new(config))),
        other => bail!("Unknown llm provider: {}", other),
    }
}
