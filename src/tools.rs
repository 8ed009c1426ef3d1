//! Named tools exposing the engine's two capabilities.
//!
//! The web server lists these at `GET /tools/list` and dispatches
//! `POST /tools/{name}` through [`ToolRegistry::find`], so agents and
//! scripts can call `ask_query` or `general_chat` directly, bypassing the
//! router.
//!
//! # Example
//!
//! ```rust
//! use docqa::tools::ToolRegistry;
//!
//! let tools = ToolRegistry::with_builtins();
//! assert!(tools.find("ask_query").is_some());
//! assert!(tools.find("general_chat").is_some());
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::engine::AnswerEngine;
use crate::models::ChatMessage;

/// A capability callable by name with JSON parameters.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Route path segment and list key, e.g. `"ask_query"`.
    fn name(&self) -> &str;

    /// One-line description for discovery.
    fn description(&self) -> &str;

    /// JSON Schema (`type: "object"`) for the parameters.
    fn parameters_schema(&self) -> Value;

    /// Reject inputs the schema can't express (blank text, malformed
    /// history) before anything runs.
    fn check(&self, _params: &Value) -> Result<()> {
        Ok(())
    }

    /// Run the tool. `params` has already passed [`validate_params`] and
    /// [`Tool::check`].
    async fn execute(&self, params: Value, engine: &AnswerEngine) -> Result<Value>;
}

/// Serializable tool info for `GET /tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

fn history_schema() -> Value {
    json!({
        "type": "array",
        "description": "Earlier messages, oldest first",
        "items": {
            "type": "object",
            "properties": {
                "role": { "type": "string", "enum": ["user", "assistant"] },
                "content": { "type": "string" }
            }
        }
    })
}

fn parse_history(params: &Value) -> Result<Vec<ChatMessage>> {
    match params.get("history") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| anyhow::anyhow!("invalid history: {}", e)),
    }
}

fn required_str<'a>(params: &'a Value, field: &str) -> Result<&'a str> {
    let value = params.get(field).and_then(|v| v.as_str()).unwrap_or("");
    if value.trim().is_empty() {
        bail!("{} must not be empty", field);
    }
    Ok(value)
}

/// Answers a question from the indexed documents.
pub struct AskQueryTool;

#[async_trait]
impl Tool for AskQueryTool {
    fn name(&self) -> &str {
        "ask_query"
    }

    fn description(&self) -> &str {
        "Answer a question using excerpts retrieved from the loaded documents"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Question about the documents" },
                "history": history_schema()
            },
            "required": ["query"]
        })
    }

    fn check(&self, params: &Value) -> Result<()> {
        required_str(params, "query")?;
        parse_history(params)?;
        Ok(())
    }

    async fn execute(&self, params: Value, engine: &AnswerEngine) -> Result<Value> {
        let query = required_str(&params, "query")?;
        let history = parse_history(&params)?;
        let answer = engine.ask_query(query, &history).await?;
        Ok(json!({ "answer": answer }))
    }
}

/// Replies to conversation that does not need the documents.
pub struct GeneralChatTool;

#[async_trait]
impl Tool for GeneralChatTool {
    fn name(&self) -> &str {
        "general_chat"
    }

    fn description(&self) -> &str {
        "Reply to greetings and general conversation without document retrieval"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": { "type": "string" },
                "history": history_schema()
            },
            "required": ["message"]
        })
    }

    fn check(&self, params: &Value) -> Result<()> {
        required_str(params, "message")?;
        parse_history(params)?;
        Ok(())
    }

    async fn execute(&self, params: Value, engine: &AnswerEngine) -> Result<Value> {
        let message = required_str(&params, "message")?;
        let history = parse_history(&params)?;
        let response = engine.general_chat(message, &history).await?;
        Ok(json!({ "response": response }))
    }
}

/// Ordered collection of tools, looked up by name.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// A registry holding `ask_query` and `general_chat`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(AskQueryTool));
        registry.register(Box::new(GeneralChatTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn infos(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Check `params` against a tool's schema: it must be an object, carry
/// every `required` field, and match each declared property's `type` and
/// `enum`. Returns the params object.
pub fn validate_params(schema: &Value, params: &Value) -> Result<Value> {
    let params_obj = match params {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        other => bail!("parameters must be a JSON object, got {}", json_type_name(other)),
    };

    let required = schema
        .get("required")
        .and_then(|r| r.as_array())
        .cloned()
        .unwrap_or_default();
    for field in required.iter().filter_map(|f| f.as_str()) {
        if !params_obj.contains_key(field) {
            bail!("missing required parameter: {}", field);
        }
    }

    if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
        for (name, prop_schema) in properties {
            let Some(value) = params_obj.get(name) else {
                continue;
            };
            if let Some(expected) = prop_schema.get("type").and_then(|t| t.as_str()) {
                let type_ok = match expected {
                    "string" => value.is_string(),
                    "integer" => value.is_i64() || value.is_u64(),
                    "number" => value.is_number(),
                    "boolean" => value.is_boolean(),
                    "array" => value.is_array(),
                    "object" => value.is_object(),
                    _ => true,
                };
                if !type_ok {
                    bail!(
                        "parameter '{}' must be of type '{}', got {}",
                        name,
                        expected,
                        json_type_name(value)
                    );
                }
            }
            if let Some(allowed) = prop_schema.get("enum").and_then(|e| e.as_array()) {
                if !allowed.contains(value) {
                    bail!("parameter '{}' has invalid value {}", name, value);
                }
            }
        }
    }

    Ok(Value::Object(params_obj))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
