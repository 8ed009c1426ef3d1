//! Batch question answering over JSON.
//!
//! Request:
//!
//! ```json
//! { "documents": "https://host/policy.pdf", "questions": ["What is the deductible?"] }
//! ```
//!
//! Response, one answer per question in order:
//!
//! ```json
//! { "responses": ["The deductible is $500."] }
//! ```
//!
//! A malformed request returns `{"error": "..."}` and answers nothing. A
//! question that fails contributes `"Error: <message>"` and the batch goes on.
//! When `documents` is given, answers come from that document alone through a
//! batch-scoped index; the engine's own index is not modified.

use serde_json::{json, Map, Value};

use crate::engine::AnswerEngine;
use crate::loader::DocumentSource;
use crate::session::Session;

/// A validated batch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub documents: Option<String>,
    pub questions: Vec<String>,
}

impl BatchRequest {
    /// Validate a request body, returning the client-facing error message on failure.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let obj: &Map<String, Value> = value
            .as_object()
            .ok_or_else(|| "Request body must be a JSON object".to_string())?;

        let questions = obj
            .get("questions")
            .ok_or_else(|| "Missing required field 'questions'".to_string())?
            .as_array()
            .ok_or_else(|| "'questions' must be a list".to_string())?
            .iter()
            .map(|q| {
                q.as_str()
                    .map(|s| s.to_string())
                    .ok_or_else(|| "Each question must be a string".to_string())
            })
            .collect::<Result<Vec<_>, _>>()?;

        let documents = match obj.get("documents") {
            None | Some(Value::Null) => None,
            Some(Value::String(link)) if is_http_url(link) => Some(link.clone()),
            Some(_) => return Err("Document link must be a valid URL".to_string()),
        };

        Ok(Self {
            documents,
            questions,
        })
    }
}

fn is_http_url(link: &str) -> bool {
    match url::Url::parse(link) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host().is_some(),
        Err(_) => false,
    }
}

fn error_body(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}

/// Parse `text` as JSON and run the batch.
pub async fn process_batch_str(engine: &AnswerEngine, text: &str) -> Value {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => process_batch(engine, &value).await,
        Err(e) => error_body(format!("Invalid JSON: {}", e)),
    }
}

/// Validate and answer a batch request body.
pub async fn process_batch(engine: &AnswerEngine, body: &Value) -> Value {
    let request = match BatchRequest::from_value(body) {
        Ok(request) => request,
        Err(message) => return error_body(message),
    };
    if request.questions.is_empty() {
        return json!({ "responses": [] });
    }

    let scoped;
    let engine = match &request.documents {
        Some(link) => {
            let docs = engine
                .loader()
                .load(&DocumentSource::Url(link.clone()))
                .await;
            scoped = match engine.scoped(docs).await {
                Ok(scoped) => scoped,
                Err(e) => {
                    log::warn!("could not index {}: {:#}", link, e);
                    engine.with_index(engine.index().empty_like())
                }
            };
            &scoped
        }
        None => engine,
    };

    let mut session = Session::new();
    let mut responses = Vec::with_capacity(request.questions.len());
    for question in &request.questions {
        let outcome = engine.answer(question, &session.messages()).await;
        if !outcome.is_failed() {
            let outcome_text = outcome.clone().into_text();
            session.record(question.clone(), outcome_text);
        }
        responses.push(outcome.into_text());
    }

    json!({ "responses": responses })
}
