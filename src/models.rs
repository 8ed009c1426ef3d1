//! Core data models used throughout docqa.
//!
//! These types represent the pages, chunks, and conversation state that flow
//! through the ingestion and answering pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One page of extracted text.
///
/// PDFs yield one `Document` per page; Word files yield a single page 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    /// File path, upload name, or URL the text came from.
    pub source: String,
    /// Zero-based page index within `source`.
    pub page: usize,
    pub text: String,
}

impl Document {
    /// Builds a page record with an id derived from `source` and `page`, so
    /// loading the same file twice produces the same ids.
    pub fn new(source: impl Into<String>, page: usize, text: impl Into<String>) -> Self {
        let source = source.into();
        let id = Uuid::new_v5(
            &Uuid::NAMESPACE_URL,
            format!("{}#page={}", source, page).as_bytes(),
        )
        .to_string();
        Self {
            id,
            source,
            page,
            text: text.into(),
        }
    }
}

/// A window of a document's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub source: String,
    pub page: usize,
    pub chunk_index: i64,
    /// Character offset of the first character within the page text.
    pub start: usize,
    pub text: String,
    pub hash: String,
}

/// One question and the answer given to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message replayed to the language model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_ids_are_stable() {
        let a = Document::new("policy.pdf", 2, "one");
        let b = Document::new("policy.pdf", 2, "two");
        let c = Document::new("policy.pdf", 3, "one");
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }
}
