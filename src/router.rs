//! Question routing.
//!
//! Decides whether a message needs the documents ([`Route::AskQuery`]) or
//! is small talk the model can answer on its own ([`Route::GeneralChat`]).
//! Routing is deterministic: the `keyword` policy only diverts greetings,
//! thanks, farewells and questions about the assistant itself, and anything
//! it does not recognize goes to retrieval.

use anyhow::{bail, Result};

use crate::config::RoutingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    AskQuery,
    GeneralChat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingPolicy {
    Keyword,
    AlwaysRetrieve,
}

/// Words that make up pure small talk ("hi there", "thanks a lot", "bye").
const SMALL_TALK_WORDS: &[&str] = &[
    "hi", "hello", "hey", "hiya", "howdy", "greetings", "yo", "good", "morning", "afternoon",
    "evening", "thanks", "thank", "thx", "ty", "cheers", "appreciate", "it", "bye", "goodbye",
    "later", "see", "ya", "you", "there", "so", "much", "a", "lot", "very", "again", "ok",
    "okay", "great", "cool", "nice", "bot", "all",
];

/// Phrases that ask about the assistant rather than the documents.
const IDENTITY_PHRASES: &[&str] = &[
    "who are you",
    "what are you",
    "what is your name",
    "what's your name",
    "whats your name",
    "what can you do",
    "how can you help",
    "how are you",
];

#[derive(Debug, Clone, Copy)]
pub struct Router {
    policy: RoutingPolicy,
}

impl Default for Router {
    fn default() -> Self {
        Self::new(RoutingPolicy::Keyword)
    }
}

impl Router {
    pub fn new(policy: RoutingPolicy) -> Self {
        Self { policy }
    }

    pub fn from_config(config: &RoutingConfig) -> Result<Self> {
        let policy = match config.policy.as_str() {
            "keyword" => RoutingPolicy::Keyword,
            "always_retrieve" => RoutingPolicy::AlwaysRetrieve,
            other => bail!("Unknown routing policy: {}", other),
        };
        Ok(Self::new(policy))
    }

    pub fn policy(&self) -> RoutingPolicy {
        self.policy
    }

    pub fn route(&self, question: &str) -> Route {
        match self.policy {
            RoutingPolicy::AlwaysRetrieve => Route::AskQuery,
            RoutingPolicy::Keyword => classify(question),
        }
    }
}

fn classify(question: &str) -> Route {
    let lowered = question.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return Route::AskQuery;
    }

    if is_small_talk(&words) || IDENTITY_PHRASES.iter().any(|p| is_identity(&words, p)) {
        return Route::GeneralChat;
    }

    Route::AskQuery
}

fn is_small_talk(words: &[&str]) -> bool {
    words.iter().all(|w| SMALL_TALK_WORDS.contains(w))
}

/// The phrase matches only when everything around it is small talk, so
/// "what can you do if a claim is denied" still retrieves.
fn is_identity(words: &[&str], phrase: &str) -> bool {
    let needle: Vec<&str> = phrase.split(' ').collect();
    if needle.len() > words.len() {
        return false;
    }
    (0..=words.len() - needle.len()).any(|start| {
        words[start..start + needle.len()] == needle[..]
            && is_small_talk(&words[..start])
            && is_small_talk(&words[start + needle.len()..])
    })
}
