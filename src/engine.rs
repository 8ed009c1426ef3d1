//! Answer engine: routing, retrieval and prompt assembly.
//!
//! [`AnswerEngine`] owns the index and shares the chat model and router.
//! Every front end (REPL, batch, web, tools) answers through it:
//!
//! ```text
//! question ──► Router ──► AskQuery ──► index.search ──► grounded prompt ──► ChatModel
//!                    └──► GeneralChat ───────────────────────────────────► ChatModel
//! ```
//!
//! [`AnswerEngine::answer`] never returns an error; failures come back as
//! [`AnswerOutcome::Failed`] so callers can show them and keep going.

use anyhow::Result;
use std::sync::Arc;

use crate::chunk::chunk_documents;
use crate::config::{ChunkingConfig, Config};
use crate::embedding::create_provider;
use crate::index::EmbeddingIndex;
use crate::llm::{create_model, ChatModel};
use crate::loader::{load_corpus, Loader};
use crate::models::{ChatMessage, Document};
use crate::router::{Route, Router};
use crate::search::RetrievalParams;

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant for questions about the user's \
documents. Answer document questions from the excerpts you are given, and reply naturally to \
greetings and general conversation. Be concise and accurate.";

const NO_CONTEXT: &str = "No document content is available.";

/// Wraps retrieved excerpts and the question into one user message.
pub fn grounded_prompt(context: &str, question: &str) -> String {
    format!(
        "Answer the question using only the document excerpts below. \
         Do not state anything that is not supported by the excerpts. \
         If no excerpt is relevant, say so and quote the closest matching content. \
         If the question lacks details needed to answer it, ask the user to clarify \
         and name the information that is missing.\n\n\
         Document excerpts:\n{}\n\nQuestion: {}",
        context, question
    )
}

/// Result of answering one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    Answered(String),
    Failed(String),
}

impl AnswerOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, AnswerOutcome::Failed(_))
    }

    /// The answer, or `"Error: <message>"` for a failure.
    pub fn into_text(self) -> String {
        match self {
            AnswerOutcome::Answered(text) => text,
            AnswerOutcome::Failed(message) => format!("Error: {}", message),
        }
    }
}

pub struct AnswerEngine {
    model: Arc<dyn ChatModel>,
    router: Router,
    index: EmbeddingIndex,
    retrieval: RetrievalParams,
    chunking: ChunkingConfig,
    loader: Loader,
    documents: Vec<Document>,
}

impl AnswerEngine {
    pub fn new(
        model: Arc<dyn ChatModel>,
        router: Router,
        index: EmbeddingIndex,
        retrieval: RetrievalParams,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            model,
            router,
            index,
            retrieval,
            chunking,
            loader: Loader::default(),
            documents: Vec::new(),
        }
    }

    /// Load the configured documents plus `extra_docs`, index them, and
    /// connect the configured model.
    pub async fn from_config(config: &Config, extra_docs: &[String]) -> Result<Self> {
        let documents = load_corpus(&config.documents, extra_docs).await?;
        Self::from_documents(config, documents).await
    }

    pub async fn from_documents(config: &Config, documents: Vec<Document>) -> Result<Self> {
        let provider = create_provider(&config.embedding)?;
        let model = create_model(&config.llm)?;
        let router = Router::from_config(&config.routing)?;

        let chunks = chunk_documents(
            &documents,
            config.chunking.chunk_size,
            config.chunking.chunk_overlap,
        );
        log::info!(
            "indexing {} chunk(s) from {} page(s)",
            chunks.len(),
            documents.len()
        );
        let index = EmbeddingIndex::build(provider, chunks, config.embedding.batch_size).await?;

        let mut engine = Self::new(
            model,
            router,
            index,
            RetrievalParams::from(&config.retrieval),
            config.chunking.clone(),
        );
        engine.loader = Loader::new(&config.documents);
        engine.documents = documents;
        Ok(engine)
    }

    /// Retrieve excerpts for `query` and answer from them alone.
    pub async fn ask_query(&self, query: &str, history: &[ChatMessage]) -> Result<String> {
        let hits = self
            .index
            .search(
                query,
                self.retrieval.k,
                self.retrieval.fetch_k,
                self.retrieval.lambda_mult,
            )
            .await?;
        log::debug!("retrieved {} chunk(s) for query", hits.len());

        let context = if hits.is_empty() {
            NO_CONTEXT.to_string()
        } else {
            hits.iter()
                .map(|h| h.chunk.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        let mut messages = history.to_vec();
        messages.push(ChatMessage::user(grounded_prompt(&context, query)));
        self.model.complete(SYSTEM_PROMPT, &messages).await
    }

    /// Answer without consulting the documents.
    pub async fn general_chat(&self, message: &str, history: &[ChatMessage]) -> Result<String> {
        let mut messages = history.to_vec();
        messages.push(ChatMessage::user(message));
        self.model.complete(SYSTEM_PROMPT, &messages).await
    }

    /// Route `question` and answer it.
    pub async fn answer(&self, question: &str, history: &[ChatMessage]) -> AnswerOutcome {
        let route = self.router.route(question);
        log::debug!("routing question to {:?}", route);
        let result = match route {
            Route::AskQuery => self.ask_query(question, history).await,
            Route::GeneralChat => self.general_chat(question, history).await,
        };
        match result {
            Ok(text) => AnswerOutcome::Answered(text),
            Err(e) => {
                log::warn!("answer failed: {:#}", e);
                AnswerOutcome::Failed(format!("{:#}", e))
            }
        }
    }

    /// Replace the indexed documents. Returns the new chunk count.
    pub async fn rebuild(&mut self, documents: Vec<Document>) -> Result<usize> {
        let chunks = chunk_documents(
            &documents,
            self.chunking.chunk_size,
            self.chunking.chunk_overlap,
        );
        self.index.rebuild(chunks).await?;
        self.documents = documents;
        Ok(self.index.len())
    }

    /// A new engine over `index` sharing this engine's model and router.
    pub fn with_index(&self, index: EmbeddingIndex) -> AnswerEngine {
        AnswerEngine {
            model: self.model.clone(),
            router: self.router,
            index,
            retrieval: self.retrieval,
            chunking: self.chunking.clone(),
            loader: self.loader.clone(),
            documents: Vec::new(),
        }
    }

    /// A new engine indexing only `documents`, leaving this one untouched.
    pub async fn scoped(&self, documents: Vec<Document>) -> Result<AnswerEngine> {
        let mut engine = self.with_index(self.index.empty_like());
        engine.rebuild(documents).await?;
        Ok(engine)
    }

    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }

    pub fn retrieval(&self) -> RetrievalParams {
        self.retrieval
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    /// The pages the index was built from.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }
}
