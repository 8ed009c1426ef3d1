//! # docqa
//!
//! Retrieval-augmented question answering over PDF and Word documents.
//!
//! Documents are split into overlapping character windows, embedded into an
//! in-memory index, and retrieved with maximal marginal relevance. The
//! selected excerpts are passed to a hosted language model (Gemini by
//! default) with instructions to answer from them alone.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌────────────────┐
//! │    Loader    │──▶│   Chunker   │──▶│ EmbeddingIndex │
//! │ PDF/DOCX/URL │   │  windows    │   │   in memory    │
//! └──────────────┘   └─────────────┘   └───────┬────────┘
//!                                              │ MMR
//!                    ┌──────────┐      ┌───────▼────────┐
//!    question ──────▶│  Router  │─────▶│  AnswerEngine  │──▶ ChatModel
//!                    └──────────┘      └───────┬────────┘
//!                                              │
//!                       ┌──────────────┬───────┴───────┐
//!                       ▼              ▼               ▼
//!                  ┌────────┐    ┌──────────┐    ┌──────────┐
//!                  │  REPL  │    │  Batch   │    │   Web    │
//!                  └────────┘    └──────────┘    └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Pages, chunks, conversation turns |
//! | [`extract`] | PDF and DOCX text extraction |
//! | [`loader`] | Paths, uploads and URLs to pages |
//! | [`chunk`] | Overlapping character windows |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | In-memory vector index |
//! | [`search`] | MMR selection and the search command |
//! | [`llm`] | Chat model backends |
//! | [`router`] | Retrieval vs. small-talk routing |
//! | [`engine`] | Answering pipeline |
//! | [`tools`] | Named tools over the engine |
//! | [`session`] | Conversation history |
//! | [`batch`] | JSON batch answering |
//! | [`shell`] | Interactive loop |
//! | [`server`] | Web UI and HTTP API |

pub mod batch;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod extract;
pub mod index;
pub mod llm;
pub mod loader;
pub mod models;
pub mod router;
pub mod search;
pub mod server;
pub mod session;
pub mod shell;
pub mod tools;
