//! Web front end and JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Chat page with upload, history and batch form |
//! | `POST` | `/api/ask` | Multipart: `question`, `session`, `files`; answers within a session |
//! | `POST` | `/api/clear` | Clear a session's history |
//! | `GET`  | `/api/history?session=` | A session's turns |
//! | `POST` | `/api/chat` | `{ "message" }` → `{ "response" }`, no session |
//! | `POST` | `/api/batch` | Batch JSON, see [`crate::batch`] |
//! | `GET`  | `/tools/list` | Registered tools with parameter schemas |
//! | `POST` | `/tools/{name}` | Call a tool |
//! | `GET`  | `/health` | Status, version, indexed chunk count |
//!
//! # Sessions
//!
//! Each session keeps its own history and any uploaded files. Uploading
//! rebuilds that session's index from the configured documents plus every
//! file the session has uploaded; other sessions keep using the shared
//! index. At most `[server].max_sessions` sessions are kept; starting a new
//! one beyond that drops the least recently used.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `timeout` (408),
//! `tool_error` (500).
//!
//! All requests are handled one at a time: handlers hold a single lock on
//! the engine and session table until they respond.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::batch::process_batch_str;
use crate::config::Config;
use crate::engine::{AnswerEngine, AnswerOutcome};
use crate::loader::DocumentSource;
use crate::models::{ConversationTurn, Document};
use crate::session::Session;
use crate::tools::{validate_params, ToolInfo, ToolRegistry};

const INDEX_HTML: &str = include_str!("ui.html");

/// Uploads larger than this are rejected by the multipart extractor.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Default)]
struct WebSession {
    history: Session,
    uploads: Vec<Document>,
    /// Index over the configured documents plus `uploads`, once anything was uploaded.
    engine: Option<AnswerEngine>,
}

/// Web sessions keyed by id, capped at `max` entries. Each lookup stamps
/// the session; inserting past the cap drops the least recently used one.
struct SessionTable {
    max: usize,
    clock: u64,
    entries: HashMap<String, (u64, WebSession)>,
}

impl SessionTable {
    fn new(max: usize) -> Self {
        Self {
            max: max.max(1),
            clock: 0,
            entries: HashMap::new(),
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn get(&self, id: &str) -> Option<&WebSession> {
        self.entries.get(id).map(|(_, session)| session)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut WebSession> {
        self.clock += 1;
        let clock = self.clock;
        self.entries.get_mut(id).map(|(used, session)| {
            *used = clock;
            session
        })
    }

    /// The session for `id`, created (and the table trimmed) if missing.
    fn get_or_create(&mut self, id: &str) -> &mut WebSession {
        if !self.entries.contains_key(id) {
            while self.entries.len() >= self.max {
                let Some(oldest) = self
                    .entries
                    .iter()
                    .min_by_key(|(_, (used, _))| *used)
                    .map(|(key, _)| key.clone())
                else {
                    break;
                };
                log::info!("Evicting idle session {}", oldest);
                self.entries.remove(&oldest);
            }
        }
        self.clock += 1;
        let clock = self.clock;
        let (used, session) = self
            .entries
            .entry(id.to_string())
            .or_insert_with(|| (clock, WebSession::default()));
        *used = clock;
        session
    }
}

struct ServerState {
    base: AnswerEngine,
    sessions: SessionTable,
}

#[derive(Clone)]
struct AppState {
    inner: Arc<Mutex<ServerState>>,
    tools: Arc<ToolRegistry>,
}

/// Sessions kept by [`app`].
pub const DEFAULT_MAX_SESSIONS: usize = 64;

/// Load and index the configured documents, then serve on `[server].bind`.
pub async fn run_server(config: &Config, extra_docs: &[String]) -> anyhow::Result<()> {
    let engine = AnswerEngine::from_config(config, extra_docs).await?;
    println!(
        "Indexed {} chunk(s) from {} page(s); model: {}",
        engine.index().len(),
        engine.documents().len(),
        engine.model_name()
    );

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("docqa server listening on http://{}", config.server.bind);
    axum::serve(listener, app_with_sessions(engine, config.server.max_sessions)).await?;
    Ok(())
}

/// The router with every endpoint, serving answers from `engine`.
pub fn app(engine: AnswerEngine) -> Router {
    app_with_sessions(engine, DEFAULT_MAX_SESSIONS)
}

/// Like [`app`], keeping at most `max_sessions` web sessions in memory.
pub fn app_with_sessions(engine: AnswerEngine, max_sessions: usize) -> Router {
    let state = AppState {
        inner: Arc::new(Mutex::new(ServerState {
            base: engine,
            sessions: SessionTable::new(max_sessions),
        })),
        tools: Arc::new(ToolRegistry::with_builtins()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/api/ask", post(handle_ask))
        .route("/api/clear", post(handle_clear))
        .route("/api/history", get(handle_history))
        .route("/api/chat", post(handle_chat))
        .route("/api/batch", post(handle_batch))
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn timeout_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::REQUEST_TIMEOUT,
        code: "timeout".to_string(),
        message: message.into(),
    }
}

fn tool_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "tool_error".to_string(),
        message: message.into(),
    }
}

/// Map failures from a tool's execution: timeouts → 408, everything else
/// → 500. Input problems are rejected before execution as 400s.
fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    let msg = format!("{:#}", err);
    if msg.contains("timed out") {
        timeout_error(format!("{}: {}", tool_name, msg))
    } else {
        tool_error(format!("{}: {}", tool_name, msg))
    }
}

// ============ GET / ============

async fn handle_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    chunks: usize,
    sessions: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let guard = state.inner.lock().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        chunks: guard.base.index().len(),
        sessions: guard.sessions.len(),
    })
}

// ============ POST /api/ask ============

#[derive(Serialize)]
struct AskResponse {
    session: String,
    /// `None` when the request only uploaded files.
    answer: Option<String>,
    history: Vec<ConversationTurn>,
    warnings: Vec<String>,
}

async fn handle_ask(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AskResponse>, AppError> {
    let mut question = String::new();
    let mut session_id: Option<String> = None;
    let mut uploads: Vec<DocumentSource> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "question" => {
                question = field.text().await.map_err(|e| bad_request(e.to_string()))?;
            }
            "session" => {
                let id = field.text().await.map_err(|e| bad_request(e.to_string()))?;
                if !id.trim().is_empty() {
                    session_id = Some(id.trim().to_string());
                }
            }
            "files" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|e| bad_request(e.to_string()))?;
                if !file_name.is_empty() && !bytes.is_empty() {
                    uploads.push(DocumentSource::Upload {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    let question = question.trim().to_string();
    if question.is_empty() && uploads.is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    let session_id = session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut guard = state.inner.lock().await;
    let ServerState { base, sessions } = &mut *guard;
    let session = sessions.get_or_create(&session_id);

    let mut warnings = Vec::new();
    if !uploads.is_empty() {
        for source in &uploads {
            let label = source.label();
            match base.loader().try_load(source).await {
                Ok(docs) => {
                    session.uploads.retain(|d| d.source != label);
                    session.uploads.extend(docs);
                }
                Err(e) => {
                    log::warn!("Skipping upload {}: {}", label, e);
                    warnings.push(format!("Skipped {}: {}", label, e));
                }
            }
        }

        let mut documents = base.documents().to_vec();
        documents.extend(session.uploads.iter().cloned());
        match base.scoped(documents).await {
            Ok(engine) => session.engine = Some(engine),
            Err(e) => {
                log::warn!("Could not index uploads: {:#}", e);
                warnings.push(format!("Could not index uploads: {:#}", e));
            }
        }
    }

    let answer = if question.is_empty() {
        None
    } else {
        let engine = session.engine.as_ref().unwrap_or(&*base);
        let outcome = engine.answer(&question, &session.history.messages()).await;
        if let AnswerOutcome::Answered(text) = &outcome {
            session.history.record(question.clone(), text.clone());
        }
        Some(outcome.into_text())
    };

    Ok(Json(AskResponse {
        session: session_id,
        answer,
        history: session.history.turns().to_vec(),
        warnings,
    }))
}

// ============ POST /api/clear, GET /api/history ============

#[derive(Deserialize)]
struct SessionParams {
    session: Option<String>,
}

#[derive(Serialize)]
struct HistoryResponse {
    history: Vec<ConversationTurn>,
}

async fn handle_clear(
    State(state): State<AppState>,
    Json(params): Json<SessionParams>,
) -> Result<Json<HistoryResponse>, AppError> {
    let id = params
        .session
        .ok_or_else(|| bad_request("session is required"))?;
    let mut guard = state.inner.lock().await;
    if let Some(session) = guard.sessions.get_mut(&id) {
        session.history.clear();
    }
    Ok(Json(HistoryResponse {
        history: Vec::new(),
    }))
}

async fn handle_history(
    State(state): State<AppState>,
    Query(params): Query<SessionParams>,
) -> Result<Json<HistoryResponse>, AppError> {
    let id = params
        .session
        .ok_or_else(|| bad_request("session is required"))?;
    let guard = state.inner.lock().await;
    let history = guard
        .sessions
        .get(&id)
        .map(|s| s.history.turns().to_vec())
        .unwrap_or_default();
    Ok(Json(HistoryResponse { history }))
}

// ============ POST /api/chat ============

async fn handle_chat(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let message = body
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::trim)
        .unwrap_or("");
    if message.is_empty() {
        return Err(bad_request("message must not be empty"));
    }
    let guard = state.inner.lock().await;
    let outcome = guard.base.answer(message, &[]).await;
    Ok(Json(json!({ "response": outcome.into_text() })))
}

// ============ POST /api/batch ============

async fn handle_batch(State(state): State<AppState>, body: String) -> Response {
    let guard = state.inner.lock().await;
    let result = process_batch_str(&guard.base, &body).await;
    let status = if result.get("error").is_some() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    (status, Json(result)).into_response()
}

// ============ Tools ============

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    Json(ToolListResponse {
        tools: state.tools.infos(),
    })
}

async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let tool = state
        .tools
        .find(&name)
        .ok_or_else(|| not_found(format!("no tool registered with name: {}", name)))?;

    let validated = validate_params(&tool.parameters_schema(), &params)
        .map_err(|e| bad_request(e.to_string()))?;
    tool.check(&validated)
        .map_err(|e| bad_request(format!("{}: {}", name, e)))?;

    let guard = state.inner.lock().await;
    let result = tool
        .execute(validated, &guard.base)
        .await
        .map_err(|e| classify_tool_error(&name, e))?;

    Ok(Json(json!({ "result": result })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_table_stays_within_cap() {
        let mut table = SessionTable::new(3);
        for i in 0..10 {
            table.get_or_create(&format!("s{}", i));
        }
        assert_eq!(table.len(), 3);
        assert!(table.get("s9").is_some());
        assert!(table.get("s0").is_none());
    }

    #[test]
    fn recently_used_sessions_survive_eviction() {
        let mut table = SessionTable::new(2);
        table.get_or_create("a").history.record("q", "a");
        table.get_or_create("b");
        assert!(table.get_mut("a").is_some());
        table.get_or_create("c");

        assert!(table.get("b").is_none());
        assert_eq!(table.get("a").map(|s| s.history.len()), Some(1));
        assert!(table.get("c").is_some());
    }

    #[test]
    fn lookups_do_not_create_sessions() {
        let mut table = SessionTable::new(2);
        assert!(table.get_mut("ghost").is_none());
        assert!(table.get("ghost").is_none());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn tool_failures_mentioning_invalid_are_server_errors() {
        let err = classify_tool_error("ask_query", anyhow::anyhow!("API key invalid"));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        let err = classify_tool_error("ask_query", anyhow::anyhow!("request timed out"));
        assert_eq!(err.status, StatusCode::REQUEST_TIMEOUT);
    }
}
