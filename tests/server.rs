mod common;

use serde_json::{json, Value};
use std::sync::Arc;

use common::{docx_bytes, engine_over, policy_pages, EchoModel, FailingModel};

/// Serve `router` on an ephemeral port and return its base URL.
async fn serve(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn spawn_server() -> String {
    let engine = engine_over(Arc::new(EchoModel::default()), policy_pages()).await;
    serve(docqa::server::app(engine)).await
}

#[tokio::test]
async fn health_reports_chunk_count() {
    let base = spawn_server().await;
    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["chunks"], 2);
}

#[tokio::test]
async fn index_page_has_form() {
    let base = spawn_server().await;
    let html = reqwest::get(&base).await.unwrap().text().await.unwrap();
    assert!(html.contains("<form id=\"ask\">"));
    assert!(html.contains("accept=\".pdf,.docx\""));
}

#[tokio::test]
async fn chat_endpoint_answers_from_documents() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/chat", base))
        .json(&json!({ "message": "What is the deductible?" }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert!(body["response"].as_str().unwrap().contains("$500"));

    let resp = client
        .post(format!("{}/api/chat", base))
        .json(&json!({ "message": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn batch_endpoint_validates_and_answers() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/batch", base))
        .body(r#"{"questions": []}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.json::<Value>().await.unwrap(), json!({ "responses": [] }));

    let resp = client
        .post(format!("{}/api/batch", base))
        .body(r#"{"questions": 7}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(
        resp.json::<Value>().await.unwrap(),
        json!({ "error": "'questions' must be a list" })
    );
}

#[tokio::test]
async fn ask_keeps_history_until_cleared() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let form = reqwest::multipart::Form::new()
        .text("session", "s1")
        .text("question", "What is the deductible?");
    let body: Value = client
        .post(format!("{}/api/ask", base))
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["session"], "s1");
    assert!(body["answer"].as_str().unwrap().contains("$500"));
    assert_eq!(body["history"].as_array().unwrap().len(), 1);

    let history: Value = client
        .get(format!("{}/api/history?session=s1", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history["history"][0]["question"], "What is the deductible?");

    let cleared: Value = client
        .post(format!("{}/api/clear", base))
        .json(&json!({ "session": "s1" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cleared, json!({ "history": [] }));

    let history: Value = client
        .get(format!("{}/api/history?session=s1", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(history["history"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn uploads_extend_only_their_session() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let docx = reqwest::multipart::Part::bytes(docx_bytes(&["The grace period is 31 days."]))
        .file_name("terms.docx");
    let txt = reqwest::multipart::Part::bytes(b"plain notes".to_vec()).file_name("notes.txt");
    let form = reqwest::multipart::Form::new()
        .text("session", "uploader")
        .text("question", "How long is the grace period?")
        .part("files", docx)
        .part("files", txt);
    let body: Value = client
        .post(format!("{}/api/ask", base))
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(body["answer"].as_str().unwrap().contains("31 days"));
    let warnings = body["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].as_str().unwrap().contains("notes.txt"));

    // Another session still sees only the configured documents.
    let form = reqwest::multipart::Form::new()
        .text("session", "other")
        .text("question", "How long is the grace period?");
    let body: Value = client
        .post(format!("{}/api/ask", base))
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(!body["answer"].as_str().unwrap().contains("31 days"));
}

#[tokio::test]
async fn ask_without_question_or_files_is_rejected() {
    let base = spawn_server().await;
    let form = reqwest::multipart::Form::new().text("question", "   ");
    let resp = reqwest::Client::new()
        .post(format!("{}/api/ask", base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn tools_are_listed_and_callable() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let list: Value = client
        .get(format!("{}/tools/list", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = list["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["ask_query", "general_chat"]);

    let body: Value = client
        .post(format!("{}/tools/ask_query", base))
        .json(&json!({ "query": "What is the deductible?" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(body["result"]["answer"].as_str().unwrap().contains("$500"));

    let resp = client
        .post(format!("{}/tools/ask_query", base))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("{}/tools/nope", base))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn session_table_is_bounded() {
    let engine = engine_over(Arc::new(EchoModel::default()), policy_pages()).await;
    let base = serve(docqa::server::app_with_sessions(engine, 2)).await;
    let client = reqwest::Client::new();

    for _ in 0..5 {
        let form = reqwest::multipart::Form::new().text("question", "hello");
        let resp = client
            .post(format!("{}/api/ask", base))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());
    }
    let health: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["sessions"], 2);

    // Reading or clearing an unknown session does not create one.
    client
        .post(format!("{}/api/clear", base))
        .json(&json!({ "session": "ghost" }))
        .send()
        .await
        .unwrap();
    client
        .get(format!("{}/api/history?session=ghost", base))
        .send()
        .await
        .unwrap();
    let health: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["sessions"], 2);
}

#[tokio::test]
async fn tool_input_errors_are_400_and_model_errors_500() {
    let engine = engine_over(Arc::new(FailingModel("API key invalid")), policy_pages()).await;
    let base = serve(docqa::server::app(engine)).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/tools/ask_query", base))
        .json(&json!({ "query": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("{}/tools/ask_query", base))
        .json(&json!({ "query": "What is the deductible?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "tool_error");
    assert!(body["error"]["message"].as_str().unwrap().contains("invalid"));
}
