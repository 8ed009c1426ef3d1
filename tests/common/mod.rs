#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::io::Write;
use std::sync::{Arc, Mutex};

use docqa::config::ChunkingConfig;
use docqa::embedding::{EmbeddingProvider, HashProvider};
use docqa::engine::AnswerEngine;
use docqa::index::EmbeddingIndex;
use docqa::llm::ChatModel;
use docqa::models::{ChatMessage, Document};
use docqa::router::Router;
use docqa::search::RetrievalParams;

/// A minimal `.docx` whose body is one paragraph per entry.
pub fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
        body
    );

    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

/// A PDF with one Helvetica text line per page.
pub fn pdf_bytes(pages: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// Replies with the last user message, so grounded prompts come back
/// with their excerpts. Records every call.
#[derive(Default)]
pub struct EchoModel {
    pub calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl EchoModel {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> Vec<ChatMessage> {
        self.calls.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for EchoModel {
    fn model_name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, _system: &str, messages: &[ChatMessage]) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        Ok(messages.last().map(|m| m.content.clone()).unwrap_or_default())
    }
}

/// Fails every call with the given message.
pub struct FailingModel(pub &'static str);

#[async_trait]
impl ChatModel for FailingModel {
    fn model_name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _system: &str, _messages: &[ChatMessage]) -> Result<String> {
        anyhow::bail!("{}", self.0)
    }
}

pub fn hash_provider() -> Arc<dyn EmbeddingProvider> {
    Arc::new(HashProvider::new(512))
}

pub async fn engine_over(model: Arc<dyn ChatModel>, documents: Vec<Document>) -> AnswerEngine {
    let mut engine = AnswerEngine::new(
        model,
        Router::default(),
        EmbeddingIndex::empty(hash_provider(), 16),
        RetrievalParams::default(),
        ChunkingConfig::default(),
    );
    engine.rebuild(documents).await.unwrap();
    engine
}

pub fn policy_pages() -> Vec<Document> {
    vec![
        Document::new("policy.docx", 0, "The deductible is $500 per claim."),
        Document::new(
            "faq.docx",
            0,
            "Claims are submitted through the member portal within 90 days.",
        ),
    ]
}
