//! Document loading from local paths, uploaded bytes, and URLs.
//!
//! Every source ends up as a file on disk before parsing: uploads and
//! downloads are written to a [`tempfile::NamedTempFile`] with the matching
//! suffix, which is removed when it goes out of scope whether parsing
//! succeeded or not.
//!
//! [`load`] never fails. Unsupported extensions and fetch/parse failures are
//! logged as warnings and contribute no pages. Use [`try_load`] to see the
//! error instead.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::DocumentsConfig;
use crate::extract::{extract_pages, DocumentFormat, ExtractError};
use crate::models::Document;

/// Where a document comes from.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    Path(PathBuf),
    Upload { file_name: String, bytes: Vec<u8> },
    Url(String),
}

impl DocumentSource {
    /// Parses a CLI/config entry: `http(s)://` strings are URLs, anything else a path.
    pub fn parse(s: &str) -> Self {
        if s.starts_with("http://") || s.starts_with("https://") {
            DocumentSource::Url(s.to_string())
        } else {
            DocumentSource::Path(PathBuf::from(s))
        }
    }

    /// Label stored on each loaded page.
    pub fn label(&self) -> String {
        match self {
            DocumentSource::Path(p) => p.display().to_string(),
            DocumentSource::Upload { file_name, .. } => file_name.clone(),
            DocumentSource::Url(u) => u.clone(),
        }
    }
}

#[derive(Debug)]
pub enum LoadError {
    UnsupportedType(String),
    Io(String),
    Fetch(String),
    Extract(ExtractError),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::UnsupportedType(name) => write!(f, "Unsupported file type: {}", name),
            LoadError::Io(e) => write!(f, "I/O error: {}", e),
            LoadError::Fetch(e) => write!(f, "Failed to fetch document: {}", e),
            LoadError::Extract(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<ExtractError> for LoadError {
    fn from(e: ExtractError) -> Self {
        LoadError::Extract(e)
    }
}

/// Loads documents with a configured fetch timeout.
#[derive(Debug, Clone)]
pub struct Loader {
    fetch_timeout: Duration,
}

impl Default for Loader {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(60),
        }
    }
}

impl Loader {
    pub fn new(config: &DocumentsConfig) -> Self {
        Self {
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
        }
    }

    /// Load a source, logging and swallowing any failure.
    pub async fn load(&self, source: &DocumentSource) -> Vec<Document> {
        match self.try_load(source).await {
            Ok(docs) => {
                log::info!("loaded {} page(s) from {}", docs.len(), source.label());
                docs
            }
            Err(LoadError::UnsupportedType(name)) => {
                log::warn!("Unsupported file type: {} (only .pdf and .docx are read)", name);
                Vec::new()
            }
            Err(e) => {
                log::warn!("Skipping {}: {}", source.label(), e);
                Vec::new()
            }
        }
    }

    /// Load several sources in order and concatenate their pages.
    pub async fn load_all(&self, sources: &[DocumentSource]) -> Vec<Document> {
        let mut docs = Vec::new();
        for source in sources {
            docs.extend(self.load(source).await);
        }
        docs
    }

    pub async fn try_load(&self, source: &DocumentSource) -> Result<Vec<Document>, LoadError> {
        let label = source.label();
        let format = DocumentFormat::from_name(&label)
            .ok_or_else(|| LoadError::UnsupportedType(label.clone()))?;

        match source {
            DocumentSource::Path(path) => parse_file(path, format, &label),
            DocumentSource::Upload { bytes, .. } => parse_scoped(bytes, format, &label),
            DocumentSource::Url(url) => {
                let bytes = self.fetch(url).await?;
                parse_scoped(&bytes, format, &label)
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        let client = reqwest::Client::builder()
            .timeout(self.fetch_timeout)
            .build()
            .map_err(|e| LoadError::Fetch(e.to_string()))?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| LoadError::Fetch(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Fetch(format!("{} returned {}", url, status)));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| LoadError::Fetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Write bytes to a temporary file, parse it, and let the guard delete it.
fn parse_scoped(bytes: &[u8], format: DocumentFormat, label: &str) -> Result<Vec<Document>, LoadError> {
    let mut tmp = tempfile::Builder::new()
        .prefix("docqa-")
        .suffix(format.suffix())
        .tempfile()
        .map_err(|e| LoadError::Io(e.to_string()))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.flush())
        .map_err(|e| LoadError::Io(e.to_string()))?;
    parse_file(tmp.path(), format, label)
}

fn parse_file(path: &Path, format: DocumentFormat, label: &str) -> Result<Vec<Document>, LoadError> {
    let bytes = std::fs::read(path).map_err(|e| LoadError::Io(format!("{}: {}", path.display(), e)))?;
    let pages = extract_pages(&bytes, format)?;
    Ok(pages
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(page, text)| Document::new(label, page, text))
        .collect())
}

/// Walk `documents.root` and return every matching file as a source.
///
/// Returns nothing when no root is configured.
pub fn scan_directory(config: &DocumentsConfig) -> Result<Vec<DocumentSource>> {
    let root = match &config.root {
        Some(root) => root,
        None => return Ok(Vec::new()),
    };
    if !root.exists() {
        anyhow::bail!("documents.root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;
    let mut excludes = vec!["**/.git/**".to_string(), "**/target/**".to_string()];
    excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&excludes)?;

    let mut paths = Vec::new();
    for entry in WalkDir::new(root).follow_links(config.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let rel = path.strip_prefix(root).unwrap_or(path).to_string_lossy().to_string();
        if exclude_set.is_match(&rel) || !include_set.is_match(&rel) {
            continue;
        }
        paths.push(path.to_path_buf());
    }
    paths.sort();

    Ok(paths.into_iter().map(DocumentSource::Path).collect())
}

/// Every source named by the configuration: the scanned root, then `paths`.
pub fn configured_sources(config: &DocumentsConfig) -> Result<Vec<DocumentSource>> {
    let mut sources = scan_directory(config)?;
    sources.extend(config.paths.iter().map(|p| DocumentSource::parse(p)));
    Ok(sources)
}

/// Load every configured source plus `extra` entries (paths or URLs).
pub async fn load_corpus(config: &DocumentsConfig, extra: &[String]) -> Result<Vec<Document>> {
    let mut sources = configured_sources(config)?;
    sources.extend(extra.iter().map(|p| DocumentSource::parse(p)));
    Ok(Loader::new(config).load_all(&sources).await)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
