//! Evidence retrieval backends.
//!
//! Evidence is ephemeral: it only feeds a single turn's prompt and is never
//! stored in the debate history.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::RetrievalConfig;
use crate::error::{DebateError, RetrievalError};

/// A retrieved snippet with its attribution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidenceItem {
    pub content: String,
    pub source: String,
    /// Relevance; higher is more relevant.
    pub score: f32,
}

/// Similarity search contract.
#[async_trait]
pub trait EvidenceRetriever: Send + Sync {
    /// Return up to `top_k` items ordered by descending relevance.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<EvidenceItem>, RetrievalError>;
}

/// Retriever for runs without an evidence store.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEvidence;

#[async_trait]
impl EvidenceRetriever for NoEvidence {
    async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<EvidenceItem>, RetrievalError> {
        Ok(Vec::new())
    }
}

/// A stored document for [`InMemoryRetriever`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    #[serde(default = "unknown_source")]
    pub source: String,
}

fn unknown_source() -> String {
    "Unknown".to_string()
}

/// Term-overlap retriever over documents held in memory.
#[derive(Debug, Default)]
pub struct InMemoryRetriever {
    documents: Vec<(Document, HashSet<String>)>,
}

impl InMemoryRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON array of `{ "text": ..., "source": ... }` documents.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, DebateError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let documents: Vec<Document> = serde_json::from_str(&content)
            .map_err(|e| DebateError::ConfigError(format!("Failed to parse corpus: {}", e)))?;

        let mut retriever = Self::new();
        for doc in documents {
            retriever.add_document(doc);
        }
        Ok(retriever)
    }

    pub fn add_document(&mut self, document: Document) {
        let terms = tokenize(&document.text);
        self.documents.push((document, terms));
    }

    /// Add texts with optional per-text sources.
    pub fn add_texts<I, S>(&mut self, texts: I, sources: Option<&[&str]>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for (i, text) in texts.into_iter().enumerate() {
            let source = sources
                .and_then(|s| s.get(i))
                .map(|s| s.to_string())
                .unwrap_or_else(unknown_source);
            self.add_document(Document {
                text: text.into(),
                source,
            });
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl EvidenceRetriever for InMemoryRetriever {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<EvidenceItem>, RetrievalError> {
        let query_terms = tokenize(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<EvidenceItem> = self
            .documents
            .iter()
            .filter_map(|(doc, terms)| {
                let overlap = query_terms.intersection(terms).count();
                (overlap > 0).then(|| EvidenceItem {
                    content: doc.text.clone(),
                    source: doc.source.clone(),
                    score: overlap as f32 / query_terms.len() as f32,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(|w| w.to_lowercase())
        .collect()
}

/// Pinecone index with integrated inference, queried by text.
pub struct PineconeRetriever {
    http: reqwest::Client,
    index_host: String,
    namespace: String,
    api_key: String,
    text_field: String,
    source_field: String,
}

impl PineconeRetriever {
    pub fn new(config: &RetrievalConfig, api_key: impl Into<String>) -> Result<Self, RetrievalError> {
        let index_host = config
            .index_host
            .clone()
            .ok_or_else(|| RetrievalError::Unavailable("no index_host configured".to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            index_host: normalize_host(&index_host),
            namespace: config.namespace.clone(),
            api_key: api_key.into(),
            text_field: config.text_field.clone(),
            source_field: config.source_field.clone(),
        })
    }

    fn search_url(&self) -> String {
        format!(
            "{}/records/namespaces/{}/search",
            self.index_host, self.namespace
        )
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: SearchResult,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "_score")]
    score: f32,
    #[serde(default)]
    fields: serde_json::Map<String, serde_json::Value>,
}

#[async_trait]
impl EvidenceRetriever for PineconeRetriever {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<EvidenceItem>, RetrievalError> {
        let body = json!({
            "query": {
                "inputs": { "text": query },
                "top_k": top_k,
            },
            "fields": [self.text_field, self.source_field],
        });

        let response = self
            .http
            .post(self.search_url())
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", "2025-01")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Decode(e.to_string()))?;

        let items: Vec<EvidenceItem> = parsed
            .result
            .hits
            .into_iter()
            .filter_map(|hit| {
                let content = hit.fields.get(&self.text_field)?.as_str()?.to_string();
                let source = hit
                    .fields
                    .get(&self.source_field)
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_else(unknown_source);
                Some(EvidenceItem {
                    content,
                    source,
                    score: hit.score,
                })
            })
            .take(top_k)
            .collect();

        debug!(hits = items.len(), "pinecone search complete");
        Ok(items)
    }
}
