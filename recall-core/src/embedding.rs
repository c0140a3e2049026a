//! # Embeddings
//!
//! Turns text into fixed-width vectors for the memory index.
//!
//! - [`LocalEmbedder`]: sentence-transformer models run in-process through
//!   fastembed (requires the `local-embeddings` feature, on by default). The
//!   default path when no embedding endpoint is configured.
//! - [`HttpEmbedder`]: any OpenAI-compatible `/embeddings` endpoint
//!   (OpenAI, Ollama, text-embeddings-inference serving `all-MiniLM-L6-v2`, ...).
//! - [`HashEmbedder`]: deterministic feature hashing for tests; loads nothing.

use crate::error::{Error, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
#[cfg(feature = "local-embeddings")]
use tracing::info;

/// Width of `all-MiniLM-L6-v2` vectors
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Trait for generating text embeddings.
#[allow(async_fn_in_trait)]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut batch = self.embed_batch(&[text]).await?;
        batch
            .pop()
            .ok_or_else(|| Error::embedding_failed("backend returned no vectors"))
    }

    /// Generate embeddings for several texts, one vector per input.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Width of the vectors this embedder is expected to produce.
    fn dimensions(&self) -> usize;

    /// Model name, for logs.
    fn name(&self) -> &str;
}

// ─────────────────────────────────────────────────────────────────────────────
// Hash Embedder
// ─────────────────────────────────────────────────────────────────────────────

/// Feature-hashing embedder for tests.
///
/// Lowercased word tokens and their character trigrams are hashed with
/// FNV-1a into `dimensions` signed buckets, then the vector is normalized to
/// unit length. Identical text always yields an identical vector and texts
/// that share words land close together, which is all the memory tests need.
/// Not selectable from [`Settings`](crate::Settings).
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    name: String,
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self::with_name("hash", dimensions)
    }

    pub fn with_name(name: impl Into<String>, dimensions: usize) -> Self {
        Self {
            name: name.into(),
            dimensions: dimensions.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();

        for word in lowered.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            self.accumulate(&mut vector, word.as_bytes(), 1.0);

            let padded: Vec<char> = format!("#{}#", word).chars().collect();
            for gram in padded.windows(3) {
                let gram: String = gram.iter().collect();
                self.accumulate(&mut vector, gram.as_bytes(), 0.5);
            }
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let hash = fnv1a_hash(feature);
        let bucket = (hash % self.dimensions as u64) as usize;
        let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl Embedder for HashEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn fnv1a_hash(bytes: &[u8]) -> u64 {
    const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut hash = FNV_OFFSET_BASIS;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

// ─────────────────────────────────────────────────────────────────────────────
// Local Embedder
// ─────────────────────────────────────────────────────────────────────────────

/// Resolve a sentence-transformer model name to a fastembed model and its width.
///
/// Accepts the bare name or the hub id (`sentence-transformers/all-MiniLM-L6-v2`),
/// case-insensitively.
#[cfg(feature = "local-embeddings")]
fn resolve_local_model(name: &str) -> Option<(fastembed::EmbeddingModel, usize)> {
    use fastembed::EmbeddingModel;

    let short = name.trim().rsplit('/').next().unwrap_or_default().to_ascii_lowercase();
    match short.as_str() {
        "all-minilm-l6-v2" => Some((EmbeddingModel::AllMiniLML6V2, 384)),
        "all-minilm-l12-v2" => Some((EmbeddingModel::AllMiniLML12V2, 384)),
        "bge-small-en-v1.5" => Some((EmbeddingModel::BGESmallENV15, 384)),
        "bge-base-en-v1.5" => Some((EmbeddingModel::BGEBaseENV15, 768)),
        _ => None,
    }
}

/// In-process sentence embeddings via fastembed (ONNX Runtime).
///
/// The model is downloaded and loaded on first use, so building one is cheap
/// and memory-only commands that never embed never pay for it.
#[cfg(feature = "local-embeddings")]
pub struct LocalEmbedder {
    name: String,
    model: fastembed::EmbeddingModel,
    dimensions: usize,
    engine: tokio::sync::OnceCell<fastembed::TextEmbedding>,
}

#[cfg(feature = "local-embeddings")]
impl LocalEmbedder {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (model, dimensions) = resolve_local_model(&name).ok_or_else(|| {
            Error::config_invalid(format!(
                "unsupported local embedding model '{}' (set EMBEDDING_BASE_URL to use a remote one)",
                name
            ))
        })?;
        Ok(Self {
            name,
            model,
            dimensions,
            engine: tokio::sync::OnceCell::new(),
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.engine.initialized()
    }

    async fn engine(&self) -> Result<&fastembed::TextEmbedding> {
        use fastembed::{InitOptions, TextEmbedding};

        self.engine
            .get_or_try_init(|| async {
                info!(model = %self.name, "loading embedding model");
                let start = std::time::Instant::now();

                let mut init_options = InitOptions::default();
                init_options.model_name = self.model.clone();
                init_options.show_download_progress = false;

                let engine = TextEmbedding::try_new(init_options).map_err(|e| {
                    Error::embedding_failed(format!(
                        "failed to load embedding model '{}': {}",
                        self.name, e
                    ))
                    .with_operation("embedding::load")
                })?;
                info!(elapsed = ?start.elapsed(), "embedding model loaded");
                Ok::<_, Error>(engine)
            })
            .await
    }
}

#[cfg(feature = "local-embeddings")]
impl Embedder for LocalEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let engine = self.engine().await?;
        debug!(model = %self.name, inputs = texts.len(), "local embedding");

        engine.embed(texts.to_vec(), None).map_err(|e| {
            Error::embedding_failed(format!("local embedding failed: {}", e))
                .with_operation("embedding::embed_batch")
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Embedder
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for an OpenAI-compatible embeddings endpoint.
#[derive(Debug, Clone)]
pub struct HttpEmbedderConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    /// Bearer token, if the endpoint wants one
    pub api_key: Option<String>,
    /// Model to request
    pub model: String,
    /// Expected vector width
    pub dimensions: usize,
    /// Request timeout
    pub timeout: Duration,
}

impl HttpEmbedderConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            model: model.into(),
            dimensions: DEFAULT_DIMENSIONS,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }
}

/// Embeddings over HTTP.
pub struct HttpEmbedder {
    client: Client,
    config: HttpEmbedderConfig,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

impl HttpEmbedder {
    pub fn new(config: HttpEmbedderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                Error::embedding_failed(format!("failed to create HTTP client: {}", e))
                    .set_source(e)
            })?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.config.base_url.trim_end_matches('/'))
    }
}

impl Embedder for HttpEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
        };

        let mut req = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.config.api_key {
            if !key.is_empty() {
                req = req.header("Authorization", format!("Bearer {}", key));
            }
        }

        debug!(model = %self.config.model, inputs = texts.len(), "embedding request");

        let response = req.send().await.map_err(|e| {
            Error::embedding_failed(format!("embedding request failed: {}", e))
                .with_operation("embedding::embed_batch")
                .set_source(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::embedding_failed(format!(
                "embedding endpoint returned {}: {}",
                status.as_u16(),
                body.chars().take(240).collect::<String>()
            ))
            .with_operation("embedding::embed_batch"));
        }

        let payload: serde_json::Value = response.json().await.map_err(|e| {
            Error::embedding_failed(format!("failed to parse embedding response: {}", e))
                .with_operation("embedding::embed_batch")
                .set_source(e)
        })?;

        parse_embeddings(&payload, texts.len())
            .map_err(|e| e.with_operation("embedding::embed_batch"))
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

/// Read `data[*].embedding` out of an embeddings response
fn parse_embeddings(payload: &serde_json::Value, expected: usize) -> Result<Vec<Vec<f32>>> {
    let data = payload
        .get("data")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| Error::embedding_failed("embedding response missing data array"))?;
    if data.len() != expected {
        return Err(Error::embedding_failed(format!(
            "embedding response size mismatch: expected {}, got {}",
            expected,
            data.len()
        )));
    }

    data.iter()
        .map(|item| {
            item.get("embedding")
                .and_then(serde_json::Value::as_array)
                .ok_or_else(|| Error::embedding_failed("embedding item missing embedding array"))?
                .iter()
                .map(|component| {
                    component
                        .as_f64()
                        .map(|value| value as f32)
                        .ok_or_else(|| Error::embedding_failed("embedding component must be numeric"))
                })
                .collect()
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Runtime selection
// ─────────────────────────────────────────────────────────────────────────────

/// Runtime-selected embedder
pub enum AnyEmbedder {
    #[cfg(feature = "local-embeddings")]
    Local(LocalEmbedder),
    Http(HttpEmbedder),
}

impl Embedder for AnyEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        match self {
            #[cfg(feature = "local-embeddings")]
            Self::Local(e) => e.embed_batch(texts).await,
            Self::Http(e) => e.embed_batch(texts).await,
        }
    }

    fn dimensions(&self) -> usize {
        match self {
            #[cfg(feature = "local-embeddings")]
            Self::Local(e) => e.dimensions(),
            Self::Http(e) => e.dimensions(),
        }
    }

    fn name(&self) -> &str {
        match self {
            #[cfg(feature = "local-embeddings")]
            Self::Local(e) => e.name(),
            Self::Http(e) => e.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn l2(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
    }

    #[tokio::test]
    async fn test_hash_embedder_deterministic() {
        let embedder = HashEmbedder::default();
        let a = embedder.embed("Project X summary").await.unwrap();
        let b = embedder.embed("Project X summary").await.unwrap();
        assert_eq!(a.len(), DEFAULT_DIMENSIONS);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_hash_embedder_unit_norm() {
        let embedder = HashEmbedder::new(64);
        let v = embedder.embed("hello world").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_hash_embedder_empty_text() {
        let embedder = HashEmbedder::new(16);
        let v = embedder.embed("  ...  ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_hash_embedder_similarity() {
        let embedder = HashEmbedder::default();
        let query = embedder.embed("agent that summarizes documents").await.unwrap();
        let close = embedder
            .embed("This project builds an agent to summarize docs")
            .await
            .unwrap();
        let far = embedder.embed("remember to commit to GitHub").await.unwrap();
        assert!(l2(&query, &close) < l2(&query, &far));
    }

    #[tokio::test]
    async fn test_embed_batch_matches_single() {
        let embedder = HashEmbedder::new(32);
        let batch = embedder.embed_batch(&["one", "two"]).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1], embedder.embed("two").await.unwrap());
    }

    #[test]
    fn test_parse_embeddings() {
        let payload = json!({ "data": [{ "embedding": [0.5, -1.0] }, { "embedding": [1, 2] }] });
        let vectors = parse_embeddings(&payload, 2).unwrap();
        assert_eq!(vectors, vec![vec![0.5, -1.0], vec![1.0, 2.0]]);
    }

    #[test]
    fn test_parse_embeddings_errors() {
        let err = parse_embeddings(&json!({ "error": "nope" }), 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmbeddingFailed);

        let err = parse_embeddings(&json!({ "data": [] }), 1).unwrap_err();
        assert!(err.message().contains("size mismatch"));

        let err = parse_embeddings(&json!({ "data": [{ "embedding": ["x"] }] }), 1).unwrap_err();
        assert!(err.message().contains("numeric"));
    }

    #[test]
    fn test_http_endpoint() {
        let embedder = HttpEmbedder::new(
            HttpEmbedderConfig::new("http://localhost:8080/v1/", "all-MiniLM-L6-v2").with_dimensions(384),
        )
        .unwrap();
        assert_eq!(embedder.endpoint(), "http://localhost:8080/v1/embeddings");
        assert_eq!(embedder.name(), "all-MiniLM-L6-v2");
        assert_eq!(embedder.dimensions(), 384);
    }

    #[cfg(feature = "local-embeddings")]
    #[test]
    fn test_local_embedder_model_names() {
        let embedder = LocalEmbedder::new("all-MiniLM-L6-v2").unwrap();
        assert_eq!(embedder.dimensions(), 384);
        assert_eq!(embedder.name(), "all-MiniLM-L6-v2");
        assert!(!embedder.is_loaded());

        assert_eq!(LocalEmbedder::new("sentence-transformers/all-MiniLM-L6-v2").unwrap().dimensions(), 384);
        assert_eq!(LocalEmbedder::new("BAAI/bge-base-en-v1.5").unwrap().dimensions(), 768);

        let err = LocalEmbedder::new("text-embedding-3-small").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
        assert!(err.message().contains("EMBEDDING_BASE_URL"));
    }

    #[cfg(feature = "local-embeddings")]
    #[tokio::test]
    async fn test_local_embedder_empty_batch_skips_load() {
        let embedder = LocalEmbedder::new("all-MiniLM-L6-v2").unwrap();
        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
        assert!(!embedder.is_loaded());
    }
}
