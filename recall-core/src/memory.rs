//! # Long-term memory
//!
//! Persistent vector memory: an embedder, a [`FlatIndex`], and a parallel
//! list of document records. Position `i` in the index belongs to record `i`.
//!
//! Two files live in the memory directory and are rewritten wholesale after
//! every store:
//! - `index.json`: the flat index
//! - `meta.json`: the ordered records (`{id, text, meta}`)
//!
//! If the embedder starts producing vectors of a different width (say, after
//! switching embedding models) the store throws away everything it holds and
//! starts over at the new width. That reset is logged at `warn`.

use crate::embedding::Embedder;
use crate::error::{self, Error, Result};
use crate::index::FlatIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// File name of the serialized index
pub const INDEX_FILE: &str = "index.json";

/// File name of the record sidecar
pub const META_FILE: &str = "meta.json";

/// Free-form document metadata
pub type Metadata = BTreeMap<String, String>;

/// A stored document, minus its vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub meta: Metadata,
}

/// One search result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    pub meta: Metadata,
    /// Squared L2 distance to the query (lower is closer)
    pub score: f32,
}

/// Persistent nearest-neighbor store over text embeddings
pub struct VectorMemory<E> {
    embedder: E,
    dir: PathBuf,
    index: FlatIndex,
    records: Vec<MemoryRecord>,
}

impl<E: Embedder> VectorMemory<E> {
    /// Open (or create) the store in `dir`.
    ///
    /// An unreadable index is logged and replaced by an empty one; the
    /// records are dropped with it. When the index and metadata disagree on
    /// length both are cut back to the shorter one, so later appends stay
    /// aligned by position. Only failing to create `dir` is an error.
    pub fn open(dir: impl AsRef<Path>, embedder: E) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .map_err(|e| error::io_error(&dir, e).with_operation("memory::open"))?;

        let mut memory = Self {
            index: FlatIndex::new(embedder.dimensions()),
            embedder,
            dir,
            records: Vec::new(),
        };

        if memory.index_path().exists() {
            match memory.load() {
                Ok((index, records)) => {
                    memory.index = index;
                    memory.records = records;
                }
                Err(e) => warn!(error = %e, "failed to load existing memory index, starting empty"),
            }
        }

        if memory.index.len() != memory.records.len() {
            let aligned = memory.index.len().min(memory.records.len());
            warn!(
                vectors = memory.index.len(),
                records = memory.records.len(),
                kept = aligned,
                "memory index and metadata are out of sync; truncating to the shorter"
            );
            memory.index.truncate(aligned);
            memory.records.truncate(aligned);
        }

        info!(
            dir = %memory.dir.display(),
            documents = memory.records.len(),
            dimensions = memory.index.dimensions(),
            embedder = memory.embedder.name(),
            "memory store opened"
        );
        Ok(memory)
    }

    fn load(&self) -> Result<(FlatIndex, Vec<MemoryRecord>)> {
        let index = FlatIndex::load(&self.index_path())?;
        let meta_path = self.meta_path();
        let records = if meta_path.exists() {
            let content = std::fs::read_to_string(&meta_path)
                .map_err(|e| error::io_error(&meta_path, e).with_operation("memory::load"))?;
            serde_json::from_str(&content)
                .map_err(|e| error::serialization_error(&meta_path, e).with_operation("memory::load"))?
        } else {
            Vec::new()
        };
        Ok((index, records))
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(META_FILE)
    }

    /// Directory holding the two files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Current index width
    pub fn dimensions(&self) -> usize {
        self.index.dimensions()
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in insertion order
    pub fn list_documents(&self) -> &[MemoryRecord] {
        &self.records
    }

    /// Embed, store and persist a document. Returns whether it was saved.
    ///
    /// Failures are logged, never raised; a failed save leaves the store as
    /// it was before the call.
    pub async fn store_document(&mut self, id: &str, text: &str, metadata: Metadata) -> bool {
        match self.try_store(id, text, metadata).await {
            Ok(()) => {
                info!(doc_id = id, documents = self.records.len(), "stored document");
                true
            }
            Err(e) => {
                error!(doc_id = id, error = %e, "failed to store document");
                false
            }
        }
    }

    async fn try_store(&mut self, id: &str, text: &str, metadata: Metadata) -> Result<()> {
        if self.records.iter().any(|r| r.id == id) {
            return Err(Error::storage_failed(format!("document '{}' already stored", id))
                .with_operation("memory::store_document")
                .with_context("doc_id", id));
        }

        let vector = self.embed(text).await?;
        self.index.add(&vector)?;
        self.records.push(MemoryRecord {
            id: id.to_string(),
            text: text.to_string(),
            meta: metadata,
        });

        if let Err(e) = self.save() {
            self.index.pop();
            self.records.pop();
            return Err(e.with_operation("memory::store_document"));
        }
        Ok(())
    }

    /// Up to `top_k` documents closest to `query`, closest first.
    ///
    /// An empty store, or a failure to embed the query, yields no hits.
    pub async fn search(&mut self, query: &str, top_k: usize) -> Vec<SearchHit> {
        let vector = match self.embed(query).await {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "failed to embed search query");
                return Vec::new();
            }
        };

        if self.index.is_empty() {
            return Vec::new();
        }

        let neighbors = match self.index.search(&vector, top_k) {
            Ok(n) => n,
            Err(e) => {
                error!(error = %e, "memory search failed");
                return Vec::new();
            }
        };

        debug!(query_len = query.len(), top_k, hits = neighbors.len(), "memory search");

        neighbors
            .into_iter()
            .filter_map(|(position, score)| {
                let record = self.records.get(position)?;
                Some(SearchHit {
                    id: record.id.clone(),
                    text: record.text.clone(),
                    meta: record.meta.clone(),
                    score,
                })
            })
            .collect()
    }

    /// Embed `text`, resetting the store if the width changed
    async fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        let vector = self
            .embedder
            .embed(text)
            .await
            .map_err(|e| e.with_operation("memory::embed"))?;

        if vector.len() != self.index.dimensions() {
            warn!(
                old_dimensions = self.index.dimensions(),
                new_dimensions = vector.len(),
                documents_lost = self.records.len(),
                "embedding dimension changed; reinitializing memory index (previous documents lost)"
            );
            self.index = FlatIndex::new(vector.len());
            self.records.clear();
        }
        Ok(vector)
    }

    fn save(&self) -> Result<()> {
        self.index.save(&self.index_path())?;

        let meta_path = self.meta_path();
        let content = serde_json::to_string_pretty(&self.records)
            .map_err(|e| error::serialization_error(&meta_path, e).with_operation("memory::save"))?;
        std::fs::write(&meta_path, content)
            .map_err(|e| error::io_error(&meta_path, e).with_operation("memory::save"))
    }
}
