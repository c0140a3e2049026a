//! # Recall Core
//!
//! The building blocks of the recall agent.
//!
//! ## Core Concepts
//! - **Provider**: Trait-based LLM communication (Gemini, OpenAI-compatible)
//! - **Calculator**: Expression extraction and a character-class-gated evaluator
//! - **Embedder**: Text to fixed-width vectors (local sentence-transformer model or remote API)
//! - **Index**: Flat squared-L2 similarity index over those vectors
//! - **Memory**: Persistent long-term store pairing the index with document records
//! - **Settings**: Environment-driven configuration captured once at startup

pub mod error;
pub mod calculator;
pub mod provider;
pub mod embedding;
pub mod index;
pub mod memory;
pub mod settings;

pub use error::{Error, ErrorKind, Result};
pub use calculator::{evaluate, extract_expression, ARITHMETIC_CLASS};
pub use provider::{
    extract_text, AnyProvider, ChatMessage, CompletionRequest, CompletionResponse,
    FinishReason, GeminiProvider, LlmProvider, OpenAIProvider, ProviderConfig, ProviderError,
    ProviderType, Role, Usage,
};
#[cfg(feature = "local-embeddings")]
pub use embedding::LocalEmbedder;
pub use embedding::{AnyEmbedder, Embedder, HashEmbedder, HttpEmbedder, HttpEmbedderConfig};
pub use index::FlatIndex;
pub use memory::{MemoryRecord, Metadata, SearchHit, VectorMemory};
pub use settings::{EmbeddingSettings, Settings};
