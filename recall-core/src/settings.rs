//! Runtime settings
//!
//! Everything environment-driven is read once into [`Settings`] at startup
//! and handed to each component at construction. Nothing below the CLI
//! touches the environment.

#[cfg(feature = "local-embeddings")]
use crate::embedding::LocalEmbedder;
use crate::embedding::{AnyEmbedder, HttpEmbedder, HttpEmbedderConfig, DEFAULT_DIMENSIONS};
use crate::error::{Error, Result};
use crate::provider::{AnyProvider, ProviderConfig, ProviderType};
use std::path::PathBuf;

pub const DEFAULT_MEMORY_DIR: &str = ".recall_memory";
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";

/// Embedding backend selection
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingSettings {
    pub model: String,
    /// Remote `/embeddings` endpoint; `None` runs `model` locally
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Width expected from the remote endpoint. Local models report their own.
    pub dimensions: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            base_url: None,
            api_key: None,
            dimensions: DEFAULT_DIMENSIONS,
        }
    }
}

/// Process-wide configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub provider: ProviderType,
    pub api_key: Option<String>,
    /// Model override; the provider default applies when unset
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub embedding: EmbeddingSettings,
    pub memory_dir: PathBuf,
    /// Force simulation even when a key is present
    pub simulate: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: ProviderType::Gemini,
            api_key: None,
            model: None,
            base_url: None,
            embedding: EmbeddingSettings::default(),
            memory_dir: PathBuf::from(DEFAULT_MEMORY_DIR),
            simulate: false,
        }
    }
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let provider = match get("RECALL_PROVIDER") {
            Some(name) => name.parse()?,
            None => ProviderType::Gemini,
        };

        let (api_key, model) = match provider {
            ProviderType::Gemini => (
                get("GEMINI_API_KEY").or_else(|| get("GOOGLE_API_KEY")),
                get("GEMINI_MODEL"),
            ),
            ProviderType::OpenAI => (get("OPENAI_API_KEY"), get("OPENAI_MODEL")),
        };

        let dimensions = match get("EMBEDDING_DIM") {
            Some(raw) => parse_dimensions(&raw)?,
            None => DEFAULT_DIMENSIONS,
        };

        Ok(Self {
            provider,
            api_key,
            model,
            base_url: get("RECALL_BASE_URL"),
            embedding: EmbeddingSettings {
                model: get("SENTENCE_EMBEDDING_MODEL").unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
                base_url: get("EMBEDDING_BASE_URL"),
                api_key: get("EMBEDDING_API_KEY"),
                dimensions,
            },
            memory_dir: get("RECALL_MEMORY_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MEMORY_DIR)),
            simulate: false,
        })
    }

    /// Model that will actually be requested
    pub fn model(&self) -> &str {
        match (&self.model, self.provider) {
            (Some(model), _) => model,
            (None, ProviderType::Gemini) => "models/gemini-2.5-pro",
            (None, ProviderType::OpenAI) => "gpt-4o",
        }
    }

    /// Whether the backend will be bypassed
    pub fn is_simulated(&self) -> bool {
        self.simulate || self.api_key.is_none()
    }

    /// Provider configuration, or `None` in simulation mode
    pub fn provider_config(&self) -> Option<ProviderConfig> {
        if self.simulate {
            return None;
        }
        let key = self.api_key.as_deref()?;
        let mut config = match self.provider {
            ProviderType::Gemini => ProviderConfig::gemini(key),
            ProviderType::OpenAI => ProviderConfig::openai(key),
        }
        .with_model(self.model());
        if let Some(url) = &self.base_url {
            config = config.with_base_url(url.clone());
        }
        Some(config)
    }

    pub fn build_provider(&self) -> Result<Option<AnyProvider>> {
        match self.provider_config() {
            Some(config) => {
                let provider = AnyProvider::from_config(config)
                    .map_err(|e| Error::from(e).with_operation("settings::build_provider"))?;
                Ok(Some(provider))
            }
            None => Ok(None),
        }
    }

    pub fn build_embedder(&self) -> Result<AnyEmbedder> {
        let embedding = &self.embedding;
        match &embedding.base_url {
            Some(url) => {
                let mut config = HttpEmbedderConfig::new(url.clone(), embedding.model.clone())
                    .with_dimensions(embedding.dimensions);
                if let Some(key) = &embedding.api_key {
                    config = config.with_api_key(key.clone());
                }
                let embedder = HttpEmbedder::new(config)
                    .map_err(|e| e.with_operation("settings::build_embedder"))?;
                Ok(AnyEmbedder::Http(embedder))
            }
            None => Self::local_embedder(embedding),
        }
    }

    #[cfg(feature = "local-embeddings")]
    fn local_embedder(embedding: &EmbeddingSettings) -> Result<AnyEmbedder> {
        let embedder = LocalEmbedder::new(embedding.model.clone())
            .map_err(|e| e.with_operation("settings::build_embedder"))?;
        Ok(AnyEmbedder::Local(embedder))
    }

    #[cfg(not(feature = "local-embeddings"))]
    fn local_embedder(embedding: &EmbeddingSettings) -> Result<AnyEmbedder> {
        Err(Error::config_invalid(format!(
            "built without local embeddings; set EMBEDDING_BASE_URL to embed with '{}'",
            embedding.model
        ))
        .with_operation("settings::build_embedder"))
    }
}

fn parse_dimensions(raw: &str) -> Result<usize> {
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::config_invalid(format!("EMBEDDING_DIM must be a positive integer, got '{}'", raw))
            .with_operation("settings::from_env")
            .with_context("EMBEDDING_DIM", raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::Embedder;
    use crate::error::ErrorKind;
    use crate::provider::LlmProvider;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.model(), "models/gemini-2.5-pro");
        assert!(settings.is_simulated());
        assert!(settings.provider_config().is_none());
        assert_eq!(settings.memory_dir, PathBuf::from(".recall_memory"));
        assert_eq!(settings.embedding.dimensions, 384);
    }

    #[test]
    fn test_gemini_key_fallback() {
        let settings = Settings::from_lookup(lookup(&[("GOOGLE_API_KEY", "g-key")])).unwrap();
        assert_eq!(settings.api_key.as_deref(), Some("g-key"));

        let settings = Settings::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "primary"),
            ("GOOGLE_API_KEY", "secondary"),
        ]))
        .unwrap();
        assert_eq!(settings.api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn test_openai_selection() {
        let settings = Settings::from_lookup(lookup(&[
            ("RECALL_PROVIDER", "openai"),
            ("GEMINI_API_KEY", "ignored"),
            ("OPENAI_API_KEY", "sk-test"),
            ("RECALL_BASE_URL", "http://localhost:8080/v1"),
        ]))
        .unwrap();
        assert_eq!(settings.provider, ProviderType::OpenAI);
        assert_eq!(settings.api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.model(), "gpt-4o");

        let config = settings.provider_config().unwrap();
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080/v1"));
        assert_eq!(config.default_model.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn test_model_override_and_empty_values() {
        let settings = Settings::from_lookup(lookup(&[
            ("GEMINI_MODEL", "gemini-2.5-flash"),
            ("GEMINI_API_KEY", "   "),
        ]))
        .unwrap();
        assert_eq!(settings.model(), "gemini-2.5-flash");
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn test_model_variable_follows_provider() {
        let settings = Settings::from_lookup(lookup(&[
            ("RECALL_PROVIDER", "openai"),
            ("GEMINI_MODEL", "gemini-2.5-flash"),
        ]))
        .unwrap();
        assert_eq!(settings.model, None);
        assert_eq!(settings.model(), "gpt-4o");

        let settings = Settings::from_lookup(lookup(&[
            ("RECALL_PROVIDER", "openai"),
            ("OPENAI_MODEL", "gpt-4o-mini"),
            ("OPENAI_API_KEY", "sk-test"),
        ]))
        .unwrap();
        assert_eq!(settings.provider_config().unwrap().default_model.as_deref(), Some("gpt-4o-mini"));

        let settings = Settings::from_lookup(lookup(&[("OPENAI_MODEL", "gpt-4o-mini")])).unwrap();
        assert_eq!(settings.model(), "models/gemini-2.5-pro");
    }

    #[test]
    fn test_simulate_overrides_key() {
        let mut settings = Settings::from_lookup(lookup(&[("GEMINI_API_KEY", "k")])).unwrap();
        assert!(!settings.is_simulated());
        assert!(settings.build_provider().unwrap().is_some());

        settings.simulate = true;
        assert!(settings.is_simulated());
        assert!(settings.build_provider().unwrap().is_none());
    }

    #[test]
    fn test_build_provider_name() {
        let settings = Settings::from_lookup(lookup(&[("GEMINI_API_KEY", "k")])).unwrap();
        let provider = settings.build_provider().unwrap().unwrap();
        assert_eq!(provider.name(), "gemini");
        assert_eq!(provider.default_model(), "models/gemini-2.5-pro");
    }

    #[test]
    fn test_invalid_provider() {
        let err = Settings::from_lookup(lookup(&[("RECALL_PROVIDER", "llama")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_invalid_dimensions() {
        for raw in ["0", "-3", "wide"] {
            let err = Settings::from_lookup(lookup(&[("EMBEDDING_DIM", raw)])).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
        }
    }

    #[cfg(feature = "local-embeddings")]
    #[test]
    fn test_build_local_embedder() {
        // Local models keep their own width whatever EMBEDDING_DIM says
        let settings = Settings::from_lookup(lookup(&[("EMBEDDING_DIM", "64")])).unwrap();
        let embedder = settings.build_embedder().unwrap();
        assert!(matches!(embedder, AnyEmbedder::Local(_)));
        assert_eq!(embedder.dimensions(), 384);
        assert_eq!(embedder.name(), "all-MiniLM-L6-v2");

        let settings = Settings::from_lookup(lookup(&[("SENTENCE_EMBEDDING_MODEL", "no-such-model")])).unwrap();
        let err = settings.build_embedder().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_build_http_embedder() {
        let settings = Settings::from_lookup(lookup(&[
            ("EMBEDDING_BASE_URL", "http://localhost:9000/v1"),
            ("SENTENCE_EMBEDDING_MODEL", "text-embedding-3-small"),
            ("EMBEDDING_DIM", "1536"),
        ]))
        .unwrap();
        let embedder = settings.build_embedder().unwrap();
        assert!(matches!(embedder, AnyEmbedder::Http(_)));
        assert_eq!(embedder.dimensions(), 1536);
    }
}
