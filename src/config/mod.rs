//! Configuration management for docqa
//!
//! All retrieval thresholds, phrase lists and provider settings live here so
//! the pipeline code carries no magic numbers. Divergent values seen in
//! earlier deployments (0.3 vs 0.6 relevance, differing retry counts) are
//! consolidated into one set of defaults that can be overridden per install.

use crate::error::{DocqaError, Result, ValidationError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub context: ContextConfig,
    pub classifier: ClassifierConfig,
    pub cache: CacheConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
}

/// Chunking policy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingPolicy {
    /// Large sections re-split into small detail chunks with parent links
    Hierarchical,
    /// Heading-bounded chunks (numbered articles, all-caps headers)
    Structural,
}

/// Chunker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub policy: ChunkingPolicy,
    /// Target size of section chunks, in characters
    pub section_size: usize,
    pub section_overlap: usize,
    /// Target size of detail chunks, in characters
    pub detail_size: usize,
    pub detail_overlap: usize,
    /// Structural mode: force a split when a chunk grows past this size
    pub structural_max_chars: usize,
    /// Structural mode: discard chunks shorter than this as noise
    pub structural_min_chars: usize,
}

/// Hybrid retrieval and reranking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of candidates returned to the context assembler
    pub top_k: usize,
    /// Vector search fetches `top_k * vector_multiplier` nearest chunks
    pub vector_multiplier: usize,
    /// Weight of the rerank score in the combined score (rest goes to the
    /// raw retrieval score)
    pub rerank_weight: f32,
    /// First N characters of chunk text used as the dedup signature
    pub dedup_prefix_chars: usize,
}

/// Context assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Hard budget for assembled context, in characters
    pub max_chars: usize,
    /// Candidates below this combined score never enter the context
    pub min_relevance: f32,
}

/// Negative-response classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Canonical refusal the grounded prompt instructs the model to emit
    pub refusal: String,
    /// Phrases whose presence marks a short response as negative
    pub phrases: Vec<String>,
    /// Phrase containment only counts when the response is shorter than this
    pub short_response_chars: usize,
}

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_hours: i64,
}

/// Embedding backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "fastembed" for the ONNX models, "hashed" for the deterministic
    /// offline fallback
    pub backend: String,
    pub model: String,
    /// Hashed backend dimension; fastembed models fix their own
    pub dimension: usize,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible chat completion endpoint
    pub base_url: String,
    pub api_key_env: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_retries: u32,
    pub timeout_secs: u64,
    /// Enable the cross-encoder reranker (downloads a model on first use)
    pub enable_reranking: bool,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DocqaError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| DocqaError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| DocqaError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: DOCQA_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("DOCQA_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "LLM__BASE_URL" => {
                self.llm.base_url = value.to_string();
            }
            "LLM__MODEL" => {
                self.llm.model = value.to_string();
            }
            "LLM__MAX_RETRIES" => {
                self.llm.max_retries =
                    value.parse().map_err(|_| DocqaError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as integer", value),
                    })?;
            }
            "EMBEDDING__BACKEND" => {
                self.embedding.backend = value.to_string();
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            "CONTEXT__MIN_RELEVANCE" => {
                self.context.min_relevance =
                    value.parse().map_err(|_| DocqaError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as float", value),
                    })?;
            }
            "CACHE__TTL_HOURS" => {
                self.cache.ttl_hours =
                    value.parse().map_err(|_| DocqaError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as integer", value),
                    })?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Validate the configuration, collecting every violation
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.chunking.section_size == 0 {
            errors.push(ValidationError::new(
                "chunking.section_size",
                "must be greater than zero",
            ));
        }
        if self.chunking.section_overlap >= self.chunking.section_size {
            errors.push(ValidationError::new(
                "chunking.section_overlap",
                "must be smaller than section_size",
            ));
        }
        if self.chunking.detail_size == 0 {
            errors.push(ValidationError::new(
                "chunking.detail_size",
                "must be greater than zero",
            ));
        }
        if self.chunking.detail_overlap >= self.chunking.detail_size {
            errors.push(ValidationError::new(
                "chunking.detail_overlap",
                "must be smaller than detail_size",
            ));
        }
        if self.retrieval.top_k == 0 {
            errors.push(ValidationError::new("retrieval.top_k", "must be at least 1"));
        }
        if self.retrieval.vector_multiplier == 0 {
            errors.push(ValidationError::new(
                "retrieval.vector_multiplier",
                "must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.retrieval.rerank_weight) {
            errors.push(ValidationError::new(
                "retrieval.rerank_weight",
                "must be between 0.0 and 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.context.min_relevance) {
            errors.push(ValidationError::new(
                "context.min_relevance",
                "must be between 0.0 and 1.0",
            ));
        }
        if self.context.max_chars == 0 {
            errors.push(ValidationError::new(
                "context.max_chars",
                "must be greater than zero",
            ));
        }
        if self.classifier.refusal.trim().is_empty() {
            errors.push(ValidationError::new(
                "classifier.refusal",
                "must not be empty",
            ));
        }
        if self.cache.ttl_hours <= 0 {
            errors.push(ValidationError::new("cache.ttl_hours", "must be positive"));
        }
        if self.llm.max_retries == 0 {
            errors.push(ValidationError::new("llm.max_retries", "must be at least 1"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DocqaError::ConfigValidation { errors })
        }
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| DocqaError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("docqa").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig {
                policy: ChunkingPolicy::Hierarchical,
                section_size: 1000,
                section_overlap: 100,
                detail_size: 300,
                detail_overlap: 50,
                structural_max_chars: 600,
                structural_min_chars: 50,
            },
            retrieval: RetrievalConfig {
                top_k: 5,
                vector_multiplier: 2,
                rerank_weight: 0.5,
                dedup_prefix_chars: 100,
            },
            context: ContextConfig {
                max_chars: 8000,
                min_relevance: 0.3,
            },
            classifier: ClassifierConfig {
                refusal: "I don't know".to_string(),
                phrases: vec![
                    "i don't know".to_string(),
                    "no information".to_string(),
                    "not in the context".to_string(),
                    "not mentioned".to_string(),
                    "does not appear".to_string(),
                    "cannot answer".to_string(),
                    "can't find".to_string(),
                ],
                short_response_chars: 240,
            },
            cache: CacheConfig { ttl_hours: 24 },
            embedding: EmbeddingConfig {
                backend: "fastembed".to_string(),
                model: "all-MiniLM-L6-v2".to_string(),
                dimension: 384,
            },
            llm: LlmConfig {
                base_url: "http://localhost:11434/v1".to_string(),
                api_key_env: "DOCQA_API_KEY".to_string(),
                model: "gpt-4o".to_string(),
                temperature: 0.1,
                max_tokens: 2000,
                max_retries: 3,
                timeout_secs: 30,
                enable_reranking: false,
            },
        }
    }
}
