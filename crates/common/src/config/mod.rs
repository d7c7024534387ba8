//! Configuration management for Lectern services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Where uploaded files and the index live
    #[serde(default)]
    pub storage: StorageConfig,

    /// Candidate and budget settings for the query pipeline
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Per-stage time limits for a query
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Language model used for entities, reasoning and answers
    #[serde(default)]
    pub llm: LlmConfig,

    /// Embedding configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingSettings,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,

    /// Largest accepted upload body
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Uploaded PDFs
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Vector index and the hash → filename mapping
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i64,

    #[serde(default = "default_max_per_page")]
    pub max_per_page: i64,

    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    #[serde(default = "default_max_sources")]
    pub max_sources: usize,

    /// Candidates fetched per requested chunk
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: usize,

    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_extraction_timeout")]
    pub extraction_secs: u64,

    #[serde(default = "default_retrieval_timeout")]
    pub retrieval_secs: u64,

    #[serde(default = "default_generation_timeout")]
    pub generation_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Chat completions endpoint (OpenAI compatible)
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// API key; extractive offline generators are used when absent
    pub api_key: Option<String>,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: usize,

    /// HTTP client timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: hashing, openai
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkingSettings {
    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Chunks shorter than this are dropped
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_concurrent() -> usize { 64 }
fn default_max_upload_bytes() -> usize { 50 * 1024 * 1024 }
fn default_data_dir() -> PathBuf { PathBuf::from("data") }
fn default_store_dir() -> PathBuf { PathBuf::from("vector_store") }
fn default_max_tokens() -> i64 { crate::DEFAULT_MAX_TOKENS }
fn default_max_per_page() -> i64 { crate::DEFAULT_MAX_PER_PAGE }
fn default_top_k() -> usize { crate::DEFAULT_TOP_K }
fn default_max_sources() -> usize { crate::MAX_SOURCES }
fn default_overfetch_factor() -> usize { crate::OVERFETCH_FACTOR }
fn default_max_candidates() -> usize { crate::MAX_CANDIDATES }
fn default_extraction_timeout() -> u64 { 30 }
fn default_retrieval_timeout() -> u64 { 15 }
fn default_generation_timeout() -> u64 { 90 }
fn default_llm_endpoint() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_llm_model() -> String { "gpt-4o-mini".to_string() }
fn default_temperature() -> f32 { 0.2 }
fn default_max_output_tokens() -> usize { 800 }
fn default_llm_timeout() -> u64 { 60 }
fn default_embedding_provider() -> String { "hashing".to_string() }
fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_embedding_dimension() -> usize { 384 }
fn default_embedding_timeout() -> u64 { 30 }
fn default_chunk_size() -> usize { 1000 }
fn default_min_chunk_size() -> usize { 40 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { false }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "lectern".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            max_concurrent_requests: default_max_concurrent(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            store_dir: default_store_dir(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            max_per_page: default_max_per_page(),
            default_top_k: default_top_k(),
            max_sources: default_max_sources(),
            overfetch_factor: default_overfetch_factor(),
            max_candidates: default_max_candidates(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            extraction_secs: default_extraction_timeout(),
            retrieval_secs: default_retrieval_timeout(),
            generation_secs: default_generation_timeout(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            api_key: None,
            model: default_llm_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            min_chunk_size: default_min_chunk_size(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `.env`, config files and environment
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__RETRIEVAL__MAX_TOKENS=3000
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load a single config file, filling gaps with defaults
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path))
            .build()?
            .try_deserialize()
    }

    /// How long open connections may drain after a shutdown signal
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Location of the hash → filename mapping file
    pub fn mapping_path(&self) -> PathBuf {
        self.storage.store_dir.join("hash_to_filename.json")
    }

    /// Where an uploaded PDF is kept; named by content hash so documents
    /// sharing a client filename never share a file
    pub fn document_path(&self, source_hash: &str) -> PathBuf {
        self.storage.data_dir.join(format!("{source_hash}.pdf"))
    }

    /// Location of the persisted vector index
    pub fn index_path(&self) -> PathBuf {
        self.storage.store_dir.join("index.json")
    }

    /// Whether answers come from a hosted model
    pub fn llm_enabled(&self) -> bool {
        self.llm
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

impl TimeoutConfig {
    pub fn extraction(&self) -> Duration {
        Duration::from_secs(self.extraction_secs)
    }

    pub fn retrieval(&self) -> Duration {
        Duration::from_secs(self.retrieval_secs)
    }

    pub fn generation(&self) -> Duration {
        Duration::from_secs(self.generation_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.retrieval.max_tokens, 2500);
        assert_eq!(config.retrieval.max_per_page, 3);
        assert_eq!(config.retrieval.overfetch_factor, 4);
        assert_eq!(config.retrieval.max_candidates, 20);
        assert_eq!(config.embedding.provider, "hashing");
        assert!(!config.llm_enabled());
    }

    #[test]
    fn test_store_paths() {
        let config = AppConfig::default();
        assert_eq!(
            config.mapping_path(),
            PathBuf::from("vector_store/hash_to_filename.json")
        );
        assert_eq!(config.index_path(), PathBuf::from("vector_store/index.json"));
        assert_eq!(config.document_path("ab12"), PathBuf::from("data/ab12.pdf"));
    }

    #[test]
    fn test_from_file_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lectern.toml");
        std::fs::write(&path, "[retrieval]\nmax_tokens = 1200\nmax_candidates = 12\n").unwrap();

        let config = AppConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.retrieval.max_tokens, 1200);
        assert_eq!(config.retrieval.max_per_page, 3);
        assert_eq!(config.retrieval.max_candidates, 12);
        assert_eq!(config.retrieval.overfetch_factor, 4);
        assert_eq!(config.server.port, 8000);
    }
}
