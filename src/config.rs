use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub qdrant: QdrantConfig,
    pub embedding: EmbeddingConfig,
    pub storage: StorageConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Clone, Deserialize)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    pub timeout_secs: u64,
}

// Keep the API key out of startup logs.
impl std::fmt::Debug for QdrantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("collection", &self.collection)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Models and named vectors used by the hybrid query
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    pub dense_model_id: String,
    pub sparse_model_id: String,
    pub dense_vector_name: String,
    pub sparse_vector_name: String,
    pub prefetch_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub plans_path: PathBuf,
    pub doc_store_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub default_top_k: usize,
    pub grounding_default_top_k: usize,
    pub max_top_k: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub filter: String,
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            server: ServerConfig {
                port: parse(&var("PORT", "8000"), "PORT")?,
                host: var("HOST", "0.0.0.0"),
                cors_allowed_origins: var("ALLOWED_ORIGINS", "*")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            qdrant: QdrantConfig {
                url: optional("QDRANT_URL").context("QDRANT_URL must be set")?,
                api_key: optional("QDRANT_API_KEY"),
                collection: var("COLLECTION", "docs"),
                timeout_secs: parse(&var("QDRANT_TIMEOUT_SECS", "30"), "QDRANT_TIMEOUT_SECS")?,
            },
            embedding: EmbeddingConfig {
                dense_model_id: var("EMBED_MODEL_ID", "sentence-transformers/all-MiniLM-L6-v2"),
                sparse_model_id: var("SPARSE_MODEL_ID", "Qdrant/bm25"),
                dense_vector_name: var("DENSE_VECTOR_NAME", "fast-all-minilm-l6-v2"),
                sparse_vector_name: var("SPARSE_VECTOR_NAME", "fast-sparse-bm25"),
                prefetch_limit: parse(&var("PREFETCH_LIMIT", "20"), "PREFETCH_LIMIT")?,
            },
            storage: StorageConfig {
                plans_path: PathBuf::from(var("PLANS_PATH", "./plans.json")),
                doc_store_dir: PathBuf::from(var("DOC_STORE_DIR", "./extracted_docs")),
            },
            search: SearchConfig {
                default_top_k: parse(&var("SEARCH_DEFAULT_K", "5"), "SEARCH_DEFAULT_K")?,
                grounding_default_top_k: parse(&var("GROUNDING_DEFAULT_K", "3"), "GROUNDING_DEFAULT_K")?,
                max_top_k: parse(&var("SEARCH_MAX_K", "10"), "SEARCH_MAX_K")?,
            },
            logging: LoggingConfig {
                filter: var("RUST_LOG", "benefits_search=debug,tower_http=debug,axum=info"),
                log_dir: optional("LOG_DIR").map(PathBuf::from),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.qdrant.url.starts_with("http://") || self.qdrant.url.starts_with("https://"),
            "QDRANT_URL must be an http(s) URL"
        );
        anyhow::ensure!(!self.qdrant.collection.trim().is_empty(), "COLLECTION must not be empty");
        anyhow::ensure!(self.search.max_top_k >= 1, "SEARCH_MAX_K must be at least 1");
        for (name, value) in [
            ("SEARCH_DEFAULT_K", self.search.default_top_k),
            ("GROUNDING_DEFAULT_K", self.search.grounding_default_top_k),
        ] {
            anyhow::ensure!(
                (1..=self.search.max_top_k).contains(&value),
                "{} must be between 1 and SEARCH_MAX_K ({})",
                name,
                self.search.max_top_k
            );
        }
        Ok(())
    }
}

fn parse<T>(raw: &str, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("{} has an invalid value '{}'", key, raw))
}
