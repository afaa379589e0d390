//! Qdrant Query API client.
//!
//! Issues one `points/query` call per search: two prefetch branches (dense
//! and sparse named vectors, embedded server-side from the query text) fused
//! with reciprocal rank fusion. Ranking is entirely Qdrant's.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{HybridQuery, ScoredPoint};
use super::{SearchError, VectorStore};
use crate::config::{EmbeddingConfig, QdrantConfig};

/// Payload path of the Docling document hash (an unsigned integer)
pub const DOCUMENT_HASH_KEY: &str = "origin.binary_hash";

/// Flat hash key written on table and markdown fallback chunks (a string)
pub const FALLBACK_HASH_KEY: &str = "doc_hash";

/// Pooled HTTP handle to one Qdrant collection
#[derive(Clone)]
pub struct QdrantClient {
    client: Client,
    endpoint: String,
    dense_model: String,
    sparse_model: String,
    dense_vector: String,
    sparse_vector: String,
    prefetch_limit: usize,
}

impl QdrantClient {
    pub fn new(qdrant: &QdrantConfig, embedding: &EmbeddingConfig) -> Result<Self, SearchError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = qdrant.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            headers.insert(
                "api-key",
                HeaderValue::from_str(key)
                    .map_err(|_| SearchError::Config("invalid Qdrant API key".to_string()))?,
            );
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(qdrant.timeout_secs.max(1)))
            .default_headers(headers)
            .build()
            .map_err(|e| SearchError::Config(format!("failed to build Qdrant HTTP client: {}", e)))?;

        let endpoint = format!(
            "{}/collections/{}/points/query",
            qdrant.url.trim_end_matches('/'),
            qdrant.collection
        );

        Ok(Self {
            client,
            endpoint,
            dense_model: embedding.dense_model_id.clone(),
            sparse_model: embedding.sparse_model_id.clone(),
            dense_vector: embedding.dense_vector_name.clone(),
            sparse_vector: embedding.sparse_vector_name.clone(),
            prefetch_limit: embedding.prefetch_limit,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Shape a hybrid query into a Query API request body
    pub fn request_body<'a>(&'a self, query: &'a HybridQuery) -> QueryRequest<'a> {
        let branch_limit = self.prefetch_limit.max(query.limit);
        let filter = query.document_hashes.as_deref().map(hash_filter);

        QueryRequest {
            prefetch: vec![
                Prefetch {
                    query: DocumentQuery {
                        text: &query.text,
                        model: &self.dense_model,
                    },
                    using: &self.dense_vector,
                    limit: branch_limit,
                },
                Prefetch {
                    query: DocumentQuery {
                        text: &query.text,
                        model: &self.sparse_model,
                    },
                    using: &self.sparse_vector,
                    limit: branch_limit,
                },
            ],
            query: FusionQuery { fusion: "rrf" },
            filter,
            limit: query.limit,
            with_payload: true,
        }
    }
}

/// Match any of `hashes` on either hash field.
///
/// Qdrant compares `match.any` values by type, so numeric hashes are sent as
/// integers against the Docling field and anything non-numeric as keywords.
fn hash_filter(hashes: &[String]) -> Filter<'_> {
    let (numeric, keywords): (Vec<&String>, Vec<&String>) =
        hashes.iter().partition(|h| h.parse::<u64>().is_ok());

    let mut should = Vec::with_capacity(3);
    if !numeric.is_empty() {
        should.push(FieldCondition {
            key: DOCUMENT_HASH_KEY,
            r#match: MatchAny {
                any: AnyValues::Integers(numeric.iter().filter_map(|h| h.parse().ok()).collect()),
            },
        });
    }
    if !keywords.is_empty() {
        should.push(FieldCondition {
            key: DOCUMENT_HASH_KEY,
            r#match: MatchAny {
                any: AnyValues::Keywords(keywords.iter().map(|h| h.as_str()).collect()),
            },
        });
    }
    should.push(FieldCondition {
        key: FALLBACK_HASH_KEY,
        r#match: MatchAny {
            any: AnyValues::Keywords(hashes.iter().map(String::as_str).collect()),
        },
    });

    Filter { should }
}

#[async_trait]
impl VectorStore for QdrantClient {
    async fn query(&self, query: &HybridQuery) -> Result<Vec<ScoredPoint>, SearchError> {
        let body = self.request_body(query);
        debug!(endpoint = %self.endpoint, limit = query.limit, filtered = query.document_hashes.is_some(), "Querying Qdrant");

        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Decode(e.to_string()))?;
        Ok(parsed.result.points)
    }
}

#[derive(Debug, Serialize)]
pub struct QueryRequest<'a> {
    prefetch: Vec<Prefetch<'a>>,
    query: FusionQuery,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Filter<'a>>,
    limit: usize,
    with_payload: bool,
}

#[derive(Debug, Serialize)]
struct Prefetch<'a> {
    query: DocumentQuery<'a>,
    using: &'a str,
    limit: usize,
}

// Qdrant embeds `text` with `model` before searching the named vector.
#[derive(Debug, Serialize)]
struct DocumentQuery<'a> {
    text: &'a str,
    model: &'a str,
}

#[derive(Debug, Serialize)]
struct FusionQuery {
    fusion: &'static str,
}

#[derive(Debug, Serialize)]
struct Filter<'a> {
    should: Vec<FieldCondition<'a>>,
}

#[derive(Debug, Serialize)]
struct FieldCondition<'a> {
    key: &'static str,
    r#match: MatchAny<'a>,
}

#[derive(Debug, Serialize)]
struct MatchAny<'a> {
    any: AnyValues<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum AnyValues<'a> {
    Integers(Vec<u64>),
    Keywords(Vec<&'a str>),
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    result: QueryResult,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    points: Vec<ScoredPoint>,
}
