//! Hybrid Search
//!
//! Thin client over the external vector store. This module only shapes the
//! request (query text, limit, optional document-hash filter) and maps the
//! returned points into [`Chunk`]s; dense/sparse fusion and ranking happen in
//! the vector store.

pub mod qdrant;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

pub use qdrant::QdrantClient;
pub use types::{
    Chunk, CoordOrigin, HybridQuery, NormalizedBox, PageBox, PageSize, Provenance, ScoredPoint,
};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Vector store client misconfigured: {0}")]
    Config(String),

    #[error("Vector store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Vector store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode vector store response: {0}")]
    Decode(String),
}

/// Anything that can answer a fused dense+sparse query
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn query(&self, query: &HybridQuery) -> Result<Vec<ScoredPoint>, SearchError>;
}

#[derive(Clone)]
pub struct HybridSearcher {
    store: Arc<dyn VectorStore>,
}

impl HybridSearcher {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    /// Run a hybrid query and return hits in vector-store order.
    ///
    /// `plan_filter` restricts hits to the given document hashes; an empty
    /// filter matches nothing and skips the round trip.
    pub async fn search(
        &self,
        text: &str,
        top_k: usize,
        plan_filter: Option<&[String]>,
    ) -> Result<Vec<Chunk>, SearchError> {
        if plan_filter.is_some_and(|hashes| hashes.is_empty()) {
            debug!("Plan filter has no documents, skipping vector store");
            return Ok(Vec::new());
        }

        let query = HybridQuery::new(text, top_k, plan_filter);
        let points = self.store.query(&query).await?;
        let returned = points.len();
        let chunks: Vec<Chunk> = points
            .into_iter()
            .take(top_k)
            .map(Chunk::from_point)
            .collect();

        info!(top_k, returned, "Hybrid search completed");
        Ok(chunks)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{docling_point, StubStore};
    use super::*;

    #[tokio::test]
    async fn test_search_preserves_store_order() {
        let store = Arc::new(StubStore::with_points(vec![
            docling_point("c", 0.9, "1", 3, "third"),
            docling_point("a", 0.7, "1", 1, "first"),
            docling_point("b", 0.2, "2", 2, "second"),
        ]));
        let searcher = HybridSearcher::new(store.clone());

        let chunks = searcher.search("copay", 5, None).await.unwrap();
        let ids: Vec<&str> = chunks.iter().map(|c| c.point_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);

        let queries = store.recorded();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].text, "copay");
        assert_eq!(queries[0].limit, 5);
        assert_eq!(queries[0].document_hashes, None);
    }

    #[tokio::test]
    async fn test_plan_filter_is_forwarded() {
        let store = Arc::new(StubStore::default());
        let searcher = HybridSearcher::new(store.clone());
        let hashes = vec!["1".to_string(), "2".to_string()];

        searcher.search("vision", 3, Some(hashes.as_slice())).await.unwrap();
        assert_eq!(store.recorded()[0].document_hashes, Some(hashes));
    }

    #[tokio::test]
    async fn test_empty_plan_filter_skips_store() {
        let store = Arc::new(StubStore::failing());
        let searcher = HybridSearcher::new(store.clone());

        let no_documents: Vec<String> = Vec::new();
        let chunks = searcher.search("vision", 3, Some(no_documents.as_slice())).await.unwrap();
        assert!(chunks.is_empty());
        assert!(store.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_store_errors_surface() {
        let searcher = HybridSearcher::new(Arc::new(StubStore::failing()));
        let err = searcher.search("vision", 3, None).await.unwrap_err();
        assert!(matches!(err, SearchError::Status { status: 503, .. }));
    }
}
