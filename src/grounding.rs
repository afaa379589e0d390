//! Visual grounding: attach plan metadata and normalized page boxes to hits.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::documents::{DocumentError, DocumentStore};
use crate::plans::PlanRegistry;
use crate::search::{Chunk, NormalizedBox};

pub const ANNOTATE_ENDPOINT: &str = "/api/annotate_result";

/// Body accepted by the annotate endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotateRequest {
    #[serde(deserialize_with = "crate::types::deserialize_hash")]
    pub binary_hash: String,
    pub page: u32,
    #[serde(default)]
    pub boxes: Vec<NormalizedBox>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroundedHit {
    pub text: String,
    /// Source filename, or the hash when the document is not registered
    pub document: String,
    pub binary_hash: Option<String>,
    pub page: Option<u32>,
    pub score: f32,
    pub plan_id: Option<String>,
    pub plan_name: String,
    pub headings: Vec<String>,
    pub bounding_box: Option<NormalizedBox>,
    pub bounding_boxes: Vec<NormalizedBox>,
    pub annotate_request_body: Option<AnnotateRequest>,
    pub annotate_endpoint: &'static str,
}

/// Ground each chunk in order.
///
/// Boxes are normalized against the page size recorded in the document's
/// extraction JSON. Hits from documents unknown to the registry, or without
/// provenance, come back with no boxes.
pub async fn ground(
    chunks: Vec<Chunk>,
    plans: &PlanRegistry,
    documents: &DocumentStore,
) -> Result<Vec<GroundedHit>, DocumentError> {
    let mut hits = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        let hash = chunk.document_hash.as_deref();
        let plan = hash.and_then(|h| plans.plan_for_hash(h));
        let filename = hash.and_then(|h| plans.filename_for_hash(h));

        let boxes = match (filename, chunk.page_number) {
            (Some(filename), Some(page)) => {
                let layout = documents
                    .layout(filename)
                    .await
                    .map_err(DocumentError::into_unavailable)?;
                match layout.page_size(page) {
                    Some(size) => chunk
                        .primary_page_boxes()
                        .filter_map(|b| b.normalize(size))
                        .collect(),
                    None => {
                        warn!(filename, page, "Page size missing from extraction artifact");
                        Vec::new()
                    }
                }
            }
            (None, _) => {
                warn!(binary_hash = ?hash, "Hit from unregistered document");
                Vec::new()
            }
            (Some(_), None) => Vec::new(),
        };

        // Only documents the annotate endpoint can resolve get a request body.
        let annotate_request_body = match (hash, filename, chunk.page_number) {
            (Some(hash), Some(_), Some(page)) => Some(AnnotateRequest {
                binary_hash: hash.to_string(),
                page,
                boxes: boxes.clone(),
            }),
            _ => None,
        };

        hits.push(GroundedHit {
            document: filename
                .map(str::to_string)
                .or_else(|| chunk.document_hash.clone())
                .unwrap_or_default(),
            binary_hash: chunk.document_hash,
            page: chunk.page_number,
            score: chunk.relevance_score,
            plan_id: plan.map(|p| p.plan_id.clone()),
            plan_name: plan.map(|p| p.display_name.clone()).unwrap_or_default(),
            headings: chunk.headings,
            text: chunk.text,
            bounding_box: boxes.first().copied(),
            bounding_boxes: boxes,
            annotate_request_body,
            annotate_endpoint: ANNOTATE_ENDPOINT,
        });
    }

    Ok(hits)
}
