use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::documents::DocumentStore;
use crate::plans::{Plan, PlanDocument, PlanRegistry};
use crate::search::{Chunk, HybridSearcher};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub plans: Arc<PlanRegistry>,
    pub searcher: HybridSearcher,
    pub documents: DocumentStore,
}

// API Request/Response types

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub plans_loaded: usize,
    pub collection: String,
}

#[derive(Debug, Serialize)]
pub struct PlanSummary {
    pub plan_id: String,
    pub name: String,
    pub sob_document_hash: Option<String>,
    pub eoc_document_hash: Option<String>,
    pub documents: Vec<PlanDocument>,
}

impl From<&Plan> for PlanSummary {
    fn from(plan: &Plan) -> Self {
        Self {
            plan_id: plan.plan_id.clone(),
            name: plan.display_name.clone(),
            sob_document_hash: plan.sob_document_hash().map(str::to_string),
            eoc_document_hash: plan.eoc_document_hash().map(str::to_string),
            documents: plan.documents.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlansResponse {
    pub plans: Vec<PlanSummary>,
}

/// Query string shared by `/api/search` and `/api/visual_grounding`.
///
/// Everything is optional at the extractor level so the handler decides the
/// order in which problems are reported.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub k: Option<usize>,
    pub plan_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub text: String,
    pub document: String,
    pub binary_hash: Option<String>,
    pub page: Option<u32>,
    pub score: f32,
    pub headings: Vec<String>,
}

impl SearchHit {
    pub fn from_chunk(chunk: Chunk, plans: &PlanRegistry) -> Self {
        let document = chunk
            .document_hash
            .as_deref()
            .and_then(|hash| plans.filename_for_hash(hash))
            .map(str::to_string)
            .or_else(|| chunk.document_hash.clone())
            .unwrap_or_default();
        Self {
            text: chunk.text,
            document,
            binary_hash: chunk.document_hash,
            page: chunk.page_number,
            score: chunk.relevance_score,
            headings: chunk.headings,
        }
    }
}

/// `{"result": [...]}` envelope used by the search endpoints
#[derive(Debug, Serialize)]
pub struct ResultList<T> {
    pub result: Vec<T>,
}
