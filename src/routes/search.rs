use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use tracing::info;

use crate::grounding::{ground, GroundedHit};
use crate::models::{AppState, ResultList, SearchHit, SearchParams};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/search", get(search))
        .route("/api/visual_grounding", get(visual_grounding))
        .with_state(state)
}

/// Validated form of [`SearchParams`]
#[derive(Debug)]
struct ResolvedQuery {
    text: String,
    top_k: usize,
    plan_id: Option<String>,
    plan_filter: Option<Vec<String>>,
}

impl ResolvedQuery {
    /// The plan is resolved before anything else so an unknown plan always
    /// reports as not found, whatever else is wrong with the request.
    fn resolve(state: &AppState, params: SearchParams, default_k: usize) -> AppResult<Self> {
        let plan_id = params
            .plan_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        let plan_filter = match &plan_id {
            Some(id) => Some(state.plans.document_hashes(id)?),
            None => None,
        };

        let text = params.q.as_deref().map(str::trim).unwrap_or_default();
        if text.is_empty() {
            return Err(AppError::Validation("Query parameter 'q' must not be empty".to_string()));
        }

        let max_k = state.config.search.max_top_k;
        let top_k = params.k.unwrap_or(default_k);
        if !(1..=max_k).contains(&top_k) {
            return Err(AppError::Validation(format!(
                "Query parameter 'k' must be between 1 and {}",
                max_k
            )));
        }

        Ok(Self {
            text: text.to_string(),
            top_k,
            plan_id,
            plan_filter,
        })
    }
}

fn query_params(params: Result<Query<SearchParams>, QueryRejection>) -> AppResult<SearchParams> {
    params
        .map(|Query(p)| p)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

async fn search(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> AppResult<Json<ResultList<SearchHit>>> {
    let query = ResolvedQuery::resolve(
        &state,
        query_params(params)?,
        state.config.search.default_top_k,
    )?;

    let chunks = state
        .searcher
        .search(&query.text, query.top_k, query.plan_filter.as_deref())
        .await?;
    let result: Vec<SearchHit> = chunks
        .into_iter()
        .map(|chunk| SearchHit::from_chunk(chunk, &state.plans))
        .collect();

    info!(plan_id = ?query.plan_id, top_k = query.top_k, hits = result.len(), "Search served");
    Ok(Json(ResultList { result }))
}

async fn visual_grounding(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> AppResult<Json<ResultList<GroundedHit>>> {
    let query = ResolvedQuery::resolve(
        &state,
        query_params(params)?,
        state.config.search.grounding_default_top_k,
    )?;

    let chunks = state
        .searcher
        .search(&query.text, query.top_k, query.plan_filter.as_deref())
        .await?;
    let result = ground(chunks, &state.plans, &state.documents).await?;

    info!(plan_id = ?query.plan_id, top_k = query.top_k, hits = result.len(), "Visual grounding served");
    Ok(Json(ResultList { result }))
}
