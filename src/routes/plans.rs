use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::debug;

use crate::models::{AppState, PlanSummary, PlansResponse};
use crate::types::AppResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/plans", get(list_plans))
        .route("/api/plans/{plan_id}", get(get_plan))
        .with_state(state)
}

async fn list_plans(State(state): State<AppState>) -> Json<PlansResponse> {
    let plans: Vec<PlanSummary> = state.plans.list_plans().iter().map(PlanSummary::from).collect();
    debug!(plans = plans.len(), "Listing plans");
    Json(PlansResponse { plans })
}

async fn get_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<String>,
) -> AppResult<Json<PlanSummary>> {
    let plan = state.plans.get_plan(&plan_id)?;
    Ok(Json(PlanSummary::from(plan)))
}
