use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use tracing::{debug, info};

use crate::annotate::{annotate, AnnotationStyle};
use crate::grounding::{AnnotateRequest, ANNOTATE_ENDPOINT};
use crate::models::AppState;
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(ANNOTATE_ENDPOINT, post(annotate_result))
        .with_state(state)
}

async fn annotate_result(
    State(state): State<AppState>,
    request: Result<Json<AnnotateRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(request) = request.map_err(|rejection| AppError::Validation(rejection.body_text()))?;

    if request.page == 0 {
        return Err(AppError::Validation("'page' is 1-based and must be at least 1".to_string()));
    }
    if let Some(idx) = request.boxes.iter().position(|b| !b.is_valid()) {
        return Err(AppError::Validation(format!(
            "box #{} must lie within [0, 1] with l <= r and t <= b",
            idx
        )));
    }

    let filename = state
        .plans
        .filename_for_hash(&request.binary_hash)
        .ok_or_else(|| {
            AppError::NotFound(format!("Unknown binary_hash '{}'", request.binary_hash))
        })?
        .to_string();

    let page_image = state.documents.page_image(&filename, request.page).await?;
    debug!(filename = %filename, page = request.page, bytes = page_image.len(), "Loaded page image");

    let boxes = request.boxes;
    let box_count = boxes.len();
    let png = tokio::task::spawn_blocking(move || {
        annotate(&page_image, &boxes, &AnnotationStyle::default())
    })
    .await
    .map_err(|e| AppError::Internal(format!("Annotation task failed: {}", e)))??;

    info!(filename = %filename, page = request.page, boxes = box_count, "Annotated page");
    Ok(([(header::CONTENT_TYPE, mime::IMAGE_PNG.to_string())], png))
}
