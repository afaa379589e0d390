//! API Routes
//!
//! - `/api/health` - Health check
//! - `/api/plans` - Plan registry listing and lookup
//! - `/api/search` - Hybrid search over extracted plan documents
//! - `/api/visual_grounding` - Search hits with page bounding boxes
//! - `/api/annotate_result` - Highlighted page image for a grounded hit

pub mod annotate;
pub mod health;
pub mod plans;
pub mod search;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::apply_cors;
use crate::models::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let api_router = Router::new()
        .merge(health::router(state.clone()))
        .merge(plans::router(state.clone()))
        .merge(search::router(state.clone()))
        .merge(annotate::router(state.clone()));

    apply_cors(api_router, &state.config.server.cors_allowed_origins)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::Path;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body, Bytes};
    use axum::http::{header, Request, Response};
    use axum::Router;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::documents::DocumentStore;
    use crate::models::AppState;
    use crate::plans::PlanRegistry;
    use crate::search::{HybridSearcher, VectorStore};

    pub const TEST_PLANS: &str = r#"[
        {
            "plan_id": "H1036-077",
            "plan_name": "Humana Gold Plus",
            "documents": [
                { "binary_hash": 42, "filename": "Humana EOC.json", "kind": "eoc" },
                { "binary_hash": "43", "filename": "Humana SOB.json", "kind": "sob" }
            ]
        },
        {
            "plan_id": "H5521-241",
            "plan_name": "Aetna Medicare Eagle",
            "documents": [
                { "binary_hash": "777", "filename": "Aetna SOB.json" }
            ]
        }
    ]"#;

    pub fn test_state(store: Arc<dyn VectorStore>, doc_root: &Path) -> AppState {
        let config = Config::from_lookup(|key| match key {
            "QDRANT_URL" => Some("http://localhost:6333".to_string()),
            _ => None,
        })
        .unwrap();
        AppState {
            config: Arc::new(config),
            plans: Arc::new(PlanRegistry::from_json(TEST_PLANS).unwrap()),
            searcher: HybridSearcher::new(store),
            documents: DocumentStore::new(doc_root),
        }
    }

    /// Docling JSON with a single sized page
    pub fn write_layout(root: &Path, filename: &str, page: u32, width: f64, height: f64) {
        let mut pages = serde_json::Map::new();
        pages.insert(
            page.to_string(),
            serde_json::json!({ "page_no": page, "size": { "width": width, "height": height } }),
        );
        let doc = serde_json::json!({ "pages": pages });
        std::fs::write(root.join(filename), doc.to_string()).unwrap();
    }

    pub async fn get(app: Router, uri: &str) -> Response<Body> {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
        app.oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
    }

    pub async fn body_bytes(response: Response<Body>) -> Bytes {
        to_bytes(response.into_body(), usize::MAX).await.unwrap()
    }

    pub async fn body_json(response: Response<Body>) -> serde_json::Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{body_json, get, test_state};
    use super::*;
    use crate::search::testing::{docling_point, StubStore};
    use axum::http::StatusCode;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_full_router_serves_every_endpoint() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(StubStore::with_points(vec![
            docling_point("a", 0.9, "42", 1, "one"),
            docling_point("b", 0.5, "43", 1, "two"),
        ]));
        let app = create_router(test_state(store, dir.path()));

        assert_eq!(get(app.clone(), "/api/health").await.status(), StatusCode::OK);
        assert_eq!(get(app.clone(), "/api/plans").await.status(), StatusCode::OK);

        let response = get(app.clone(), "/api/search?q=copay&k=2").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["result"].as_array().unwrap().len(), 2);

        let response = get(app, "/api/visual_grounding?plan_id=unknown").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
