// Benefits Search - hybrid search and visual grounding over Medicare plan documents

pub mod annotate;
pub mod config;
pub mod documents;
pub mod grounding;
pub mod middleware;
pub mod models;
pub mod plans;
pub mod routes;
pub mod search;    // Hybrid search client (Qdrant Query API)
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;
pub use types::{AppError, AppResult};

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
