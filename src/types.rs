// Shared error taxonomy and small wire helpers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::annotate::AnnotateError;
use crate::documents::DocumentError;
use crate::plans::PlanError;
use crate::search::SearchError;

/// Errors surfaced to HTTP callers.
///
/// Every module-level error funnels into one of these four kinds; nothing is
/// retried or recovered locally.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

/// JSON body returned for every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::Validation(_) => "validation_error",
            AppError::Upstream(_) => "upstream_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::NotFound(m)
            | AppError::Validation(m)
            | AppError::Upstream(m)
            | AppError::Internal(m) => m.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Upstream(_) | AppError::Internal(_) => error!(kind = self.kind(), "{}", self),
            _ => warn!(kind = self.kind(), "{}", self),
        }

        let body = ErrorBody {
            error: self.kind().to_string(),
            message: self.message(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<PlanError> for AppError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::NotFound(id) => AppError::NotFound(format!("Unknown plan_id '{}'", id)),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Config(msg) => AppError::Internal(msg),
            other => AppError::Upstream(other.to_string()),
        }
    }
}

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::NotFound(msg) => AppError::NotFound(msg),
            other => AppError::Upstream(other.to_string()),
        }
    }
}

impl From<AnnotateError> for AppError {
    fn from(err: AnnotateError) -> Self {
        match err {
            AnnotateError::InvalidBox(msg) => AppError::Validation(msg),
            AnnotateError::Decode(e) => {
                AppError::Upstream(format!("Page image could not be decoded: {}", e))
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// Document hash as it appears on the wire.
///
/// The extraction step writes hashes as unsigned integers, hand-edited plan
/// files usually quote them. Both collapse to the decimal string form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BinaryHash {
    Text(String),
    Number(u64),
}

impl BinaryHash {
    pub fn into_string(self) -> String {
        match self {
            BinaryHash::Text(s) => s,
            BinaryHash::Number(n) => n.to_string(),
        }
    }
}

pub(crate) fn deserialize_hash<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    BinaryHash::deserialize(deserializer).map(BinaryHash::into_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Upstream("x".into()).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            AppError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_plan_not_found_maps_to_not_found() {
        let err: AppError = PlanError::NotFound("h-missing".to_string()).into();
        assert!(matches!(err, AppError::NotFound(ref m) if m.contains("h-missing")));
    }

    #[test]
    fn test_binary_hash_accepts_numbers_and_strings() {
        let n: BinaryHash = serde_json::from_str("18446744073709551615").unwrap();
        assert_eq!(n.into_string(), "18446744073709551615");
        let s: BinaryHash = serde_json::from_str("\"abc123\"").unwrap();
        assert_eq!(s.into_string(), "abc123");
    }
}
