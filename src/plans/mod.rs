//! Plan Registry
//!
//! Static mapping of plan identifiers to the documents extracted for them,
//! loaded once at startup from a JSON file:
//!
//! ```json
//! [
//!   {
//!     "plan_id": "H1036-077",
//!     "plan_name": "Humana Gold Plus",
//!     "documents": [
//!       { "binary_hash": 1234567890, "filename": "Humana SOB.json", "kind": "sob" },
//!       { "binary_hash": "9876543210", "filename": "Humana EOC.json", "kind": "eoc" }
//!     ]
//!   }
//! ]
//! ```
//!
//! The registry is immutable after [`PlanRegistry::load`]; malformed files
//! fail fast instead of serving a partial view.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::types::deserialize_hash;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Failed to read plan file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed plan file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Plan entry #{0} has an empty plan_id")]
    EmptyPlanId(usize),

    #[error("Duplicate plan_id '{0}'")]
    DuplicatePlan(String),

    #[error("Document hash {hash} is assigned to both '{first}' and '{second}'")]
    DuplicateHash {
        hash: String,
        first: String,
        second: String,
    },

    #[error("Plan '{0}' not found")]
    NotFound(String),
}

/// Which plan document a file represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Summary of Benefits
    Sob,
    /// Evidence of Coverage
    Eoc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDocument {
    #[serde(deserialize_with = "deserialize_hash")]
    pub binary_hash: String,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<DocumentKind>,
}

impl PlanDocument {
    /// Explicit kind, or a guess from the filename when the entry is untagged.
    pub fn resolved_kind(&self) -> Option<DocumentKind> {
        if self.kind.is_some() {
            return self.kind;
        }
        let upper = self.filename.to_uppercase();
        match (upper.contains("SOB"), upper.contains("EOC")) {
            (true, false) => Some(DocumentKind::Sob),
            (false, true) => Some(DocumentKind::Eoc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: String,
    #[serde(rename = "plan_name", alias = "display_name")]
    pub display_name: String,
    #[serde(default)]
    pub documents: Vec<PlanDocument>,
}

impl Plan {
    pub fn sob_document_hash(&self) -> Option<&str> {
        self.document_of_kind(DocumentKind::Sob)
    }

    pub fn eoc_document_hash(&self) -> Option<&str> {
        self.document_of_kind(DocumentKind::Eoc)
    }

    pub fn document_hashes(&self) -> Vec<String> {
        self.documents.iter().map(|d| d.binary_hash.clone()).collect()
    }

    fn document_of_kind(&self, kind: DocumentKind) -> Option<&str> {
        self.documents
            .iter()
            .find(|d| d.resolved_kind() == Some(kind))
            .map(|d| d.binary_hash.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlanRegistry {
    plans: Vec<Plan>,
    by_id: HashMap<String, usize>,
    // hash -> (plan index, document index)
    by_hash: HashMap<String, (usize, usize)>,
}

impl PlanRegistry {
    /// Load and validate the registry file
    pub fn load(path: &Path) -> Result<Self, PlanError> {
        let raw = std::fs::read_to_string(path).map_err(|source| PlanError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_json(&raw)?;
        info!(
            path = %path.display(),
            plans = registry.plans.len(),
            documents = registry.by_hash.len(),
            "Loaded plan registry"
        );
        Ok(registry)
    }

    pub fn from_json(raw: &str) -> Result<Self, PlanError> {
        let entries: Vec<Plan> = serde_json::from_str(raw)?;
        Self::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<Plan>) -> Result<Self, PlanError> {
        let mut by_id = HashMap::with_capacity(entries.len());
        let mut by_hash: HashMap<String, (usize, usize)> = HashMap::new();

        for (idx, plan) in entries.iter().enumerate() {
            if plan.plan_id.trim().is_empty() {
                return Err(PlanError::EmptyPlanId(idx));
            }
            if by_id.insert(plan.plan_id.clone(), idx).is_some() {
                return Err(PlanError::DuplicatePlan(plan.plan_id.clone()));
            }
            debug!(plan_id = %plan.plan_id, documents = plan.documents.len(), "Registering plan");

            for (doc_idx, doc) in plan.documents.iter().enumerate() {
                if let Some(&(owner, _)) = by_hash.get(&doc.binary_hash) {
                    if owner != idx {
                        return Err(PlanError::DuplicateHash {
                            hash: doc.binary_hash.clone(),
                            first: entries[owner].plan_id.clone(),
                            second: plan.plan_id.clone(),
                        });
                    }
                    continue;
                }
                by_hash.insert(doc.binary_hash.clone(), (idx, doc_idx));
            }
        }

        Ok(Self {
            plans: entries,
            by_id,
            by_hash,
        })
    }

    pub fn list_plans(&self) -> &[Plan] {
        &self.plans
    }

    pub fn get_plan(&self, plan_id: &str) -> Result<&Plan, PlanError> {
        self.by_id
            .get(plan_id)
            .map(|&idx| &self.plans[idx])
            .ok_or_else(|| PlanError::NotFound(plan_id.to_string()))
    }

    pub fn document_hashes(&self, plan_id: &str) -> Result<Vec<String>, PlanError> {
        self.get_plan(plan_id).map(Plan::document_hashes)
    }

    /// Plan owning the document with this hash
    pub fn plan_for_hash(&self, binary_hash: &str) -> Option<&Plan> {
        self.by_hash
            .get(binary_hash)
            .map(|&(plan_idx, _)| &self.plans[plan_idx])
    }

    pub fn filename_for_hash(&self, binary_hash: &str) -> Option<&str> {
        self.by_hash
            .get(binary_hash)
            .map(|&(plan_idx, doc_idx)| self.plans[plan_idx].documents[doc_idx].filename.as_str())
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}
