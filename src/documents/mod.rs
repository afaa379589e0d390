//! Document store accessor.
//!
//! Read-only view over the directory written by the offline extraction step:
//!
//! ```text
//! extracted_docs/
//!   Humana EOC.json          # Docling JSON: text, layout, page sizes
//!   Humana EOC/page-1.png    # optional per-page renders
//!   Humana EOC/page-2.png
//! ```
//!
//! Page images come from the per-page files when present, otherwise from the
//! base64 data URI embedded in the JSON's `pages.<n>.image.uri`.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::search::PageSize;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("{0}")]
    NotFound(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed extraction artifact {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Embedded page image is not a base64 data URI: {0}")]
    InvalidImageUri(String),

    #[error("Extraction artifact unavailable: {0}")]
    Unavailable(String),
}

impl DocumentError {
    /// Treat a missing artifact as an upstream failure rather than a bad reference.
    pub fn into_unavailable(self) -> Self {
        match self {
            DocumentError::NotFound(msg) => DocumentError::Unavailable(msg),
            other => other,
        }
    }
}

/// Page sizes of one extracted document, keyed by 1-based page number
#[derive(Debug, Clone, Default)]
pub struct DocumentLayout {
    pages: BTreeMap<u32, PageSize>,
}

impl DocumentLayout {
    pub fn page_size(&self, page: u32) -> Option<PageSize> {
        self.pages.get(&page).copied()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[derive(Clone)]
pub struct DocumentStore {
    root: PathBuf,
    layouts: Arc<RwLock<HashMap<String, Arc<DocumentLayout>>>>,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            layouts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the extraction JSON for `filename`
    pub fn json_path(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    /// Location of the rendered image for `page` of `filename`
    pub fn page_image_path(&self, filename: &str, page: u32) -> PathBuf {
        let stem = Path::new(filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.to_string());
        self.root.join(stem).join(format!("page-{}.png", page))
    }

    /// Page sizes for a document, cached after the first read.
    pub async fn layout(&self, filename: &str) -> Result<Arc<DocumentLayout>, DocumentError> {
        if let Some(layout) = self.layouts.read().await.get(filename) {
            return Ok(layout.clone());
        }

        let document = self.read_document(filename).await?;
        let pages = document
            .pages
            .into_iter()
            .filter_map(|(key, page)| {
                let number = page.page_no.or_else(|| key.parse().ok())?;
                Some((number, page.size?))
            })
            .collect();
        let layout = Arc::new(DocumentLayout { pages });
        debug!(filename, pages = layout.page_count(), "Cached document layout");

        let mut guard = self.layouts.write().await;
        Ok(guard
            .entry(filename.to_string())
            .or_insert(layout)
            .clone())
    }

    /// Encoded image bytes for one page
    pub async fn page_image(&self, filename: &str, page: u32) -> Result<Vec<u8>, DocumentError> {
        let image_path = self.page_image_path(filename, page);
        match tokio::fs::read(&image_path).await {
            Ok(bytes) => {
                debug!(path = %image_path.display(), "Loaded page image from disk");
                return Ok(bytes);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                return Err(DocumentError::Io {
                    path: image_path,
                    source,
                })
            }
        }

        let document = self.read_document(filename).await?;
        let entry = document
            .pages
            .into_iter()
            .find(|(key, p)| p.page_no.or_else(|| key.parse().ok()) == Some(page))
            .map(|(_, p)| p)
            .ok_or_else(|| {
                DocumentError::NotFound(format!("Page {} not found in '{}'", page, filename))
            })?;
        let uri = entry.image.and_then(|i| i.uri).ok_or_else(|| {
            DocumentError::NotFound(format!("Page {} of '{}' has no image", page, filename))
        })?;

        info!(filename, page, "Decoding embedded page image");
        decode_data_uri(&uri)
    }

    async fn read_document(&self, filename: &str) -> Result<ExtractedDocument, DocumentError> {
        let path = self.json_path(filename);
        let raw = tokio::fs::read(&path).await.map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                DocumentError::NotFound(format!("Extraction artifact '{}' not found", filename))
            } else {
                DocumentError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        serde_json::from_slice(&raw).map_err(|source| DocumentError::Parse { path, source })
    }
}

fn decode_data_uri(uri: &str) -> Result<Vec<u8>, DocumentError> {
    let invalid = || DocumentError::InvalidImageUri(uri.chars().take(48).collect());
    let (header, data) = uri.split_once(',').ok_or_else(invalid)?;
    if !header.starts_with("data:") || !header.ends_with(";base64") {
        return Err(invalid());
    }
    BASE64.decode(data.trim()).map_err(|_| invalid())
}

// Only the parts of the Docling JSON this service reads.
#[derive(Debug, Deserialize)]
struct ExtractedDocument {
    #[serde(default)]
    pages: HashMap<String, ExtractedPage>,
}

#[derive(Debug, Deserialize)]
struct ExtractedPage {
    #[serde(default)]
    page_no: Option<u32>,
    #[serde(default)]
    size: Option<PageSize>,
    #[serde(default)]
    image: Option<ExtractedImage>,
}

#[derive(Debug, Deserialize)]
struct ExtractedImage {
    #[serde(default)]
    uri: Option<String>,
}
