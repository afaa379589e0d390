use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::types::BinaryHash;

/// Point returned by the vector store, payload untouched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: Value,
    pub score: f32,
    #[serde(default)]
    pub payload: Option<Map<String, Value>>,
}

/// A hybrid query before it is shaped into the vector store's wire format
#[derive(Debug, Clone, PartialEq)]
pub struct HybridQuery {
    pub text: String,
    pub limit: usize,
    /// Restrict hits to these document hashes
    pub document_hashes: Option<Vec<String>>,
}

impl HybridQuery {
    pub fn new(text: impl Into<String>, limit: usize, plan_filter: Option<&[String]>) -> Self {
        Self {
            text: text.into(),
            limit,
            document_hashes: plan_filter.map(|hashes| hashes.to_vec()),
        }
    }
}

/// Origin of a page-space bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoordOrigin {
    #[serde(rename = "TOPLEFT")]
    TopLeft,
    #[default]
    #[serde(rename = "BOTTOMLEFT")]
    BottomLeft,
}

/// Bounding box in page points as written by the extraction step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageBox {
    pub l: f64,
    pub t: f64,
    pub r: f64,
    pub b: f64,
    #[serde(default)]
    pub coord_origin: CoordOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

/// Box in `[0, 1]` page-relative coordinates, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub l: f64,
    pub t: f64,
    pub r: f64,
    pub b: f64,
}

impl NormalizedBox {
    pub fn is_valid(&self) -> bool {
        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        in_range(self.l)
            && in_range(self.t)
            && in_range(self.r)
            && in_range(self.b)
            && self.l <= self.r
            && self.t <= self.b
    }
}

impl PageBox {
    /// Convert to normalized top-left coordinates for a page of `size`.
    ///
    /// Returns `None` when the page size is unusable.
    pub fn normalize(&self, size: PageSize) -> Option<NormalizedBox> {
        if !(size.width > 0.0 && size.height > 0.0) {
            return None;
        }
        let (top, bottom) = match self.coord_origin {
            CoordOrigin::TopLeft => (self.t / size.height, self.b / size.height),
            CoordOrigin::BottomLeft => (1.0 - self.t / size.height, 1.0 - self.b / size.height),
        };
        let left = self.l / size.width;
        let right = self.r / size.width;

        let clamp = |v: f64| v.clamp(0.0, 1.0);
        Some(NormalizedBox {
            l: clamp(left.min(right)),
            t: clamp(top.min(bottom)),
            r: clamp(left.max(right)),
            b: clamp(top.max(bottom)),
        })
    }
}

/// Where a chunk's text sits in its source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub page: u32,
    pub bbox: PageBox,
}

/// Search hit mapped from a vector store point
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    pub point_id: String,
    /// Source document hash; fallback chunks written without one carry `None`
    pub document_hash: Option<String>,
    /// Page of the first provenance entry
    pub page_number: Option<u32>,
    pub text: String,
    pub headings: Vec<String>,
    pub relevance_score: f32,
    pub provenance: Vec<Provenance>,
}

impl Chunk {
    /// Boxes that sit on the chunk's primary page
    pub fn primary_page_boxes(&self) -> impl Iterator<Item = &PageBox> {
        let page = self.page_number;
        self.provenance
            .iter()
            .filter(move |p| Some(p.page) == page)
            .map(|p| &p.bbox)
    }

    /// Map a scored point. Every point becomes a chunk; parts of the payload
    /// that cannot be read are left empty.
    pub fn from_point(point: ScoredPoint) -> Self {
        let point_id = match &point.id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let payload = point.payload.unwrap_or_default();
        let payload: ChunkPayload = match serde_json::from_value(Value::Object(payload)) {
            Ok(p) => p,
            Err(e) => {
                warn!(point_id = %point_id, error = %e, "Unreadable payload, returning bare hit");
                ChunkPayload::default()
            }
        };

        let document_hash = payload
            .origin
            .and_then(|o| o.binary_hash)
            .or(payload.doc_hash)
            .map(BinaryHash::into_string);
        if document_hash.is_none() {
            debug!(point_id = %point_id, "Point has no document hash");
        }

        let mut provenance: Vec<Provenance> = payload
            .doc_items
            .unwrap_or_default()
            .into_iter()
            .flat_map(|item| item.prov.unwrap_or_default())
            .filter_map(|p| {
                Some(Provenance {
                    page: p.page_no?,
                    bbox: page_box(p.bbox?)?,
                })
            })
            .collect();
        if provenance.is_empty() {
            if let (Some(page), Some(bbox)) = (payload.page_no, payload.bbox.and_then(page_box)) {
                provenance.push(Provenance { page, bbox });
            }
        }
        let page_number = provenance.first().map(|p| p.page).or(payload.page_no);

        Self {
            point_id,
            document_hash,
            page_number,
            text: payload.text.or(payload.document).unwrap_or_default(),
            headings: payload.headings.unwrap_or_default(),
            relevance_score: point.score,
            provenance,
        }
    }
}

fn page_box(raw: Value) -> Option<PageBox> {
    serde_json::from_value(raw).ok()
}

// Chunk payload as written by the indexer. Text chunks carry Docling metadata
// (`origin`, `doc_items`), table and markdown fallbacks carry a flat `doc_hash`
// and optionally `page_no`/`bbox`.
#[derive(Debug, Default, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    document: Option<String>,
    #[serde(default)]
    headings: Option<Vec<String>>,
    #[serde(default)]
    origin: Option<PayloadOrigin>,
    #[serde(default)]
    doc_hash: Option<BinaryHash>,
    #[serde(default)]
    doc_items: Option<Vec<DocItem>>,
    #[serde(default)]
    page_no: Option<u32>,
    #[serde(default)]
    bbox: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PayloadOrigin {
    #[serde(default)]
    binary_hash: Option<BinaryHash>,
}

#[derive(Debug, Deserialize)]
struct DocItem {
    #[serde(default)]
    prov: Option<Vec<ProvEntry>>,
}

#[derive(Debug, Deserialize)]
struct ProvEntry {
    #[serde(default)]
    page_no: Option<u32>,
    #[serde(default)]
    bbox: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point(id: Value, score: f32, payload: Value) -> ScoredPoint {
        ScoredPoint {
            id,
            score,
            payload: payload.as_object().cloned(),
        }
    }

    #[test]
    fn test_maps_docling_payload() {
        let p = point(
            json!("9b2c-uuid"),
            0.42,
            json!({
                "text": "Your maximum out-of-pocket is $3,400.",
                "headings": ["Section 1", "Costs"],
                "origin": { "binary_hash": 12345678901234u64, "filename": "Humana EOC.pdf" },
                "doc_items": [
                    { "prov": [{ "page_no": 4, "bbox": { "l": 72.0, "t": 700.0, "r": 540.0, "b": 650.0, "coord_origin": "BOTTOMLEFT" } }] },
                    { "prov": [{ "page_no": 5, "bbox": { "l": 72.0, "t": 100.0, "r": 300.0, "b": 80.0 } }] }
                ]
            }),
        );

        let chunk = Chunk::from_point(p);
        assert_eq!(chunk.point_id, "9b2c-uuid");
        assert_eq!(chunk.document_hash.as_deref(), Some("12345678901234"));
        assert_eq!(chunk.page_number, Some(4));
        assert_eq!(chunk.headings, vec!["Section 1", "Costs"]);
        assert_eq!(chunk.provenance.len(), 2);
        assert_eq!(chunk.primary_page_boxes().count(), 1);
        assert!((chunk.relevance_score - 0.42).abs() < f32::EPSILON);
    }

    #[test]
    fn test_maps_table_fallback_payload() {
        let p = point(
            json!(17),
            0.1,
            json!({
                "document": "| Benefit | Cost |",
                "doc_hash": "555",
                "content_type": "table",
                "page_no": 2,
                "bbox": { "l": 10.0, "t": 20.0, "r": 30.0, "b": 40.0, "coord_origin": "TOPLEFT" }
            }),
        );

        let chunk = Chunk::from_point(p);
        assert_eq!(chunk.point_id, "17");
        assert_eq!(chunk.text, "| Benefit | Cost |");
        assert_eq!(chunk.document_hash.as_deref(), Some("555"));
        assert_eq!(chunk.page_number, Some(2));
        assert_eq!(chunk.provenance[0].bbox.coord_origin, CoordOrigin::TopLeft);
        assert!(chunk.headings.is_empty());
    }

    #[test]
    fn test_point_without_hash_is_kept() {
        let chunk = Chunk::from_point(point(json!(1), 0.5, json!({ "text": "Markdown export", "doc_hash": null })));
        assert_eq!(chunk.document_hash, None);
        assert_eq!(chunk.text, "Markdown export");
        assert_eq!(chunk.page_number, None);

        let empty = Chunk::from_point(ScoredPoint { id: json!(2), score: 0.5, payload: None });
        assert_eq!(empty.point_id, "2");
        assert!(empty.text.is_empty());
    }

    #[test]
    fn test_malformed_prov_entries_are_skipped() {
        let p = point(
            json!("c1"),
            0.3,
            json!({
                "text": "Vision exam covered",
                "origin": { "binary_hash": 42 },
                "doc_items": [
                    { "prov": [{ "page_no": 7 }] },
                    { "prov": [{ "bbox": { "l": 1.0, "t": 2.0, "r": 3.0, "b": 1.0 } }] },
                    { "prov": [{ "page_no": 8, "bbox": { "l": "wide" } }] },
                    { "prov": [{ "page_no": 9, "bbox": { "l": 1.0, "t": 2.0, "r": 3.0, "b": 1.0 } }] }
                ]
            }),
        );

        let chunk = Chunk::from_point(p);
        assert_eq!(chunk.document_hash.as_deref(), Some("42"));
        assert_eq!(chunk.provenance.len(), 1);
        assert_eq!(chunk.page_number, Some(9));
    }

    #[test]
    fn test_unreadable_payload_still_yields_hit() {
        let chunk = Chunk::from_point(point(json!("x"), 0.2, json!({ "text": 12, "headings": "none" })));
        assert_eq!(chunk.point_id, "x");
        assert_eq!(chunk.document_hash, None);
        assert!(chunk.text.is_empty());
    }

    #[test]
    fn test_normalize_bottom_left_box() {
        let size = PageSize { width: 600.0, height: 800.0 };
        let bbox = PageBox { l: 60.0, t: 720.0, r: 300.0, b: 400.0, coord_origin: CoordOrigin::BottomLeft };

        let n = bbox.normalize(size).unwrap();
        assert!((n.l - 0.1).abs() < 1e-9);
        assert!((n.t - 0.1).abs() < 1e-9);
        assert!((n.r - 0.5).abs() < 1e-9);
        assert!((n.b - 0.5).abs() < 1e-9);
        assert!(n.is_valid());
    }

    #[test]
    fn test_normalize_top_left_box_and_clamping() {
        let size = PageSize { width: 100.0, height: 100.0 };
        let bbox = PageBox { l: -5.0, t: 10.0, r: 120.0, b: 50.0, coord_origin: CoordOrigin::TopLeft };

        let n = bbox.normalize(size).unwrap();
        assert_eq!(n, NormalizedBox { l: 0.0, t: 0.1, r: 1.0, b: 0.5 });

        let degenerate = PageSize { width: 0.0, height: 100.0 };
        assert!(bbox.normalize(degenerate).is_none());
    }

    #[test]
    fn test_normalized_box_validation() {
        assert!(NormalizedBox { l: 0.0, t: 0.0, r: 1.0, b: 1.0 }.is_valid());
        assert!(!NormalizedBox { l: 0.6, t: 0.0, r: 0.5, b: 1.0 }.is_valid());
        assert!(!NormalizedBox { l: 0.0, t: 0.0, r: 1.2, b: 1.0 }.is_valid());
        assert!(!NormalizedBox { l: f64::NAN, t: 0.0, r: 1.0, b: 1.0 }.is_valid());
    }
}
