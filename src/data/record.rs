use serde::Serialize;
use serde_json::{Map, Value};

use super::osm::ElementKind;

/// Top level field names owned by the record itself. Tags never write into these.
pub const RESERVED_FIELDS: [&str; 6] = ["id", "type", "visible", "created", "pos", "node_refs"];

/// Provenance attributes, copied verbatim.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Created {
    pub user: String,
    pub uid: String,
    pub timestamp: String,
    pub version: String,
    pub changeset: String,
}

/// One cleaned element, serialized as a single JSON line.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    /// `null` in the output when the source omits the attribute.
    pub visible: Option<String>,
    pub created: Created,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_refs: Option<Vec<i64>>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}
