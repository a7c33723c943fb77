use serde::Serialize;

/// The two element kinds we carry through. Relations are never emitted.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    #[serde(rename = "node")]
    Point,
    #[serde(rename = "way")]
    Way,
}

impl ElementKind {
    pub fn from_tag_name(name: &[u8]) -> Option<ElementKind> {
        match name {
            b"node" => Some(ElementKind::Point),
            b"way" => Some(ElementKind::Way),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Point => "node",
            ElementKind::Way => "way",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTag {
    pub key: String,
    pub value: String,
}

impl RawTag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> RawTag {
        RawTag {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One element as read from the extract, attributes untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct RawElement {
    pub kind: ElementKind,
    pub id: Option<String>,
    pub visible: Option<String>,
    pub user: Option<String>,
    pub uid: Option<String>,
    pub timestamp: Option<String>,
    pub version: Option<String>,
    pub changeset: Option<String>,
    pub lon: Option<String>,
    pub lat: Option<String>,
    pub node_refs: Vec<String>,
    pub tags: Vec<RawTag>,
}

impl RawElement {
    pub fn new(kind: ElementKind) -> RawElement {
        RawElement {
            kind,
            id: None,
            visible: None,
            user: None,
            uid: None,
            timestamp: None,
            version: None,
            changeset: None,
            lon: None,
            lat: None,
            node_refs: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Stores a known attribute. Returns false for attributes we don't keep.
    pub fn set_attribute(&mut self, key: &[u8], value: String) -> bool {
        let slot = match key {
            b"id" => &mut self.id,
            b"visible" => &mut self.visible,
            b"user" => &mut self.user,
            b"uid" => &mut self.uid,
            b"timestamp" => &mut self.timestamp,
            b"version" => &mut self.version,
            b"changeset" => &mut self.changeset,
            b"lon" => &mut self.lon,
            b"lat" => &mut self.lat,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    pub fn id_or_unknown(&self) -> &str {
        self.id.as_deref().unwrap_or("<unknown>")
    }
}
