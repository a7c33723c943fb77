use std::{fmt, io};
use quick_xml::events::attributes::AttrError;

#[derive(Debug)]
pub struct Error {
    pub message: String,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error {
            message: value.to_string()
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(value: quick_xml::Error) -> Self {
        Error {
            message: value.to_string()
        }
    }
}

impl From<AttrError> for Error {
    fn from(value: AttrError) -> Self {
        Error {
            message: value.to_string()
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error {
            message: value.to_string()
        }
    }
}

impl From<regex::Error> for Error {
    fn from(value: regex::Error) -> Self {
        Error {
            message: value.to_string()
        }
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Error {
            message: value.to_string()
        }
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error {
            message: value
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Problems confined to a single element. The run skips the element and carries on.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordError {
    MalformedGeometry {
        id: String,
        reason: String,
    },
    MalformedReference {
        id: String,
        reference: String,
    },
    MissingMandatoryAttribute {
        id: Option<String>,
        attribute: &'static str,
    },
}

impl RecordError {
    pub fn kind(&self) -> &'static str {
        match self {
            RecordError::MalformedGeometry { .. } => "malformed_geometry",
            RecordError::MalformedReference { .. } => "malformed_reference",
            RecordError::MissingMandatoryAttribute { .. } => "missing_mandatory_attribute",
        }
    }

    pub fn element_id(&self) -> Option<&str> {
        match self {
            RecordError::MalformedGeometry { id, .. } => Some(id),
            RecordError::MalformedReference { id, .. } => Some(id),
            RecordError::MissingMandatoryAttribute { id, .. } => id.as_deref(),
        }
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::MalformedGeometry { id, reason } => {
                write!(f, "element {}: malformed geometry: {}", id, reason)
            },
            RecordError::MalformedReference { id, reference } => {
                write!(f, "element {}: node reference {:?} is not an integer", id, reference)
            },
            RecordError::MissingMandatoryAttribute { id: Some(id), attribute } => {
                write!(f, "element {}: missing mandatory attribute {:?}", id, attribute)
            },
            RecordError::MissingMandatoryAttribute { id: None, attribute } => {
                write!(f, "element without id: missing mandatory attribute {:?}", attribute)
            },
        }
    }
}

impl std::error::Error for RecordError {}
