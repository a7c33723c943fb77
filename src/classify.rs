use regex::Regex;
use serde::Serialize;

use crate::errors::Result;

const LOWER: &str = r"^[a-z_]*$";
const LOWER_COLON: &str = r"^[a-z_]*:[a-z_]*$";
const LOWER_COLON2: &str = r"^[a-z_]*:[a-z_]*:[a-z_]*$";
const PROBLEM_CHARS: &str = r#"[=+/&<>;'"?%#$@,. \t\r\n]"#;

/// Shape of a tag key.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum KeyShape {
    Plain,
    #[serde(rename = "namespaced_1")]
    Namespaced1,
    #[serde(rename = "namespaced_2")]
    Namespaced2,
    ProblemChars,
    Other,
}

pub struct KeyClassifier {
    lower: Regex,
    lower_colon: Regex,
    lower_colon2: Regex,
    problem_chars: Regex,
}

impl KeyClassifier {
    pub fn new() -> Result<KeyClassifier> {
        Ok(KeyClassifier {
            lower: Regex::new(LOWER)?,
            lower_colon: Regex::new(LOWER_COLON)?,
            lower_colon2: Regex::new(LOWER_COLON2)?,
            problem_chars: Regex::new(PROBLEM_CHARS)?,
        })
    }

    /// First matching category wins, in declaration order of `KeyShape`.
    pub fn classify(&self, key: &str) -> KeyShape {
        if self.lower.is_match(key) {
            KeyShape::Plain
        } else if self.lower_colon.is_match(key) {
            KeyShape::Namespaced1
        } else if self.lower_colon2.is_match(key) {
            KeyShape::Namespaced2
        } else if self.problem_chars.is_match(key) {
            KeyShape::ProblemChars
        } else {
            KeyShape::Other
        }
    }
}

/// Number of `:` separators in a key.
pub fn namespace_depth(key: &str) -> usize {
    key.bytes().filter(|b| *b == b':').count()
}
