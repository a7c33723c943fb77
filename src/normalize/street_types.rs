use regex::{NoExpand, Regex};
use serde::Deserialize;

use crate::errors::Result;

/// Abbreviation and its expansion, as written in a street types file.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StreetTypeEntry {
    pub abbreviation: String,
    pub replacement: String,
}

#[derive(Debug, Clone)]
struct StreetTypeRule {
    pattern: Regex,
    replacement: String,
}

/// Ordered abbreviation table. The first abbreviation found in a value wins.
#[derive(Debug, Clone, Default)]
pub struct StreetTypeTable {
    rules: Vec<StreetTypeRule>,
}

const BUILTIN: [(&str, &str); 18] = [
    ("CTRA.N-623,BURGOS-SANTANDER", "Carretera N-623, Burgos-Santander"),
    ("Carretera/Carrera", "Carretera"),
    ("CARRETERA", "Carretera"),
    ("AUTOVIA", "Autovía"),
    ("AVENIDA", "Avenida"),
    ("POLIGONO", "Polígono"),
    ("UrbanizaciÃ³n", "Urbanización"),
    ("ACCESO", "Acceso"),
    ("BARRIO", "Barrio"),
    ("CALLE", "Calle"),
    ("CRTA.", "Carretera"),
    ("PLAZA", "Plaza"),
    ("Kalea", "kalea"),
    ("Bº", "Barrio"),
    ("C/", "Calle"),
    ("AU", "Autovía"),
    ("CL", "Calle"),
    ("CR", "Carretera"),
];

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whole-word match on the sides of the abbreviation that end in word characters.
fn abbreviation_pattern(abbreviation: &str) -> Result<Regex> {
    let starts_with_word = abbreviation.chars().next().map_or(false, is_word_char);
    let ends_with_word = abbreviation.chars().last().map_or(false, is_word_char);
    let pattern = format!(
        "{}{}{}",
        if starts_with_word { r"\b" } else { "" },
        regex::escape(abbreviation),
        if ends_with_word { r"\b" } else { "" },
    );
    Ok(Regex::new(&pattern)?)
}

impl StreetTypeTable {
    pub fn from_entries(entries: &[StreetTypeEntry]) -> Result<StreetTypeTable> {
        let rules = entries.iter()
            .map(|entry| Ok(StreetTypeRule {
                pattern: abbreviation_pattern(&entry.abbreviation)?,
                replacement: entry.replacement.clone(),
            }))
            .collect::<Result<Vec<_>>>()?;
        Ok(StreetTypeTable { rules })
    }

    pub fn builtin() -> Result<StreetTypeTable> {
        let entries: Vec<StreetTypeEntry> = BUILTIN.iter()
            .map(|(abbreviation, replacement)| StreetTypeEntry {
                abbreviation: abbreviation.to_string(),
                replacement: replacement.to_string(),
            })
            .collect();
        StreetTypeTable::from_entries(&entries)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Substitutes the first matching abbreviation, once. `None` when nothing matched.
    pub fn normalize(&self, value: &str) -> Option<String> {
        self.rules.iter()
            .find(|rule| rule.pattern.is_match(value))
            .map(|rule| rule.pattern.replace(value, NoExpand(&rule.replacement)).into_owned())
    }
}
