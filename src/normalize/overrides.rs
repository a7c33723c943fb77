use std::collections::HashMap;

use serde::Deserialize;

use crate::data::osm::RawTag;

/// One hand-verified edit of an element's tag list.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TagOp {
    SetValue { key: String, value: String },
    RenameKey { from: String, to: String },
    InsertTag { key: String, value: String },
    RemoveTag { key: String },
}

impl TagOp {
    pub fn apply(&self, tags: &mut Vec<RawTag>) {
        match self {
            TagOp::SetValue { key, value } => {
                tags.iter_mut()
                    .filter(|tag| tag.key == *key)
                    .for_each(|tag| tag.value = value.clone());
            },
            TagOp::RenameKey { from, to } => {
                tags.iter_mut()
                    .filter(|tag| tag.key == *from)
                    .for_each(|tag| tag.key = to.clone());
            },
            TagOp::InsertTag { key, value } => tags.push(RawTag::new(key.as_str(), value.as_str())),
            TagOp::RemoveTag { key } => tags.retain(|tag| tag.key != *key),
        }
    }
}

/// Element id to the ordered edits it needs.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct OverrideTable {
    entries: HashMap<String, Vec<TagOp>>,
}

impl OverrideTable {
    pub fn new() -> OverrideTable {
        OverrideTable::default()
    }

    pub fn with(mut self, id: &str, ops: Vec<TagOp>) -> OverrideTable {
        self.entries.insert(id.to_string(), ops);
        self
    }

    pub fn builtin() -> OverrideTable {
        OverrideTable::new()
            .with("1247189817", vec![
                TagOp::SetValue {
                    key: "addr:housename".into(),
                    value: "Ercilla 37-39".into(),
                },
                TagOp::InsertTag {
                    key: "addr:street".into(),
                    value: "Calle de Ercilla".into(),
                },
                TagOp::InsertTag {
                    key: "addr:housenumber".into(),
                    value: "37-39".into(),
                },
                TagOp::InsertTag {
                    key: "addr:postcode".into(),
                    value: "48011".into(),
                },
                TagOp::InsertTag {
                    key: "addr:city".into(),
                    value: "Bilbao".into(),
                },
            ])
            .with("233784177", vec![
                TagOp::RemoveTag {
                    key: "N".into(),
                },
                TagOp::InsertTag {
                    key: "name".into(),
                    value: "Calle Real".into(),
                },
            ])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether `id` had an entry.
    pub fn apply(&self, id: &str, tags: &mut Vec<RawTag>) -> bool {
        match self.entries.get(id) {
            Some(ops) => {
                ops.iter().for_each(|op| op.apply(tags));
                true
            },
            None => false,
        }
    }
}

/// Fix for a known bad tag wherever it shows up, whatever the element.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TagCorrection {
    pub key: String,
    /// Matches any value when absent.
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub new_key: Option<String>,
    #[serde(default)]
    pub new_value: Option<String>,
}

impl TagCorrection {
    fn new(key: &str, value: Option<&str>, new_key: Option<&str>, new_value: Option<&str>) -> TagCorrection {
        TagCorrection {
            key: key.to_string(),
            value: value.map(str::to_string),
            new_key: new_key.map(str::to_string),
            new_value: new_value.map(str::to_string),
        }
    }

    pub fn matches(&self, tag: &RawTag) -> bool {
        tag.key == self.key && self.value.as_ref().map_or(true, |value| *value == tag.value)
    }

    pub fn builtin() -> Vec<TagCorrection> {
        vec![
            TagCorrection::new(
                "Torreón del castillo de los Salazar",
                None,
                Some("name"),
                Some("Torreón del castillo de los Salazar"),
            ),
            TagCorrection::new("addr:housenumber", Some("46, BIS"), None, Some("46 BIS")),
            TagCorrection::new("addr:housenumber", Some("8, 1º D"), None, Some("8")),
            TagCorrection::new("addr:postcode", Some("Larrabetzu"), None, Some("48195")),
            TagCorrection::new("addr:city", Some("villasana de Mena"), None, Some("Villasana de Mena")),
        ]
    }
}

/// Applies the first matching correction to each tag. Returns how many tags changed.
pub fn apply_corrections(corrections: &[TagCorrection], tags: &mut [RawTag]) -> usize {
    let mut changed = 0;
    for tag in tags.iter_mut() {
        if let Some(correction) = corrections.iter().find(|c| c.matches(tag)) {
            if let Some(new_key) = &correction.new_key {
                tag.key = new_key.clone();
            }
            if let Some(new_value) = &correction.new_value {
                tag.value = new_value.clone();
            }
            changed += 1;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Vec<RawTag> {
        pairs.iter().map(|(k, v)| RawTag::new(*k, *v)).collect()
    }

    #[test]
    fn builtin_override_expands_housename() {
        let table = OverrideTable::builtin();
        let mut element_tags = tags(&[("addr:housename", "Calle de Ercilla, 37-39, 48011 Bilbao, Vizcaya")]);

        assert!(table.apply("1247189817", &mut element_tags));

        let keys: Vec<&str> = element_tags.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["addr:housename", "addr:street", "addr:housenumber", "addr:postcode", "addr:city"]);
        assert_eq!(element_tags[0].value, "Ercilla 37-39");
    }

    #[test]
    fn builtin_override_replaces_spurious_tag() {
        let table = OverrideTable::builtin();
        let mut element_tags = tags(&[("highway", "residential"), ("N", "Calle Real")]);

        table.apply("233784177", &mut element_tags);

        assert_eq!(element_tags, tags(&[("highway", "residential"), ("name", "Calle Real")]));
    }

    #[test]
    fn unknown_id_is_noop() {
        let table = OverrideTable::builtin();
        let mut element_tags = tags(&[("N", "x")]);
        assert!(!table.apply("42", &mut element_tags));
        assert_eq!(element_tags, tags(&[("N", "x")]));
    }

    #[test]
    fn ops_apply_in_order() {
        let table = OverrideTable::new().with("7", vec![
            TagOp::RenameKey { from: "nme".into(), to: "name".into() },
            TagOp::SetValue { key: "name".into(), value: "Plaza Nueva".into() },
        ]);
        let mut element_tags = tags(&[("nme", "plaza nueva")]);
        table.apply("7", &mut element_tags);
        assert_eq!(element_tags, tags(&[("name", "Plaza Nueva")]));
    }

    #[test]
    fn override_table_from_json() {
        let json = r#"{
            "99": [
                {"op": "remove_tag", "key": "FIXME"},
                {"op": "insert_tag", "key": "note", "value": "checked"}
            ]
        }"#;
        let table: OverrideTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.len(), 1);

        let mut element_tags = tags(&[("FIXME", "check"), ("name", "x")]);
        table.apply("99", &mut element_tags);
        assert_eq!(element_tags, tags(&[("name", "x"), ("note", "checked")]));
    }

    #[test]
    fn corrections_match_key_and_value() {
        let corrections = TagCorrection::builtin();
        let mut element_tags = tags(&[
            ("addr:housenumber", "46, BIS"),
            ("addr:housenumber", "12"),
            ("Torreón del castillo de los Salazar", "yes"),
        ]);

        assert_eq!(apply_corrections(&corrections, &mut element_tags), 2);
        assert_eq!(element_tags, tags(&[
            ("addr:housenumber", "46 BIS"),
            ("addr:housenumber", "12"),
            ("name", "Torreón del castillo de los Salazar"),
        ]));
    }
}
