pub mod namespaces;
pub mod overrides;
pub mod street_types;

use std::{fs::File, io::BufReader, path::Path};

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::classify::namespace_depth;
use crate::data::osm::{ElementKind, RawElement, RawTag};
use crate::data::record::{Created, NormalizedRecord, RESERVED_FIELDS};
use crate::errors::{RecordError, Result};
use crate::UserConfig;

use self::namespaces::DEFAULT_SEGMENT;
use self::overrides::{apply_corrections, OverrideTable, TagCorrection};
use self::street_types::{StreetTypeEntry, StreetTypeTable};

pub const STREET_KEY: &str = "addr:street";

/// Static tables consulted while normalizing. Never mutated during a run.
#[derive(Debug, Clone, Default)]
pub struct NormalizerConfig {
    pub overrides: OverrideTable,
    pub corrections: Vec<TagCorrection>,
    pub street_types: StreetTypeTable,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)
        .map_err(|err| format!("Could not open {}: {}", path.display(), err))?;
    let value = serde_json::from_reader(BufReader::new(file))
        .map_err(|err| format!("Could not parse {}: {}", path.display(), err))?;
    Ok(value)
}

impl NormalizerConfig {
    pub fn builtin() -> Result<NormalizerConfig> {
        Ok(NormalizerConfig {
            overrides: OverrideTable::builtin(),
            corrections: TagCorrection::builtin(),
            street_types: StreetTypeTable::builtin()?,
        })
    }

    /// Built-in tables, each replaced by its file when the user config names one.
    pub fn load(config: &UserConfig) -> Result<NormalizerConfig> {
        let mut tables = NormalizerConfig::builtin()?;
        if let Some(path) = &config.overrides_path {
            tables.overrides = read_json(Path::new(path))?;
        }
        if let Some(path) = &config.corrections_path {
            tables.corrections = read_json(Path::new(path))?;
        }
        if let Some(path) = &config.street_types_path {
            let entries: Vec<StreetTypeEntry> = read_json(Path::new(path))?;
            tables.street_types = StreetTypeTable::from_entries(&entries)?;
        }
        info!(
            overrides = tables.overrides.len(),
            corrections = tables.corrections.len(),
            street_types = tables.street_types.len();
            "Loaded normalization tables"
        );
        Ok(tables)
    }
}

pub struct Normalizer {
    config: NormalizerConfig,
}

fn parse_coordinate(id: &str, name: &str, value: Option<&str>) -> std::result::Result<f64, RecordError> {
    let raw = value.ok_or_else(|| RecordError::MalformedGeometry {
        id: id.to_string(),
        reason: format!("missing {}", name),
    })?;
    match raw.trim().parse::<f64>() {
        Ok(coordinate) if coordinate.is_finite() => Ok(coordinate),
        _ => Err(RecordError::MalformedGeometry {
            id: id.to_string(),
            reason: format!("{} {:?} is not a number", name, raw),
        }),
    }
}

fn parse_node_refs(id: &str, refs: &[String]) -> std::result::Result<Vec<i64>, RecordError> {
    refs.iter()
        .map(|reference| reference.parse::<i64>().map_err(|_| RecordError::MalformedReference {
            id: id.to_string(),
            reference: reference.clone(),
        }))
        .collect()
}

/// Nested map under `segment`, created when missing. A scalar already sitting
/// there moves down to `default`.
fn child_map<'a>(fields: &'a mut Map<String, Value>, segment: &str) -> &'a mut Map<String, Value> {
    let slot = fields.entry(segment).or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        let scalar = std::mem::take(slot);
        let mut nested = Map::new();
        nested.insert(DEFAULT_SEGMENT.to_string(), scalar);
        *slot = Value::Object(nested);
    }
    match slot {
        Value::Object(nested) => nested,
        _ => unreachable!("slot holds an object"),
    }
}

fn place(fields: &mut Map<String, Value>, segments: &[&str], value: Value) {
    match segments {
        [] => (),
        [leaf] => {
            if let Some(Value::Object(nested)) = fields.get_mut(*leaf) {
                nested.insert(DEFAULT_SEGMENT.to_string(), value);
                return;
            }
            fields.insert(leaf.to_string(), value);
        },
        [parent, rest @ ..] => place(child_map(fields, parent), rest, value),
    }
}

/// Semicolon separated values of these keys are emitted as JSON arrays.
const LIST_KEYS: [&str; 1] = ["addr:postcode"];

fn tag_value(tag: &RawTag) -> Value {
    if LIST_KEYS.contains(&tag.key.as_str()) && tag.value.contains(';') {
        tag.value.split(';')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| Value::String(part.to_string()))
            .collect()
    } else {
        Value::String(tag.value.clone())
    }
}

fn place_tags(id: &str, tags: &[RawTag]) -> Map<String, Value> {
    let mut fields = Map::new();
    for tag in tags {
        if namespace_depth(&tag.key) > 2 {
            debug!(id = id, key = tag.key.as_str(); "Key nests too deep, keeping it flat");
            fields.insert(tag.key.clone(), tag_value(tag));
            continue;
        }

        let renamed;
        let mut segments: Vec<&str> = tag.key.split(':').collect();
        if RESERVED_FIELDS.contains(&segments[0]) {
            debug!(id = id, key = tag.key.as_str(); "Key shadows a record field, renaming");
            renamed = format!("{}_tag", segments[0]);
            segments[0] = &renamed;
        }
        place(&mut fields, &segments, tag_value(tag));
    }
    fields
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Normalizer {
        Normalizer {
            config
        }
    }

    fn normalize_street_types(&self, tags: &mut [RawTag]) {
        for tag in tags.iter_mut().filter(|tag| tag.key == STREET_KEY) {
            if let Some(value) = self.config.street_types.normalize(&tag.value) {
                tag.value = value;
            }
        }
    }

    /// Rewrites `tags` through overrides, corrections, street types and
    /// namespace disambiguation, in that order.
    pub fn clean_tags(&self, id: &str, tags: &mut Vec<RawTag>) {
        if self.config.overrides.apply(id, tags) {
            debug!(id = id; "Applied element overrides");
        }
        let corrected = apply_corrections(&self.config.corrections, tags);
        if corrected > 0 {
            debug!(id = id, corrected = corrected; "Applied tag corrections");
        }
        self.normalize_street_types(tags);
        namespaces::disambiguate(tags);
    }

    pub fn normalize(&self, element: RawElement) -> std::result::Result<NormalizedRecord, RecordError> {
        let RawElement {
            kind,
            id,
            visible,
            user,
            uid,
            timestamp,
            version,
            changeset,
            lon,
            lat,
            node_refs,
            mut tags,
        } = element;

        let id = id.ok_or(RecordError::MissingMandatoryAttribute {
            id: None,
            attribute: "id",
        })?;
        let required = |value: Option<String>, attribute: &'static str| {
            value.ok_or_else(|| RecordError::MissingMandatoryAttribute {
                id: Some(id.clone()),
                attribute,
            })
        };
        let created = Created {
            user: required(user, "user")?,
            uid: required(uid, "uid")?,
            timestamp: required(timestamp, "timestamp")?,
            version: required(version, "version")?,
            changeset: required(changeset, "changeset")?,
        };

        let (pos, node_refs) = match kind {
            ElementKind::Point => {
                let lon = parse_coordinate(&id, "lon", lon.as_deref())?;
                let lat = parse_coordinate(&id, "lat", lat.as_deref())?;
                (Some([lon, lat]), None)
            },
            ElementKind::Way => (None, Some(parse_node_refs(&id, &node_refs)?)),
        };

        self.clean_tags(&id, &mut tags);
        let fields = place_tags(&id, &tags);

        Ok(NormalizedRecord {
            id,
            kind,
            visible,
            created,
            pos,
            node_refs,
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::normalize::overrides::TagOp;

    fn element(kind: ElementKind, id: &str, tags: &[(&str, &str)]) -> RawElement {
        let mut element = RawElement::new(kind);
        element.id = Some(id.to_string());
        element.visible = Some("true".to_string());
        element.user = Some("mapper".to_string());
        element.uid = Some("1001".to_string());
        element.timestamp = Some("2012-03-04T10:11:12Z".to_string());
        element.version = Some("3".to_string());
        element.changeset = Some("987".to_string());
        element.tags = tags.iter().map(|(k, v)| RawTag::new(*k, *v)).collect();
        element
    }

    fn point(id: &str, tags: &[(&str, &str)]) -> RawElement {
        let mut element = element(ElementKind::Point, id, tags);
        element.lon = Some("-3.1".to_string());
        element.lat = Some("43.0".to_string());
        element
    }

    fn builtin() -> Normalizer {
        Normalizer::new(NormalizerConfig::builtin().unwrap())
    }

    trait FieldPath {
        fn field(&self, path: &[&str]) -> Option<&Value>;
    }

    impl FieldPath for NormalizedRecord {
        fn field(&self, path: &[&str]) -> Option<&Value> {
            let (first, rest) = path.split_first()?;
            let mut current = self.fields.get(*first)?;
            for segment in rest {
                current = current.as_object()?.get(*segment)?;
            }
            Some(current)
        }
    }

    fn to_json(record: &NormalizedRecord) -> Value {
        serde_json::to_value(record).unwrap()
    }

    #[test]
    fn point_base_fields_and_position() {
        let record = builtin().normalize(point("1", &[])).unwrap();
        assert_eq!(to_json(&record), json!({
            "id": "1",
            "type": "node",
            "visible": "true",
            "created": {
                "user": "mapper",
                "uid": "1001",
                "timestamp": "2012-03-04T10:11:12Z",
                "version": "3",
                "changeset": "987",
            },
            "pos": [-3.1, 43.0],
        }));
    }

    #[test]
    fn missing_visible_is_null() {
        let mut raw = point("1", &[]);
        raw.visible = None;
        let record = builtin().normalize(raw).unwrap();
        assert_eq!(to_json(&record)["visible"], Value::Null);
    }

    #[test]
    fn way_keeps_node_ref_order() {
        let mut raw = element(ElementKind::Way, "5", &[("highway", "residential")]);
        raw.node_refs = vec!["10".into(), "20".into(), "30".into()];
        let record = builtin().normalize(raw).unwrap();
        assert_eq!(record.node_refs, Some(vec![10, 20, 30]));
        assert_eq!(record.pos, None);
        assert_eq!(to_json(&record)["type"], "way");
    }

    #[test]
    fn bad_coordinates_are_malformed_geometry() {
        let mut raw = point("8", &[]);
        raw.lat = Some("north".to_string());
        assert!(matches!(builtin().normalize(raw), Err(RecordError::MalformedGeometry { .. })));

        let mut raw = point("8", &[]);
        raw.lon = None;
        assert!(matches!(builtin().normalize(raw), Err(RecordError::MalformedGeometry { .. })));
    }

    #[test]
    fn bad_reference_is_malformed_reference() {
        let mut raw = element(ElementKind::Way, "9", &[]);
        raw.node_refs = vec!["10".into(), "x20".into()];
        assert_eq!(
            builtin().normalize(raw).unwrap_err(),
            RecordError::MalformedReference { id: "9".into(), reference: "x20".into() },
        );
    }

    #[test]
    fn missing_provenance_is_an_error() {
        let mut raw = point("4", &[]);
        raw.uid = None;
        assert_eq!(
            builtin().normalize(raw).unwrap_err(),
            RecordError::MissingMandatoryAttribute { id: Some("4".into()), attribute: "uid" },
        );

        let mut raw = point("4", &[]);
        raw.id = None;
        assert_eq!(
            builtin().normalize(raw).unwrap_err(),
            RecordError::MissingMandatoryAttribute { id: None, attribute: "id" },
        );
    }

    #[test]
    fn nests_namespaced_keys() {
        let record = builtin().normalize(point("2", &[
            ("amenity", "cafe"),
            ("addr:city", "Bilbao"),
            ("name:es:old", "Bilbao viejo"),
            ("a:b:c:d", "deep"),
        ])).unwrap();
        let fields = Value::Object(record.fields.clone());
        assert_eq!(fields, json!({
            "amenity": "cafe",
            "addr": {"city": "Bilbao"},
            "name": {"es": {"old": "Bilbao viejo"}},
            "a:b:c:d": "deep",
        }));
    }

    #[test]
    fn collision_nests_under_default() {
        let record = builtin().normalize(point("3", &[("a", "x"), ("a:b", "y")])).unwrap();
        assert_eq!(record.fields.get("a"), Some(&json!({"default": "x", "b": "y"})));
    }

    #[test]
    fn shared_middle_segment_nests_under_default() {
        let record = builtin().normalize(point("3", &[("x:b", "1"), ("a:b:c", "2")])).unwrap();
        assert_eq!(record.field(&["x", "b", "default"]), Some(&json!("1")));
        assert_eq!(record.field(&["a", "b", "c"]), Some(&json!("2")));
    }

    #[test]
    fn repeated_key_last_write_wins() {
        let record = builtin().normalize(point("3", &[("name", "one"), ("name", "two")])).unwrap();
        assert_eq!(record.field(&["name"]), Some(&json!("two")));
    }

    #[test]
    fn reserved_names_do_not_overwrite_record_fields() {
        let record = builtin().normalize(point("3", &[("type", "multipolygon"), ("created:by", "JOSM")])).unwrap();
        let value = to_json(&record);
        assert_eq!(value["type"], "node");
        assert_eq!(value["type_tag"], "multipolygon");
        assert_eq!(value["created_tag"]["by"], "JOSM");
        assert_eq!(value["created"]["user"], "mapper");
    }

    #[test]
    fn per_id_override_rewrites_value() {
        let config = NormalizerConfig {
            overrides: OverrideTable::new().with("77", vec![TagOp::SetValue {
                key: "addr:housenumber".into(),
                value: "46 BIS".into(),
            }]),
            ..NormalizerConfig::default()
        };
        let record = Normalizer::new(config)
            .normalize(point("77", &[("addr:housenumber", "46, BIS")]))
            .unwrap();
        assert_eq!(record.field(&["addr", "housenumber"]), Some(&json!("46 BIS")));
    }

    #[test]
    fn builtin_override_runs_before_nesting() {
        let record = builtin().normalize(point("1247189817", &[
            ("addr:housename", "Calle de Ercilla, 37-39, 48011 Bilbao, Vizcaya"),
        ])).unwrap();
        assert_eq!(record.field(&["addr"]), Some(&json!({
            "housename": "Ercilla 37-39",
            "street": "Calle de Ercilla",
            "housenumber": "37-39",
            "postcode": "48011",
            "city": "Bilbao",
        })));
    }

    #[test]
    fn street_types_expand_in_output() {
        let record = builtin().normalize(point("6", &[("addr:street", "CALLE MAYOR")])).unwrap();
        assert_eq!(record.field(&["addr", "street"]), Some(&json!("Calle MAYOR")));
    }

    #[test]
    fn corrections_apply_to_any_element() {
        let record = builtin().normalize(point("6", &[("addr:postcode", "Larrabetzu")])).unwrap();
        assert_eq!(record.field(&["addr", "postcode"]), Some(&json!("48195")));
    }

    #[test]
    fn postcode_lists_become_arrays() {
        let record = builtin().normalize(point("6", &[
            ("addr:postcode", "48001;48002;48003"),
            ("ref", "A;B"),
        ])).unwrap();
        assert_eq!(record.field(&["addr", "postcode"]), Some(&json!(["48001", "48002", "48003"])));
        assert_eq!(record.field(&["ref"]), Some(&json!("A;B")));

        let record = builtin().normalize(point("6", &[("addr:postcode", "48011")])).unwrap();
        assert_eq!(record.field(&["addr", "postcode"]), Some(&json!("48011")));
    }

    #[test]
    fn unknown_id_passes_through() {
        let record = builtin().normalize(point("123456", &[("shop", "bakery")])).unwrap();
        assert_eq!(record.field(&["shop"]), Some(&json!("bakery")));
    }
}
