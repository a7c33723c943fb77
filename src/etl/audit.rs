use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;

use crate::classify::{KeyClassifier, KeyShape};
use crate::data::osm::{ElementKind, RawElement};
use crate::errors::{RecordError, Result};
use crate::etl::read_osm::OsmElementReader;
use crate::etl::Etl;
use crate::normalize::STREET_KEY;

pub const ETL_NAME: &str = "audit";
pub const OUTPUT_FILE_NAME: &str = "audit.json";

const ADDRESS_MARKER: &str = "addr";
const NUMERIC_ADDRESS_KEYS: [&str; 2] = ["addr:housenumber", "addr:postcode"];
const TEXT_ADDRESS_KEYS: [&str; 3] = ["addr:city", "addr:housename", "addr:street"];

/// How much of an address value is a number.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum NumberShape {
    /// Digits only.
    WholeNumber,
    /// Digits followed by letters or spaces, like `12 B`.
    HaveNumber,
    NoNumber,
}

/// Letter case of an address text value.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TextCase {
    AllCapital,
    AllSmall,
    /// Mixed case or non-ASCII text that does not start with a digit.
    UnicodeText,
    Other,
}

/// Counts per shape for one numeric address key, plus the values that are not whole numbers.
#[derive(Serialize, Debug, Default, PartialEq, Eq)]
pub struct NumericAudit {
    pub counts: BTreeMap<NumberShape, u64>,
    pub odd_values: BTreeMap<NumberShape, BTreeSet<String>>,
}

/// Patterns the audit sorts keys and values with.
pub struct AuditRules {
    classifier: KeyClassifier,
    kalea: Regex,
    whole_number: Regex,
    have_number: Regex,
    all_capital: Regex,
    all_small: Regex,
    leading_digits: Regex,
}

impl AuditRules {
    pub fn new() -> Result<AuditRules> {
        Ok(AuditRules {
            classifier: KeyClassifier::new()?,
            kalea: Regex::new(r"(k|K)alea$")?,
            whole_number: Regex::new(r"^[0-9]+$")?,
            have_number: Regex::new(r"^[0-9]+( |[A-Za-z])*$")?,
            all_capital: Regex::new(r"^([A-Z]| )+$")?,
            all_small: Regex::new(r"^([a-z]| )+$")?,
            leading_digits: Regex::new(r"^[0-9]+")?,
        })
    }

    /// First word of a street name, or the last one for Basque `... kalea` names.
    fn street_type<'a>(&self, value: &'a str) -> Option<&'a str> {
        if self.kalea.is_match(value) {
            value.split_whitespace().last()
        } else {
            value.split_whitespace().next()
        }
    }

    fn number_shape(&self, value: &str) -> NumberShape {
        if self.whole_number.is_match(value) {
            NumberShape::WholeNumber
        } else if self.have_number.is_match(value) {
            NumberShape::HaveNumber
        } else {
            NumberShape::NoNumber
        }
    }

    fn text_case(&self, value: &str) -> TextCase {
        if self.all_capital.is_match(value) {
            TextCase::AllCapital
        } else if self.all_small.is_match(value) {
            TextCase::AllSmall
        } else if !self.leading_digits.is_match(value) {
            TextCase::UnicodeText
        } else {
            TextCase::Other
        }
    }
}

/// Key and value statistics over a whole extract.
#[derive(Serialize, Debug, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub elements: BTreeMap<ElementKind, u64>,
    pub key_shapes: BTreeMap<ElementKind, BTreeMap<KeyShape, u64>>,
    pub tag_keys: BTreeMap<String, u64>,
    /// Keys classified as `problem_chars` or `other`.
    pub unusual_keys: BTreeMap<KeyShape, BTreeMap<String, u64>>,
    pub users: BTreeSet<String>,
    /// Bare keys that are also used as a namespace on the same element.
    pub namespace_collisions: BTreeMap<String, u64>,
    pub street_types: BTreeMap<String, u64>,
    /// Frequency of every key mentioning `addr`.
    pub address_keys: BTreeMap<String, u64>,
    pub numeric_address: BTreeMap<String, NumericAudit>,
    pub text_address: BTreeMap<String, BTreeMap<TextCase, BTreeSet<String>>>,
}

fn sum_to_map<K: Ord>(map: &mut BTreeMap<K, u64>, key: K) {
    *map.entry(key).or_insert(0) += 1;
}

impl AuditReport {
    pub fn record(&mut self, rules: &AuditRules, element: &RawElement) {
        sum_to_map(&mut self.elements, element.kind);
        if let Some(user) = &element.user {
            self.users.insert(user.clone());
        }

        let mut namespaces: HashSet<&str> = HashSet::new();
        let mut bare_keys: HashSet<&str> = HashSet::new();
        let shapes = self.key_shapes.entry(element.kind).or_default();

        for tag in &element.tags {
            let shape = rules.classifier.classify(&tag.key);
            sum_to_map(shapes, shape);
            match shape {
                KeyShape::Namespaced1 | KeyShape::Namespaced2 => {
                    if let Some(prefix) = tag.key.split(':').next() {
                        namespaces.insert(prefix);
                    }
                },
                KeyShape::ProblemChars | KeyShape::Other => {
                    sum_to_map(self.unusual_keys.entry(shape).or_default(), tag.key.clone());
                    bare_keys.insert(&tag.key);
                },
                KeyShape::Plain => {
                    bare_keys.insert(&tag.key);
                },
            }

            sum_to_map(&mut self.tag_keys, tag.key.clone());

            if tag.key == STREET_KEY {
                if let Some(street_type) = rules.street_type(&tag.value) {
                    sum_to_map(&mut self.street_types, street_type.to_string());
                }
            }

            if tag.key.contains(ADDRESS_MARKER) {
                sum_to_map(&mut self.address_keys, tag.key.clone());
            }

            if NUMERIC_ADDRESS_KEYS.contains(&tag.key.as_str()) {
                let number_shape = rules.number_shape(&tag.value);
                let audit = self.numeric_address.entry(tag.key.clone()).or_default();
                sum_to_map(&mut audit.counts, number_shape);
                if number_shape != NumberShape::WholeNumber {
                    audit.odd_values.entry(number_shape).or_default().insert(tag.value.clone());
                }
            }

            if TEXT_ADDRESS_KEYS.contains(&tag.key.as_str()) {
                self.text_address.entry(tag.key.clone()).or_default()
                    .entry(rules.text_case(&tag.value)).or_default()
                    .insert(tag.value.clone());
            }
        }

        for key in namespaces.intersection(&bare_keys) {
            sum_to_map(&mut self.namespace_collisions, key.to_string());
        }
    }
}

pub struct AuditSink {
    path: PathBuf,
    report: AuditReport,
}

/// Tallies key shapes and frequencies, editors, namespace collisions, street
/// types and the shape of address values.
pub struct AuditEtl {
    data_path: PathBuf,
    rules: AuditRules,
}

impl AuditEtl {
    pub fn new(data_path: &Path) -> Result<AuditEtl> {
        Ok(AuditEtl {
            data_path: data_path.to_path_buf(),
            rules: AuditRules::new()?,
        })
    }
}

impl Etl for AuditEtl {
    type Input = RawElement;
    type Output = RawElement;
    type Source = OsmElementReader<Box<dyn BufRead + Send>>;
    type Sink = AuditSink;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn output_file_name(&self) -> &str {
        OUTPUT_FILE_NAME
    }

    fn extract(&mut self) -> Result<Self::Source> {
        OsmElementReader::open(&self.data_path)
    }

    fn transform(&mut self, input: Self::Input) -> std::result::Result<Self::Output, RecordError> {
        Ok(input)
    }

    fn open_sink(&mut self, path: &Path) -> Result<Self::Sink> {
        Ok(AuditSink {
            path: path.to_path_buf(),
            report: AuditReport::default(),
        })
    }

    fn load(&mut self, sink: &mut Self::Sink, output: Self::Output) -> Result<()> {
        sink.report.record(&self.rules, &output);
        Ok(())
    }

    fn finish(&mut self, sink: Self::Sink) -> Result<()> {
        let mut writer = BufWriter::new(File::create(&sink.path)?);
        serde_json::to_writer_pretty(&mut writer, &sink.report)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}
