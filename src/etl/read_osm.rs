use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use xz::bufread::XzDecoder;

use crate::data::osm::{ElementKind, RawElement, RawTag};
use crate::errors::{Error, Result};

/// Streams `node` and `way` elements out of an OSM XML document, one at a time.
/// Relations and everything nested in them are read past.
pub struct OsmElementReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    current: Option<RawElement>,
    finished: bool,
}

fn get_attr_value(el: &BytesStart, key: &[u8]) -> Result<Option<String>> {
    for attribute_res in el.attributes() {
        let attribute = attribute_res?;
        if attribute.key.as_ref() == key {
            return Ok(Some(attribute.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn parse_element(kind: ElementKind, el: &BytesStart) -> Result<RawElement> {
    let mut element = RawElement::new(kind);
    for attribute_res in el.attributes() {
        let attribute = attribute_res?;
        let value = attribute.unescape_value()?.into_owned();
        if !element.set_attribute(attribute.key.as_ref(), value) {
            let name = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            debug!(key = name.as_str(); "Ignoring attribute");
        }
    }
    Ok(element)
}

/// Adds a `tag` or `nd` child to the element being read. Other children are ignored.
fn attach_child(current: &mut Option<RawElement>, el: &BytesStart) -> Result<()> {
    let Some(element) = current.as_mut() else {
        return Ok(());
    };
    match el.name().as_ref() {
        b"tag" => {
            let Some(key) = get_attr_value(el, b"k")? else {
                warn!(id = element.id_or_unknown(); "Dropping tag without a key");
                return Ok(());
            };
            let value = get_attr_value(el, b"v")?.unwrap_or_default();
            element.tags.push(RawTag { key, value });
        },
        b"nd" => {
            if let Some(reference) = get_attr_value(el, b"ref")? {
                element.node_refs.push(reference);
            }
        },
        _ => (),
    }
    Ok(())
}

impl OsmElementReader<Box<dyn BufRead + Send>> {
    /// Opens an `.osm` file, decompressing on the fly when it ends in `.xz`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)
            .map_err(|err| format!("Could not open {}: {}", path.display(), err))?;
        let file_reader = BufReader::new(file);
        let input: Box<dyn BufRead + Send> = if path.extension().map_or(false, |ext| ext == "xz") {
            Box::new(BufReader::new(XzDecoder::new(file_reader)))
        } else {
            Box::new(file_reader)
        };
        Ok(OsmElementReader::new(input))
    }
}

impl<R: BufRead> OsmElementReader<R> {
    pub fn new(input: R) -> Self {
        let mut reader = Reader::from_reader(input);
        reader.trim_text(true);

        OsmElementReader {
            reader,
            buf: Vec::new(),
            current: None,
            finished: false,
        }
    }

    fn read_element(&mut self) -> Result<Option<RawElement>> {
        loop {
            // if we don't keep a borrow elsewhere, we can clear the buffer to keep memory usage low
            self.buf.clear();
            let event = self.reader.read_event_into(&mut self.buf).map_err(|err| {
                Error::from(format!("XML error at byte {}: {}", self.reader.buffer_position(), err))
            })?;
            match event {
                Event::Eof => {
                    return match self.current.take() {
                        Some(element) => Err(format!(
                            "Document ended inside {} {}", element.kind.as_str(), element.id_or_unknown()
                        ).into()),
                        None => Ok(None),
                    };
                },
                Event::Start(e) => match ElementKind::from_tag_name(e.name().as_ref()) {
                    Some(kind) => {
                        if let Some(open) = self.current.take() {
                            warn!(id = open.id_or_unknown(); "Element never closed, dropping it");
                        }
                        self.current = Some(parse_element(kind, &e)?);
                    },
                    None => attach_child(&mut self.current, &e)?,
                },
                Event::Empty(e) => match ElementKind::from_tag_name(e.name().as_ref()) {
                    Some(kind) => return Ok(Some(parse_element(kind, &e)?)),
                    None => attach_child(&mut self.current, &e)?,
                },
                Event::End(e) => {
                    if ElementKind::from_tag_name(e.name().as_ref()).is_some() {
                        if let Some(element) = self.current.take() {
                            return Ok(Some(element));
                        }
                    }
                },
                // Declarations, comments, text and the like carry nothing we keep.
                _ => (),
            }
        }
    }
}

impl<R: BufRead> Iterator for OsmElementReader<R> {
    type Item = Result<RawElement>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_element() {
            Ok(Some(element)) => Some(Ok(element)),
            Ok(None) => {
                self.finished = true;
                None
            },
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const OSM_SAMPLE: &str = r#"<?xml version='1.0' encoding='UTF-8'?>
<osm version="0.6" generator="test">
  <!-- sample -->
  <node id="1" visible="true" lat="43.26" lon="-2.93" user="ane" uid="11" timestamp="2015-01-01T00:00:00Z" version="2" changeset="100"/>
  <node id="2" lat="43.0" lon="-3.1" user="jon" uid="12" timestamp="2015-01-02T00:00:00Z" version="1" changeset="101">
    <tag k="amenity" v="cafe"/>
    <tag k="addr:street" v="CALLE &amp; MAYOR"/>
  </node>
  <way id="3" user="ane" uid="11" timestamp="2015-01-03T00:00:00Z" version="4" changeset="102">
    <nd ref="1"/>
    <nd ref="2"/>
    <tag k="highway" v="residential"/>
  </way>
  <relation id="4" user="ane" uid="11" timestamp="2015-01-04T00:00:00Z" version="1" changeset="103">
    <member type="way" ref="3" role="outer"/>
    <tag k="type" v="multipolygon"/>
  </relation>
</osm>
"#;

    fn read_all(xml: &str) -> Vec<Result<RawElement>> {
        OsmElementReader::new(Cursor::new(xml.as_bytes())).collect()
    }

    #[test]
    fn reads_nodes_and_ways_in_order() {
        let elements: Vec<RawElement> = read_all(OSM_SAMPLE).into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(elements.len(), 3);

        let first = &elements[0];
        assert_eq!(first.kind, ElementKind::Point);
        assert_eq!(first.id.as_deref(), Some("1"));
        assert_eq!(first.visible.as_deref(), Some("true"));
        assert_eq!(first.lon.as_deref(), Some("-2.93"));
        assert!(first.tags.is_empty());

        let second = &elements[1];
        assert_eq!(second.visible, None);
        assert_eq!(second.tags, vec![
            RawTag::new("amenity", "cafe"),
            RawTag::new("addr:street", "CALLE & MAYOR"),
        ]);

        let way = &elements[2];
        assert_eq!(way.kind, ElementKind::Way);
        assert_eq!(way.node_refs, vec!["1".to_string(), "2".to_string()]);
        assert_eq!(way.tags, vec![RawTag::new("highway", "residential")]);
    }

    #[test]
    fn relation_tags_are_not_attached() {
        let elements: Vec<RawElement> = read_all(OSM_SAMPLE).into_iter().map(|e| e.unwrap()).collect();
        assert!(elements.iter().all(|e| e.tags.iter().all(|t| t.key != "type")));
    }

    #[test]
    fn tag_without_key_is_dropped() {
        let xml = r#"<osm><node id="1" lat="0" lon="0"><tag v="orphan"/><tag k="name" v="x"/></node></osm>"#;
        let elements: Vec<RawElement> = read_all(xml).into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(elements[0].tags, vec![RawTag::new("name", "x")]);
    }

    #[test]
    fn truncated_document_is_an_error() {
        let xml = r#"<osm><way id="9"><nd ref="1"/>"#;
        let results = read_all(xml);
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[test]
    fn stops_after_error() {
        let xml = r#"<osm><node id="1" lat="0" lon="0"/><node id="2" lat=0/></osm>"#;
        let mut reader = OsmElementReader::new(Cursor::new(xml.as_bytes()));
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }
}
