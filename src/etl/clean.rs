use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::data::osm::RawElement;
use crate::data::record::NormalizedRecord;
use crate::errors::{RecordError, Result};
use crate::etl::read_osm::OsmElementReader;
use crate::etl::Etl;
use crate::normalize::Normalizer;

pub const ETL_NAME: &str = "clean";
pub const OUTPUT_FILE_NAME: &str = "cleaned.jsonl";

/// Normalizes every element and writes one JSON object per line.
pub struct CleanEtl {
    data_path: PathBuf,
    normalizer: Normalizer,
}

impl CleanEtl {
    pub fn new(data_path: &Path, normalizer: Normalizer) -> CleanEtl {
        CleanEtl {
            data_path: data_path.to_path_buf(),
            normalizer,
        }
    }
}

impl Etl for CleanEtl {
    type Input = RawElement;
    type Output = NormalizedRecord;
    type Source = OsmElementReader<Box<dyn BufRead + Send>>;
    type Sink = BufWriter<File>;

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
        self.normalizer.normalize(input)
    }

    fn open_sink(&mut self, path: &Path) -> Result<Self::Sink> {
        Ok(BufWriter::new(File::create(path)?))
    }

    fn load(&mut self, sink: &mut Self::Sink, output: Self::Output) -> Result<()> {
        serde_json::to_writer(&mut *sink, &output)?;
        sink.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self, mut sink: Self::Sink) -> Result<()> {
        sink.flush()?;
        Ok(())
    }
}
