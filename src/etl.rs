pub mod audit;
pub mod clean;
pub mod read_osm;

use std::{fs, path::{Path, PathBuf}};
use log::{info, warn, error};

use crate::errors::{RecordError, Result};

/// Element counts for one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub read: u64,
    pub written: u64,
    pub skipped: u64,
}

/// Record-at-a-time extract / transform / load. The source is consumed one
/// element at a time and every output is handed to the sink as soon as it exists.
pub trait Etl {
    type Input;
    type Output;
    type Source: Iterator<Item = Result<Self::Input>> + Send;
    type Sink;

    fn etl_name(&self) -> &str;
    fn output_file_name(&self) -> &str;

    fn extract(&mut self) -> Result<Self::Source>;
    fn transform(&mut self, input: Self::Input) -> std::result::Result<Self::Output, RecordError>;
    fn open_sink(&mut self, path: &Path) -> Result<Self::Sink>;
    fn load(&mut self, sink: &mut Self::Sink, output: Self::Output) -> Result<()>;
    fn finish(&mut self, sink: Self::Sink) -> Result<()>;

    fn output_path(&self, dir: &Path) -> PathBuf {
        dir.join(self.output_file_name())
    }

    /// Removes output left over from an earlier run.
    fn clean(&self, dir: &Path) -> Result<()> {
        let path = self.output_path(dir);
        if path.try_exists()? {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Malformed elements are logged and skipped; anything else stops the run.
    fn run<I>(&mut self, items: I, sink: &mut Self::Sink) -> Result<RunSummary>
    where
        I: Iterator<Item = Result<Self::Input>>,
    {
        let mut summary = RunSummary::default();
        for item in items {
            let input = item?;
            summary.read += 1;
            match self.transform(input) {
                Ok(output) => {
                    self.load(sink, output)?;
                    summary.written += 1;
                },
                Err(err) => {
                    warn!(
                        etl_name = self.etl_name(),
                        kind = err.kind(),
                        id = err.element_id().unwrap_or(""),
                        err = err.to_string().as_str();
                        "Skipping malformed element"
                    );
                    summary.skipped += 1;
                },
            }
        }
        Ok(summary)
    }

    fn process(&mut self, dir: &Path, progress: bool) -> Result<RunSummary> {
        info!(etl_name = self.etl_name(); "Starting ETL process");
        self.clean(dir)?;

        info!(etl_name = self.etl_name(); "Extracting");
        let source = match self.extract() {
            Ok(source) => Ok(source),
            Err(err) => {
                error!(etl_name = self.etl_name(), err = err.message.as_str(); "Extraction failed with error");
                Err(err)
            },
        }?;

        let output_path = self.output_path(dir);
        let mut sink = self.open_sink(&output_path)?;

        info!(etl_name = self.etl_name(); "Transforming and loading");
        let result = if progress {
            self.run(tqdm::tqdm(source), &mut sink)
        } else {
            self.run(source, &mut sink)
        };
        let summary = match result {
            Ok(summary) => Ok(summary),
            Err(err) => {
                error!(etl_name = self.etl_name(), err = err.message.as_str(); "Transformation failed with error");
                Err(err)
            },
        }?;

        match self.finish(sink) {
            Ok(_) => Ok(()),
            Err(err) => {
                error!(etl_name = self.etl_name(), err = err.message.as_str(); "Loading failed with error");
                Err(err)
            },
        }?;

        info!(
            etl_name = self.etl_name(),
            read = summary.read,
            written = summary.written,
            skipped = summary.skipped;
            "Process finished"
        );
        Ok(summary)
    }
}
