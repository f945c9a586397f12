use std::path::{Path, PathBuf};

use rosterlink_recon::export::{Bundle, TableSink};

use crate::csv::write_csv;
use crate::error::IoError;
use crate::xlsx::write_workbook;

/// File layout for exported bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One `<file>.xlsx` workbook per bundle, one sheet per table.
    #[default]
    Xlsx,
    /// One `<file>_<sheet>.csv` per table.
    Csv,
}

/// Writes bundles into a directory, creating it on first write.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    format: OutputFormat,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
            written: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every file written so far, in order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl TableSink for DirectorySink {
    type Error = IoError;

    fn write_bundle(&mut self, bundle: &Bundle) -> Result<(), IoError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| IoError::Write {
            path: self.dir.clone(),
            message: e.to_string(),
        })?;

        match self.format {
            OutputFormat::Xlsx => {
                let path = self.dir.join(format!("{}.xlsx", bundle.file));
                write_workbook(&path, &bundle.tables)?;
                self.written.push(path);
            }
            OutputFormat::Csv => {
                for table in &bundle.tables {
                    let path = self.dir.join(format!("{}_{}.csv", bundle.file, table.name));
                    write_csv(&path, table)?;
                    self.written.push(path);
                }
            }
        }
        Ok(())
    }
}
