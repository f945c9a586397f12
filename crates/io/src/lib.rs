// File I/O for the linkage engine: the collaborators that turn files into
// `Table`s and result bundles back into files.

pub mod csv;
pub mod error;
pub mod sink;
pub mod xlsx;

use std::path::Path;

use rosterlink_recon::model::Table;

pub use error::IoError;
pub use sink::{DirectorySink, OutputFormat};

/// How to read a delimited input. Ignored for workbooks.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions<'a> {
    pub encoding: &'a str,
    /// Fixed header list for files without a header row.
    pub headers: Option<&'a [String]>,
}

impl Default for ReadOptions<'_> {
    fn default() -> Self {
        Self {
            encoding: "utf-8",
            headers: None,
        }
    }
}

/// Read any supported input by extension: delimited text or the first sheet
/// of a workbook.
pub fn read_table(path: &Path, name: &str, options: ReadOptions<'_>) -> Result<Table, IoError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "csv" | "tsv" | "txt" => csv::read_csv(path, name, options.encoding, options.headers),
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => xlsx::read_first_sheet(path, name),
        _ => Err(IoError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}
