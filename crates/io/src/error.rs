use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: ::csv::Error,
    },
    #[error("{}: {message}", path.display())]
    Excel { path: PathBuf, message: String },
    #[error("cannot write {}: {message}", path.display())]
    Write { path: PathBuf, message: String },
    #[error("unknown encoding label '{0}'")]
    UnknownEncoding(String),
    #[error("{}: workbook has no sheets", path.display())]
    EmptyWorkbook { path: PathBuf },
    #[error("{}: unsupported file type (expected .csv, .tsv, .txt, .xlsx, .xls, .xlsb or .ods)", path.display())]
    UnsupportedFormat { path: PathBuf },
}

impl IoError {
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Open { path, .. }
            | Self::Csv { path, .. }
            | Self::Excel { path, .. }
            | Self::Write { path, .. }
            | Self::EmptyWorkbook { path }
            | Self::UnsupportedFormat { path } => Some(path),
            Self::UnknownEncoding(_) => None,
        }
    }
}
