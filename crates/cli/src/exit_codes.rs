//! CLI Exit Code Registry
//!
//! This is the single source of truth for all `rlink` exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! | Code | Meaning                                                    |
//! |------|------------------------------------------------------------|
//! | 0    | Success                                                    |
//! | 1    | General error (unspecified)                                |
//! | 2    | Usage error (bad arguments, unknown preset or encoding)    |
//! | 3    | Configuration file unreadable or invalid                   |
//! | 4    | Input table is missing a required column                   |
//! | 5    | Input file unreadable or output file unwritable            |
//! | 6    | Run completed but at least one output bundle failed        |
//!
//! Credential shortfalls are not failures: the run exits 0 and the affected
//! rows carry the insufficiency marker.

use rosterlink_io::IoError;
use rosterlink_recon::LinkError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unknown preset, unknown encoding label.
pub const EXIT_USAGE: u8 = 2;

/// Config file could not be parsed or failed validation.
pub const EXIT_CONFIG_INVALID: u8 = 3;

/// A required column is missing from an input table. Nothing was written.
pub const EXIT_SCHEMA: u8 = 4;

/// Reading an input or writing an output failed.
pub const EXIT_IO: u8 = 5;

/// The pipeline finished but one or more bundles could not be written.
pub const EXIT_EXPORT_PARTIAL: u8 = 6;

pub fn link_exit_code(err: &LinkError) -> u8 {
    match err {
        LinkError::ConfigParse(_) | LinkError::ConfigValidation(_) => EXIT_CONFIG_INVALID,
        LinkError::Schema { .. } => EXIT_SCHEMA,
        LinkError::Sequence { .. } => EXIT_ERROR,
    }
}

pub fn io_exit_code(err: &IoError) -> u8 {
    match err {
        IoError::UnknownEncoding(_) | IoError::UnsupportedFormat { .. } => EXIT_USAGE,
        _ => EXIT_IO,
    }
}
