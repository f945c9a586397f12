// Delimited-text import/export with an explicit character encoding

use std::path::Path;

use encoding_rs::Encoding;
use rosterlink_recon::model::Table;
use tracing::{debug, warn};

use crate::error::IoError;

/// Read a delimited file into a [`Table`].
///
/// `encoding` is a WHATWG label ("utf-8", "shift_jis", ...). A byte-order
/// mark overrides it. With `headers` set the file has no header row and
/// every record is data; otherwise the first record names the columns.
pub fn read_csv(
    path: &Path,
    name: &str,
    encoding: &str,
    headers: Option<&[String]>,
) -> Result<Table, IoError> {
    let bytes = read_bytes(path)?;
    let content = decode(&bytes, encoding)?;
    let delimiter = sniff_delimiter(&content);
    let table = parse_table(name, &content, delimiter, headers).map_err(|source| IoError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        path = %path.display(),
        rows = table.len(),
        columns = table.headers.len(),
        delimiter = %(delimiter as char).escape_default(),
        "read delimited table"
    );
    Ok(table)
}

pub(crate) fn read_bytes(path: &Path) -> Result<Vec<u8>, IoError> {
    std::fs::read(path).map_err(|source| IoError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Decode `bytes` with the encoding named by `label`. Malformed sequences
/// become U+FFFD and are reported once at `warn`.
pub fn decode(bytes: &[u8], label: &str) -> Result<String, IoError> {
    let encoding = Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| IoError::UnknownEncoding(label.to_string()))?;
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        warn!(
            encoding = used.name(),
            "input contains byte sequences invalid for its encoding"
        );
    }
    Ok(text.into_owned())
}

/// Pick the delimiter that splits the first lines into the most consistent
/// number of fields. Falls back to comma.
pub fn sniff_delimiter(content: &str) -> u8 {
    let sample: Vec<&str> = content.lines().take(10).collect();
    let mut best = (b',', 0usize);

    for delim in [b'\t', b';', b',', b'|'] {
        let widths: Vec<usize> = sample
            .iter()
            .map(|line| field_count(line, delim))
            .collect();
        let Some(&first) = widths.first() else {
            break;
        };
        if first < 2 {
            continue;
        }
        // Wider rows win ties between equally consistent candidates.
        let score = widths.iter().filter(|&&w| w == first).count() * first;
        if score > best.1 {
            best = (delim, score);
        }
    }

    best.0
}

fn field_count(line: &str, delimiter: u8) -> usize {
    ::csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(Result::ok)
        .map_or(1, |r| r.len())
}

fn parse_table(
    name: &str,
    content: &str,
    delimiter: u8,
    headers: Option<&[String]>,
) -> Result<Table, ::csv::Error> {
    let mut reader = ::csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let header_row = match headers {
        Some(fixed) => fixed.to_vec(),
        None => match records.next() {
            Some(first) => first?.iter().map(|h| h.trim().to_string()).collect(),
            None => Vec::new(),
        },
    };

    let mut table = Table::new(name, header_row);
    for record in records {
        let record = record?;
        table.rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(table)
}

/// Write a table as UTF-8 CSV with a header row.
pub fn write_csv(path: &Path, table: &Table) -> Result<(), IoError> {
    let write_err = |e: ::csv::Error| IoError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let mut writer = ::csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(write_err)?;
    writer.write_record(&table.headers).map_err(write_err)?;
    for row in &table.rows {
        writer.write_record(row).map_err(write_err)?;
    }
    writer.flush().map_err(|e| IoError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Outcome of [`transcode_to_utf8`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transcode {
    /// The input already decodes as UTF-8; nothing was written.
    AlreadyUtf8,
    Converted { bytes: usize },
}

/// Re-encode a text file as UTF-8. Files that are already valid UTF-8 are
/// left alone.
pub fn transcode_to_utf8(input: &Path, output: &Path, encoding: &str) -> Result<Transcode, IoError> {
    let bytes = read_bytes(input)?;
    if std::str::from_utf8(&bytes).is_ok() {
        return Ok(Transcode::AlreadyUtf8);
    }
    let text = decode(&bytes, encoding)?;
    std::fs::write(output, text.as_bytes()).map_err(|e| IoError::Write {
        path: output.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(Transcode::Converted { bytes: text.len() })
}
