// Excel import (xlsx, xls, xlsb, ods: first worksheet only) and export
// (xlsx, one sheet per table)

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use rosterlink_recon::model::Table;
use rust_xlsxwriter::{Format, Workbook};
use tracing::debug;

use crate::error::IoError;

/// Read the first worksheet. Row 0 is the header row; every cell becomes
/// text, with integral floats written without a fractional part so that
/// numeric ids read back as "1001" rather than "1001.0".
pub fn read_first_sheet(path: &Path, name: &str) -> Result<Table, IoError> {
    let excel_err = |message: String| IoError::Excel {
        path: path.to_path_buf(),
        message,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| excel_err(e.to_string()))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| IoError::EmptyWorkbook {
            path: path.to_path_buf(),
        })?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| excel_err(format!("sheet '{sheet_name}': {e}")))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|r| r.iter().map(|c| cell_text(c).trim().to_string()).collect())
        .unwrap_or_default();
    let mut table = Table::new(name, headers);
    for row in rows {
        let cells: Vec<String> = row.iter().map(cell_text).collect();
        // Formatting-only rows below the data come through as all-empty.
        if cells.iter().any(|c| !c.is_empty()) {
            table.rows.push(cells);
        }
    }

    debug!(
        path = %path.display(),
        sheet = %sheet_name,
        rows = table.len(),
        "read worksheet"
    );
    Ok(table)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        Data::Float(n) => n.to_string(),
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Data::Error(e) => format!("#{e:?}"),
        Data::DateTime(dt) => dt.as_f64().to_string(),
    }
}

/// Write `tables` into one workbook, one worksheet per table named after it.
/// Every cell is written as a string so ids keep their leading zeros.
pub fn write_workbook(path: &Path, tables: &[Table]) -> Result<(), IoError> {
    let write_err = |message: String| IoError::Write {
        path: path.to_path_buf(),
        message,
    };

    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    for table in tables {
        let worksheet = workbook
            .add_worksheet()
            .set_name(&table.name)
            .map_err(|e| write_err(format!("sheet '{}': {e}", table.name)))?;

        for (col, header) in table.headers.iter().enumerate() {
            worksheet
                .write_string_with_format(0, col as u16, header, &header_format)
                .map_err(|e| write_err(e.to_string()))?;
        }
        for (row, cells) in table.rows.iter().enumerate() {
            for (col, value) in cells.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                worksheet
                    .write_string(row as u32 + 1, col as u16, value)
                    .map_err(|e| write_err(e.to_string()))?;
            }
        }
    }

    workbook.save(path).map_err(|e| write_err(e.to_string()))?;
    debug!(path = %path.display(), sheets = tables.len(), "wrote workbook");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn workbook_round_trips_every_sheet_name_and_first_sheet_cells() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bundle.xlsx");
        let buyers = Table::from_rows(
            "購入者",
            &["テスト番号", "ユーザー名"],
            &[&["001", "u1"], &["002", ""]],
        );
        let others = Table::from_rows("非購入者", &["テスト番号"], &[&["003"]]);
        write_workbook(&path, &[buyers.clone(), others]).unwrap();

        let back = read_first_sheet(&path, "buyers").unwrap();
        assert_eq!(back.headers, buyers.headers);
        assert_eq!(back.rows, vec![vec!["001", "u1"], vec!["002", ""]]);

        let workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(workbook.sheet_names(), ["購入者", "非購入者"]);
    }

    #[test]
    fn numeric_cells_read_as_integers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pool.xlsx");
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "ユーザー名").unwrap();
        sheet.write_string(0, 1, "番号").unwrap();
        sheet.write_string(1, 0, "u1").unwrap();
        sheet.write_number(1, 1, 1001.0).unwrap();
        sheet.write_number(2, 1, 2.5).unwrap();
        workbook.save(&path).unwrap();

        let table = read_first_sheet(&path, "pool").unwrap();
        assert_eq!(table.cell(0, 1), "1001");
        assert_eq!(table.cell(1, 1), "2.5");
    }

    #[test]
    fn duplicate_sheet_names_fail_to_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dup.xlsx");
        let t = Table::from_rows("same", &["a"], &[]);
        let err = write_workbook(&path, &[t.clone(), t]).unwrap_err();
        assert!(matches!(err, IoError::Write { .. }));
    }

    #[test]
    fn unreadable_workbook_is_an_excel_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a zip").unwrap();
        assert!(matches!(
            read_first_sheet(&path, "t"),
            Err(IoError::Excel { .. })
        ));
    }
}
