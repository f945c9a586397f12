use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::RosterSchema;
use crate::error::LinkError;
use crate::model::{RosterRecord, Table};
use crate::normalize::clean_whitespace;

/// School test-roster rows, one per enrolled student.
#[derive(Debug, Clone)]
pub struct RosterDataset {
    headers: Vec<String>,
    records: Vec<RosterRecord>,
}

impl RosterDataset {
    /// Parse a roster table. The exam id is kept as text (leading zeros
    /// survive) and the name column is whitespace-cleaned in place.
    pub fn load(table: &Table, schema: &RosterSchema) -> Result<Self, LinkError> {
        let id_col = table.column(&schema.exam_id)?;
        let name_col = table.column(&schema.student_name)?;
        for column in &schema.columns {
            table.column(column)?;
        }

        let records: Vec<RosterRecord> = (0..table.len())
            .map(|row| {
                let mut fields = table.row_fields(row);
                let exam_id = table.cell(row, id_col).trim().to_string();
                let student_name = clean_whitespace(table.cell(row, name_col));
                fields.insert(schema.exam_id.clone(), exam_id.clone());
                fields.insert(schema.student_name.clone(), student_name.clone());
                RosterRecord {
                    exam_id,
                    student_name,
                    fields,
                }
            })
            .collect();

        let dataset = Self {
            headers: table.headers.clone(),
            records,
        };
        let duplicates = dataset.duplicate_exam_ids();
        if duplicates > 0 {
            // Left as-is: the join fans out on these rows.
            warn!(duplicates, "roster has repeated exam ids");
        }
        debug!(rows = dataset.len(), "loaded roster table");
        Ok(dataset)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[RosterRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of rows whose non-empty exam id already appeared earlier.
    pub fn duplicate_exam_ids(&self) -> usize {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for record in self.records.iter().filter(|r| !r.exam_id.is_empty()) {
            *counts.entry(record.exam_id.as_str()).or_insert(0) += 1;
        }
        counts.values().map(|c| c - 1).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Generation;

    fn schema() -> RosterSchema {
        Generation::TextbookTitle.config().roster
    }

    fn roster(rows: &[&[&str]]) -> Table {
        Table::from_rows(
            "roster",
            &["テスト番号", "合格学科", "クラス２", "出席番号", "氏\u{3000}名"],
            rows,
        )
    }

    #[test]
    fn load_keeps_leading_zeros_and_cleans_name() {
        let table = roster(&[&["001", "普通科", "A", "1", " 田中\u{3000}太郎 "]]);
        let ds = RosterDataset::load(&table, &schema()).unwrap();
        let r = &ds.records()[0];
        assert_eq!(r.exam_id, "001");
        assert_eq!(r.student_name, "田中太郎");
        assert_eq!(r.field("氏\u{3000}名"), "田中太郎");
        assert_eq!(r.field("合格学科"), "普通科");
    }

    #[test]
    fn missing_projection_column_is_schema_error() {
        let table = Table::from_rows("roster", &["テスト番号", "氏\u{3000}名"], &[&["1", "a"]]);
        let err = RosterDataset::load(&table, &schema()).unwrap_err();
        assert!(err.to_string().contains("合格学科"));
    }

    #[test]
    fn counts_duplicate_exam_ids() {
        let table = roster(&[
            &["001", "", "", "", "a"],
            &["001", "", "", "", "b"],
            &["001", "", "", "", "c"],
            &["002", "", "", "", "d"],
            &["", "", "", "", "e"],
            &["", "", "", "", "f"],
        ]);
        let ds = RosterDataset::load(&table, &schema()).unwrap();
        assert_eq!(ds.duplicate_exam_ids(), 2);
    }
}
