use tracing::debug;

use crate::config::SplitRule;
use crate::error::LinkError;
use crate::model::{CredentialRecord, PurchaseTier, Table};

/// Pre-issued accounts for one tier, consumed front to back in file order.
///
/// A pool belongs to exactly one pipeline run. It is never shared or reset.
#[derive(Debug)]
pub struct CredentialPool {
    tier: PurchaseTier,
    headers: Vec<String>,
    records: Vec<CredentialRecord>,
    consumed: usize,
}

impl CredentialPool {
    pub fn from_table(tier: PurchaseTier, table: &Table) -> Self {
        let width = table.headers.len();
        let records = table
            .rows
            .iter()
            .map(|row| {
                let mut values = row.clone();
                values.resize(width, String::new());
                CredentialRecord { values }
            })
            .collect();
        Self {
            tier,
            headers: table.headers.clone(),
            records,
            consumed: 0,
        }
    }

    pub fn tier(&self) -> PurchaseTier {
        self.tier
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Records in the pool before any allocation.
    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Hand out the next `min(n, remaining)` records in file order. A short
    /// return is the caller's cue to mark the uncovered rows insufficient.
    pub fn take(&mut self, n: usize) -> Vec<CredentialRecord> {
        let end = (self.consumed + n).min(self.records.len());
        let taken = self.records[self.consumed..end].to_vec();
        debug!(
            tier = %self.tier,
            requested = n,
            granted = taken.len(),
            "credential pool take"
        );
        self.consumed = end;
        taken
    }

    /// Every record not yet taken, in original order.
    pub fn remaining(&self) -> &[CredentialRecord] {
        &self.records[self.consumed..]
    }

    /// Leftover inventory as a table with the pool's own headers.
    pub fn remaining_table(&self, name: &str) -> Table {
        Table {
            name: name.to_string(),
            headers: self.headers.clone(),
            rows: self.remaining().iter().map(|c| c.values.clone()).collect(),
        }
    }
}

/// Split a credential export that lists both tiers in one file. Rows whose
/// remark contains the high marker go to the first table, the low marker to
/// the second; anything else is dropped. Both keep `rule.columns` only.
pub fn split_combined(table: &Table, rule: &SplitRule) -> Result<(Table, Table), LinkError> {
    let remark = table.column(&rule.remark_column)?;
    let keep: Vec<usize> = rule
        .columns
        .iter()
        .map(|c| table.column(c))
        .collect::<Result<_, _>>()?;

    let mut high = Table::new(format!("{}_high", table.name), rule.columns.clone());
    let mut low = Table::new(format!("{}_low", table.name), rule.columns.clone());

    for (row_idx, row) in table.rows.iter().enumerate() {
        let target = {
            let text = table.cell(row_idx, remark);
            if text.contains(&rule.high_marker) {
                &mut high
            } else if text.contains(&rule.low_marker) {
                &mut low
            } else {
                continue;
            }
        };
        target.rows.push(
            keep.iter()
                .map(|&c| row.get(c).cloned().unwrap_or_default())
                .collect(),
        );
    }

    Ok((high, low))
}
