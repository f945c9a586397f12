//! Result tables and the hand-off to whatever persists them.
//!
//! The engine never touches the file system. It renders its result sets as
//! [`Table`]s grouped into [`Bundle`]s and passes each bundle to a
//! [`TableSink`]. A failing bundle is recorded and the remaining bundles are
//! still attempted.

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{LinkConfig, TierConfig};
use crate::model::{
    LinkStatus, LinkedRecord, MatchedBuyer, PurchaseTier, RosterRecord, Student, Table,
};

/// One output file: a name and its sheets, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub file: String,
    pub tables: Vec<Table>,
}

/// Persists bundles. Implemented by the I/O layer.
pub trait TableSink {
    type Error: std::fmt::Display;

    fn write_bundle(&mut self, bundle: &Bundle) -> Result<(), Self::Error>;
}

/// Keeps bundles in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub bundles: Vec<Bundle>,
}

impl TableSink for MemorySink {
    type Error = std::convert::Infallible;

    fn write_bundle(&mut self, bundle: &Bundle) -> Result<(), Self::Error> {
        self.bundles.push(bundle.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BundleFailure {
    pub file: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportReport {
    pub written: Vec<String>,
    pub failed: Vec<BundleFailure>,
}

impl ExportReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Hand every bundle to the sink, continuing past failures.
pub fn write_bundles<S: TableSink>(sink: &mut S, bundles: &[Bundle]) -> ExportReport {
    let mut report = ExportReport::default();
    for bundle in bundles {
        match sink.write_bundle(bundle) {
            Ok(()) => {
                info!(file = %bundle.file, sheets = bundle.tables.len(), "bundle written");
                report.written.push(bundle.file.clone());
            }
            Err(e) => {
                warn!(file = %bundle.file, error = %e, "bundle failed");
                report.failed.push(BundleFailure {
                    file: bundle.file.clone(),
                    message: e.to_string(),
                });
            }
        }
    }
    report
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Label written to the tier column for a join outcome.
pub fn tier_label(tiers: &TierConfig, status: LinkStatus) -> &str {
    match status {
        LinkStatus::Matched(PurchaseTier::High) => &tiers.high.label,
        LinkStatus::Matched(PurchaseTier::Low) => &tiers.low.label,
        LinkStatus::Matched(PurchaseTier::None) => &tiers.none_label,
        LinkStatus::Manual => &tiers.manual_label,
    }
}

/// Roster columns, then order columns, then the tier column.
pub fn joined_headers(config: &LinkConfig) -> Vec<String> {
    config
        .roster
        .columns
        .iter()
        .chain(&config.order.columns)
        .chain(std::iter::once(&config.tiers.column))
        .cloned()
        .collect()
}

pub fn joined_row(config: &LinkConfig, linked: &LinkedRecord) -> Vec<String> {
    let mut row = roster_row(config, &linked.roster);
    row.extend(config.order.columns.iter().map(|c| {
        linked
            .student
            .as_ref()
            .map(|s| s.order.field(c).to_string())
            .unwrap_or_default()
    }));
    row.push(tier_label(&config.tiers, linked.status).to_string());
    row
}

fn roster_row(config: &LinkConfig, roster: &RosterRecord) -> Vec<String> {
    config
        .roster
        .columns
        .iter()
        .map(|c| roster.field(c).to_string())
        .collect()
}

/// HIGH pool headers, then LOW headers not already present.
pub fn credential_headers(high: &[String], low: &[String]) -> Vec<String> {
    let mut headers = high.to_vec();
    for h in low {
        if !headers.contains(h) {
            headers.push(h.clone());
        }
    }
    headers
}

/// Joined columns followed by credential columns. A buyer without a
/// credential carries the insufficiency marker in every credential column.
pub fn buyers_table(
    config: &LinkConfig,
    name: &str,
    buyers: &[MatchedBuyer],
    high_headers: &[String],
    low_headers: &[String],
) -> Table {
    let cred_headers = credential_headers(high_headers, low_headers);
    let mut headers = joined_headers(config);
    headers.extend(cred_headers.iter().cloned());

    let mut table = Table::new(name, headers);
    for buyer in buyers {
        let mut row = joined_row(config, &buyer.linked);
        let pool_headers = match buyer.tier {
            PurchaseTier::Low => low_headers,
            _ => high_headers,
        };
        match buyer.allocation.credential() {
            Some(cred) => row.extend(cred_headers.iter().map(|h| {
                pool_headers
                    .iter()
                    .position(|p| p == h)
                    .and_then(|i| cred.values.get(i))
                    .cloned()
                    .unwrap_or_default()
            })),
            None => row.extend(
                std::iter::repeat(config.output.insufficient_marker.clone())
                    .take(cred_headers.len()),
            ),
        }
        table.rows.push(row);
    }
    table
}

pub fn linked_table(config: &LinkConfig, name: &str, rows: &[LinkedRecord]) -> Table {
    let mut table = Table::new(name, joined_headers(config));
    table.rows = rows.iter().map(|r| joined_row(config, r)).collect();
    table
}

pub fn roster_table(config: &LinkConfig, name: &str, rows: &[RosterRecord]) -> Table {
    let mut table = Table::new(name, config.roster.columns.clone());
    table.rows = rows.iter().map(|r| roster_row(config, r)).collect();
    table
}

/// Order columns followed by the tier column.
pub fn students_table(config: &LinkConfig, name: &str, students: &[Student]) -> Table {
    let mut headers = config.order.columns.clone();
    headers.push(config.tiers.column.clone());
    let mut table = Table::new(name, headers);
    table.rows = students
        .iter()
        .map(|s| {
            let mut row: Vec<String> = config
                .order
                .columns
                .iter()
                .map(|c| s.order.field(c).to_string())
                .collect();
            row.push(tier_label(&config.tiers, LinkStatus::Matched(s.tier)).to_string());
            row
        })
        .collect();
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailOn(&'static str);

    impl TableSink for FailOn {
        type Error = String;

        fn write_bundle(&mut self, bundle: &Bundle) -> Result<(), String> {
            if bundle.file == self.0 {
                Err("disk full".into())
            } else {
                Ok(())
            }
        }
    }

    fn bundle(file: &str) -> Bundle {
        Bundle {
            file: file.into(),
            tables: Vec::new(),
        }
    }

    #[test]
    fn failure_does_not_stop_other_bundles() {
        let mut sink = FailOn("b");
        let report = write_bundles(&mut sink, &[bundle("a"), bundle("b"), bundle("c")]);
        assert_eq!(report.written, ["a", "c"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].file, "b");
        assert_eq!(report.failed[0].message, "disk full");
        assert!(!report.is_complete());
    }

    #[test]
    fn memory_sink_keeps_bundles() {
        let mut sink = MemorySink::default();
        let report = write_bundles(&mut sink, &[bundle("a")]);
        assert!(report.is_complete());
        assert_eq!(sink.bundles.len(), 1);
    }

    #[test]
    fn credential_header_union_keeps_high_order() {
        let high = vec!["user".to_string(), "pw".to_string()];
        let low = vec!["pw".to_string(), "group".to_string()];
        assert_eq!(credential_headers(&high, &low), ["user", "pw", "group"]);
    }

    #[test]
    fn tier_labels() {
        let tiers = TierConfig::default();
        assert_eq!(tier_label(&tiers, LinkStatus::Matched(PurchaseTier::High)), "6辞書");
        assert_eq!(tier_label(&tiers, LinkStatus::Matched(PurchaseTier::Low)), "3辞書");
        assert_eq!(tier_label(&tiers, LinkStatus::Matched(PurchaseTier::None)), "購入しない");
        assert_eq!(tier_label(&tiers, LinkStatus::Manual), "（手動で作成）");
    }
}
