use serde::Serialize;

use crate::export::ExportReport;
use crate::model::{Partition, PurchaseTier};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolSummary {
    pub size: usize,
    pub allocated: usize,
    pub shortfall: usize,
    pub remaining: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkSummary {
    pub roster_rows: usize,
    pub eligible_order_rows: usize,
    pub students: usize,
    pub joined_rows: usize,
    pub buyers_high: usize,
    pub buyers_low: usize,
    pub no_buyers: usize,
    pub manual_roster: usize,
    pub manual_orders: usize,
    pub duplicate_roster_keys: usize,
    pub high_pool: PoolSummary,
    pub low_pool: PoolSummary,
    /// Every roster row landed in exactly one of Buyers / NoBuyers /
    /// ManualRoster. False only when the join fanned out.
    pub conserved: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}

impl LinkMeta {
    pub fn now(config_name: &str) -> Self {
        Self {
            config_name: config_name.to_string(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Everything `rlink run --json` prints.
#[derive(Debug, Clone, Serialize)]
pub struct LinkReport {
    pub meta: LinkMeta,
    pub summary: LinkSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportReport>,
}

/// Counts the pipeline cannot derive from the partition alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunCounts {
    pub roster_rows: usize,
    pub eligible_order_rows: usize,
    pub students: usize,
    pub joined_rows: usize,
    pub duplicate_roster_keys: usize,
}

/// Compute summary statistics from a partitioned run.
pub fn compute_summary(
    counts: RunCounts,
    partition: &Partition,
    high_pool: PoolSummary,
    low_pool: PoolSummary,
) -> LinkSummary {
    let buyers_high = partition
        .buyers
        .iter()
        .filter(|b| b.tier == PurchaseTier::High)
        .count();
    let buyers_low = partition.buyers.len() - buyers_high;
    let bucketed = partition.buyers.len() + partition.no_buyers.len() + partition.manual_roster.len();

    LinkSummary {
        roster_rows: counts.roster_rows,
        eligible_order_rows: counts.eligible_order_rows,
        students: counts.students,
        joined_rows: counts.joined_rows,
        buyers_high,
        buyers_low,
        no_buyers: partition.no_buyers.len(),
        manual_roster: partition.manual_roster.len(),
        manual_orders: partition.manual_orders.len(),
        duplicate_roster_keys: counts.duplicate_roster_keys,
        high_pool,
        low_pool,
        conserved: bucketed == counts.roster_rows,
    }
}

impl std::fmt::Display for LinkSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "roster: {} rows; orders: {} eligible rows, {} students",
            self.roster_rows, self.eligible_order_rows, self.students
        )?;
        writeln!(
            f,
            "buyers: {} high, {} low; no purchase: {}; manual: {} roster, {} orders",
            self.buyers_high, self.buyers_low, self.no_buyers, self.manual_roster, self.manual_orders
        )?;
        for (label, pool) in [("high", &self.high_pool), ("low", &self.low_pool)] {
            writeln!(
                f,
                "{label} pool: {} accounts, {} allocated, {} short, {} left",
                pool.size, pool.allocated, pool.shortfall, pool.remaining
            )?;
        }
        if self.duplicate_roster_keys > 0 {
            writeln!(
                f,
                "warning: {} repeated roster key(s); joined rows may fan out",
                self.duplicate_roster_keys
            )?;
        }
        if !self.conserved {
            writeln!(
                f,
                "warning: {} joined rows for {} roster rows",
                self.joined_rows, self.roster_rows
            )?;
        }
        Ok(())
    }
}
