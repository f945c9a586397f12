//! The linkage run as an explicit state machine.
//!
//! `Init → Filtered → Classified → Joined → Allocated → Partitioned → Exported`.
//! Each step consumes the previous step's output; calling one out of order
//! returns [`LinkError::Sequence`] and leaves the pipeline untouched.

use std::collections::HashSet;

use tracing::info;

use crate::allocate::allocate_tier;
use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::export::{
    buyers_table, linked_table, roster_table, students_table, write_bundles, Bundle,
    ExportReport, TableSink,
};
use crate::join::left_join;
use crate::model::{LinkStatus, LinkedRecord, MatchedBuyer, Partition, PurchaseTier, Student, Table};
use crate::order::OrderDataset;
use crate::pool::CredentialPool;
use crate::roster::RosterDataset;
use crate::summary::{compute_summary, LinkMeta, LinkSummary, PoolSummary, RunCounts};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Init,
    Filtered,
    Classified,
    Joined,
    Allocated,
    Partitioned,
    Exported,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Init => "init",
            Self::Filtered => "filtered",
            Self::Classified => "classified",
            Self::Joined => "joined",
            Self::Allocated => "allocated",
            Self::Partitioned => "partitioned",
            Self::Exported => "exported",
        };
        f.write_str(s)
    }
}

/// The four tables a run starts from.
#[derive(Debug, Clone)]
pub struct PipelineInput {
    pub orders: Table,
    pub roster: Table,
    pub high_pool: Table,
    pub low_pool: Table,
}

/// Allocation counters for one tier.
#[derive(Debug, Clone, Copy, Default)]
struct TierCounts {
    allocated: usize,
    shortfall: usize,
}

/// One linkage run. Owns its datasets and pools for the run's lifetime;
/// build a fresh pipeline per run.
#[derive(Debug)]
pub struct LinkagePipeline<'a> {
    config: &'a LinkConfig,
    stage: Stage,
    orders: OrderDataset,
    roster: RosterDataset,
    high_pool: CredentialPool,
    low_pool: CredentialPool,
    loaded_order_rows: usize,
    students: Vec<Student>,
    joined: Vec<LinkedRecord>,
    buyers: Vec<MatchedBuyer>,
    high_counts: TierCounts,
    low_counts: TierCounts,
    partition: Option<Partition>,
}

impl<'a> LinkagePipeline<'a> {
    /// Load and validate every input. Schema errors surface here, before any
    /// step runs or anything is written.
    pub fn new(config: &'a LinkConfig, input: &PipelineInput) -> Result<Self, LinkError> {
        input.orders.column(&config.join.order_key)?;
        input.roster.column(&config.join.roster_key)?;

        let orders = OrderDataset::load(&input.orders, &config.order)?;
        let roster = RosterDataset::load(&input.roster, &config.roster)?;
        let high_pool = CredentialPool::from_table(PurchaseTier::High, &input.high_pool);
        let low_pool = CredentialPool::from_table(PurchaseTier::Low, &input.low_pool);

        info!(
            config = %config.name,
            orders = orders.len(),
            roster = roster.len(),
            high_pool = high_pool.size(),
            low_pool = low_pool.size(),
            "inputs loaded"
        );

        Ok(Self {
            config,
            stage: Stage::Init,
            loaded_order_rows: orders.len(),
            orders,
            roster,
            high_pool,
            low_pool,
            students: Vec::new(),
            joined: Vec::new(),
            buyers: Vec::new(),
            high_counts: TierCounts::default(),
            low_counts: TierCounts::default(),
            partition: None,
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn config(&self) -> &LinkConfig {
        self.config
    }

    fn expect_stage(&self, expected: Stage) -> Result<(), LinkError> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(LinkError::Sequence {
                expected,
                actual: self.stage,
            })
        }
    }

    fn expect_at_least(&self, expected: Stage) -> Result<(), LinkError> {
        if self.stage >= expected {
            Ok(())
        } else {
            Err(LinkError::Sequence {
                expected,
                actual: self.stage,
            })
        }
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    /// Keep only first-year order rows.
    pub fn filter_eligible(&mut self) -> Result<(), LinkError> {
        self.expect_stage(Stage::Init)?;
        let predicate = self.config.order.eligibility.predicate();
        self.orders = self.orders.filter(predicate.as_ref());
        info!(
            kept = self.orders.len(),
            dropped = self.loaded_order_rows - self.orders.len(),
            "filtered order rows"
        );
        self.stage = Stage::Filtered;
        Ok(())
    }

    /// One student per id with the highest tier across their rows.
    pub fn classify(&mut self) -> Result<(), LinkError> {
        self.expect_stage(Stage::Filtered)?;
        self.students = self.orders.classify_purchase_tier(&self.config.tiers);
        info!(students = self.students.len(), "classified students");
        self.stage = Stage::Classified;
        Ok(())
    }

    /// Left join the roster to the classified students.
    pub fn join(&mut self) -> Result<(), LinkError> {
        self.expect_stage(Stage::Classified)?;
        self.joined = left_join(self.roster.records(), &self.students, &self.config.join);
        let manual = self
            .joined
            .iter()
            .filter(|r| r.status == LinkStatus::Manual)
            .count();
        info!(rows = self.joined.len(), manual, "joined roster to orders");
        self.stage = Stage::Joined;
        Ok(())
    }

    /// Pair HIGH rows with the HIGH pool and LOW rows with the LOW pool,
    /// one take per pool. HIGH buyers precede LOW buyers.
    pub fn allocate(&mut self) -> Result<(), LinkError> {
        self.expect_stage(Stage::Joined)?;
        let group = |tier: PurchaseTier| -> Vec<LinkedRecord> {
            self.joined
                .iter()
                .filter(|r| r.status == LinkStatus::Matched(tier))
                .cloned()
                .collect()
        };
        let high_group = group(PurchaseTier::High);
        let low_group = group(PurchaseTier::Low);

        let high = allocate_tier(high_group, PurchaseTier::High, &mut self.high_pool);
        let low = allocate_tier(low_group, PurchaseTier::Low, &mut self.low_pool);
        self.high_counts = TierCounts {
            allocated: high.allocated,
            shortfall: high.shortfall,
        };
        self.low_counts = TierCounts {
            allocated: low.allocated,
            shortfall: low.shortfall,
        };
        info!(
            high = high.allocated,
            high_short = high.shortfall,
            low = low.allocated,
            low_short = low.shortfall,
            "allocated credentials"
        );

        self.buyers = high.buyers;
        self.buyers.extend(low.buyers);
        self.stage = Stage::Allocated;
        Ok(())
    }

    /// Split the run into Buyers, NoBuyers, ManualRoster and ManualOrders.
    pub fn partition(&mut self) -> Result<(), LinkError> {
        self.expect_stage(Stage::Allocated)?;

        let no_buyers: Vec<LinkedRecord> = self
            .joined
            .iter()
            .filter(|r| r.status == LinkStatus::Matched(PurchaseTier::None))
            .cloned()
            .collect();
        let manual_roster = self
            .joined
            .iter()
            .filter(|r| r.status == LinkStatus::Manual)
            .map(|r| r.roster.clone())
            .collect();

        let consumed: HashSet<&str> = self
            .buyers
            .iter()
            .map(|b| &b.linked)
            .chain(&no_buyers)
            .filter_map(|r| r.student.as_ref())
            .map(|s| s.student_id.as_str())
            .collect();
        let manual_orders: Vec<Student> = self
            .students
            .iter()
            .filter(|s| !consumed.contains(s.student_id.as_str()))
            .cloned()
            .collect();

        let partition = Partition {
            buyers: std::mem::take(&mut self.buyers),
            no_buyers,
            manual_roster,
            manual_orders,
        };
        info!(
            buyers = partition.buyers.len(),
            no_buyers = partition.no_buyers.len(),
            manual_roster = partition.manual_roster.len(),
            manual_orders = partition.manual_orders.len(),
            "partitioned results"
        );
        self.partition = Some(partition);
        self.stage = Stage::Partitioned;
        Ok(())
    }

    /// Hand all three bundles to `sink`. A failing bundle does not stop the
    /// others; check [`ExportReport::is_complete`].
    pub fn export<S: TableSink>(&mut self, sink: &mut S) -> Result<ExportReport, LinkError> {
        self.expect_stage(Stage::Partitioned)?;
        let bundles = self.bundles()?;
        let report = write_bundles(sink, &bundles);
        self.stage = Stage::Exported;
        Ok(report)
    }

    /// Every step from the current stage through export.
    pub fn run<S: TableSink>(&mut self, sink: &mut S) -> Result<ExportReport, LinkError> {
        self.filter_eligible()?;
        self.classify()?;
        self.join()?;
        self.allocate()?;
        self.partition()?;
        self.export(sink)
    }

    // -----------------------------------------------------------------------
    // Results
    // -----------------------------------------------------------------------

    pub fn result(&self) -> Result<&Partition, LinkError> {
        self.expect_at_least(Stage::Partitioned)?;
        self.partition.as_ref().ok_or(LinkError::Sequence {
            expected: Stage::Partitioned,
            actual: self.stage,
        })
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn joined(&self) -> &[LinkedRecord] {
        &self.joined
    }

    pub fn high_pool(&self) -> &CredentialPool {
        &self.high_pool
    }

    pub fn low_pool(&self) -> &CredentialPool {
        &self.low_pool
    }

    /// The six output tables grouped as result, manual and remaining bundles.
    pub fn bundles(&self) -> Result<Vec<Bundle>, LinkError> {
        let partition = self.result()?;
        let config = self.config;
        let out = &config.output;

        let result = Bundle {
            file: out.result.file.clone(),
            tables: vec![
                buyers_table(
                    config,
                    &out.result.sheets[0],
                    &partition.buyers,
                    self.high_pool.headers(),
                    self.low_pool.headers(),
                ),
                linked_table(config, &out.result.sheets[1], &partition.no_buyers),
            ],
        };
        let manual = Bundle {
            file: out.manual.file.clone(),
            tables: vec![
                roster_table(config, &out.manual.sheets[0], &partition.manual_roster),
                students_table(config, &out.manual.sheets[1], &partition.manual_orders),
            ],
        };
        let remaining = Bundle {
            file: out.remaining.file.clone(),
            tables: vec![
                self.high_pool.remaining_table(&out.remaining.sheets[0]),
                self.low_pool.remaining_table(&out.remaining.sheets[1]),
            ],
        };
        Ok(vec![result, manual, remaining])
    }

    pub fn summary(&self) -> Result<LinkSummary, LinkError> {
        let partition = self.result()?;
        let counts = RunCounts {
            roster_rows: self.roster.len(),
            eligible_order_rows: self.orders.len(),
            students: self.students.len(),
            joined_rows: self.joined.len(),
            duplicate_roster_keys: self.roster.duplicate_exam_ids(),
        };
        let pool_summary = |pool: &CredentialPool, counts: TierCounts| PoolSummary {
            size: pool.size(),
            allocated: counts.allocated,
            shortfall: counts.shortfall,
            remaining: pool.remaining().len(),
        };
        Ok(compute_summary(
            counts,
            partition,
            pool_summary(&self.high_pool, self.high_counts),
            pool_summary(&self.low_pool, self.low_counts),
        ))
    }

    pub fn meta(&self) -> LinkMeta {
        LinkMeta::now(&self.config.name)
    }
}
