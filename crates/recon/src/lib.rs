//! `rosterlink-recon`: roster/order record linkage and credential allocation.
//!
//! Pure engine crate: receives pre-loaded tables, returns partitioned result
//! tables through a [`export::TableSink`]. No CLI or file I/O dependencies.

pub mod allocate;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod export;
pub mod join;
pub mod model;
pub mod normalize;
pub mod order;
pub mod pipeline;
pub mod pool;
pub mod roster;
pub mod stats;
pub mod summary;

pub use config::{Generation, LinkConfig};
pub use error::LinkError;
pub use export::{Bundle, ExportReport, MemorySink, TableSink};
pub use model::{Partition, PurchaseTier, Table};
pub use pipeline::{LinkagePipeline, PipelineInput, Stage};
pub use summary::{LinkReport, LinkSummary};
