use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::LinkError;

// ---------------------------------------------------------------------------
// Tables (the only boundary type)
// ---------------------------------------------------------------------------

/// A named grid of text cells with a header row. Every input the engine
/// receives and every result it hands back is a `Table`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Build a table from string literals. Mostly for tests and fixtures.
    pub fn from_rows(name: &str, headers: &[&str], rows: &[&[&str]]) -> Self {
        Self {
            name: name.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a header, or `LinkError::Schema` naming this table.
    pub fn column(&self, name: &str) -> Result<usize, LinkError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| LinkError::schema(&self.name, name))
    }

    /// Cell at (row, col); short rows read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Header → cell map for one row.
    pub(crate) fn row_fields(&self, row: usize) -> BTreeMap<String, String> {
        self.headers
            .iter()
            .enumerate()
            .map(|(col, h)| (h.clone(), self.cell(row, col).to_string()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Purchase tiers
// ---------------------------------------------------------------------------

/// Dictionary-product purchase category. Declaration order is precedence:
/// `High` beats `Low` beats `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseTier {
    High,
    Low,
    None,
}

impl std::fmt::Display for PurchaseTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Low => write!(f, "low"),
            Self::None => write!(f, "none"),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One order line item, after name normalization and id repair.
///
/// `fields` holds every column of the source row keyed by header; the typed
/// fields mirror the mapped columns and are kept in sync with `fields`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub record_id: String,
    pub student_id: String,
    pub student_name: String,
    pub email: String,
    pub school_year: String,
    pub product_name: String,
    pub fields: BTreeMap<String, String>,
}

impl OrderRecord {
    pub fn field(&self, column: &str) -> &str {
        self.fields.get(column).map(String::as_str).unwrap_or("")
    }
}

/// One unique student after squashing all of their order rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Student {
    pub student_id: String,
    pub student_name: String,
    pub tier: PurchaseTier,
    /// First order row seen for this student; supplies projected columns.
    pub order: OrderRecord,
}

/// One enrolled student from the roster export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRecord {
    pub exam_id: String,
    pub student_name: String,
    pub fields: BTreeMap<String, String>,
}

impl RosterRecord {
    pub fn field(&self, column: &str) -> &str {
        self.fields.get(column).map(String::as_str).unwrap_or("")
    }
}

/// One pre-issued account. Payload columns are opaque and follow the
/// owning pool's headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub values: Vec<String>,
}

// ---------------------------------------------------------------------------
// Join + allocation
// ---------------------------------------------------------------------------

/// Outcome of joining a roster row against the order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkStatus {
    Matched(PurchaseTier),
    /// No order-side student carries this roster row's join key.
    Manual,
}

impl LinkStatus {
    pub fn tier(&self) -> Option<PurchaseTier> {
        match self {
            Self::Matched(tier) => Some(*tier),
            Self::Manual => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedRecord {
    pub roster: RosterRecord,
    pub student: Option<Student>,
    pub status: LinkStatus,
}

/// What a buyer row received from its tier's pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Allocation {
    Credential(CredentialRecord),
    /// The pool ran out before reaching this row.
    Insufficient,
}

impl Allocation {
    pub fn credential(&self) -> Option<&CredentialRecord> {
        match self {
            Self::Credential(c) => Some(c),
            Self::Insufficient => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedBuyer {
    pub linked: LinkedRecord,
    pub tier: PurchaseTier,
    pub allocation: Allocation,
}

// ---------------------------------------------------------------------------
// Partitioned output
// ---------------------------------------------------------------------------

/// The four result sets produced by the partition step.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    /// HIGH buyers then LOW buyers, each in join order.
    pub buyers: Vec<MatchedBuyer>,
    pub no_buyers: Vec<LinkedRecord>,
    pub manual_roster: Vec<RosterRecord>,
    pub manual_orders: Vec<Student>,
}
