use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::config::{OrderSchema, TierConfig};
use crate::eligibility::Eligibility;
use crate::error::LinkError;
use crate::model::{OrderRecord, PurchaseTier, Student, Table};
use crate::normalize::{clean_whitespace, normalize_name};

/// Prefix of identifiers synthesized for rows that arrive without one.
pub const SYNTHETIC_ID_PREFIX: &str = "SYN-";

/// Commerce-order line items, cleaned and deduplicated.
#[derive(Debug, Clone)]
pub struct OrderDataset {
    headers: Vec<String>,
    records: Vec<OrderRecord>,
}

impl OrderDataset {
    /// Parse an order table. Names are normalized, missing student ids are
    /// repaired by e-mail, then duplicate line items are collapsed.
    pub fn load(table: &Table, schema: &OrderSchema) -> Result<Self, LinkError> {
        for column in schema.required_columns() {
            table.column(column)?;
        }
        for column in &schema.columns {
            table.column(column)?;
        }

        let mut records: Vec<OrderRecord> = (0..table.len())
            .map(|row| {
                let mut fields = table.row_fields(row);
                let mut take = |column: &str, clean: fn(&str) -> String| {
                    let value = clean(fields.get(column).map(String::as_str).unwrap_or(""));
                    fields.insert(column.to_string(), value.clone());
                    value
                };
                let student_name = take(&schema.student_name, normalize_name);
                let student_id = take(&schema.student_id, clean_whitespace);
                let email = take(&schema.email, clean_whitespace);
                let record_id = take(&schema.record_id, |s| s.to_string());
                let school_year = take(&schema.school_year, |s| s.to_string());
                let product_name = take(&schema.product_name, |s| s.trim().to_string());
                OrderRecord {
                    record_id,
                    student_id,
                    student_name,
                    email,
                    school_year,
                    product_name,
                    fields,
                }
            })
            .collect();

        let repaired = repair_missing_ids(&mut records, &schema.student_id);
        let before = records.len();
        let records = dedup_line_items(records);
        debug!(
            rows = table.len(),
            repaired_ids = repaired,
            duplicates = before - records.len(),
            "loaded order table"
        );

        Ok(Self {
            headers: table.headers.clone(),
            records,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[OrderRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows accepted by the eligibility predicate, in original order.
    pub fn filter(&self, predicate: &dyn Eligibility) -> OrderDataset {
        OrderDataset {
            headers: self.headers.clone(),
            records: self
                .records
                .iter()
                .filter(|r| predicate.is_first_year(r))
                .cloned()
                .collect(),
        }
    }

    /// Squash to one [`Student`] per student id. The tier is the highest
    /// found across all of that student's rows; metadata comes from the
    /// first row. Students keep first-appearance order.
    pub fn classify_purchase_tier(&self, tiers: &TierConfig) -> Vec<Student> {
        let mut students: Vec<Student> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();

        for record in &self.records {
            let tier = product_tier(&record.product_name, tiers);
            match index.get(record.student_id.as_str()) {
                Some(&pos) => {
                    let student = &mut students[pos];
                    student.tier = student.tier.min(tier);
                }
                None => {
                    index.insert(&record.student_id, students.len());
                    students.push(Student {
                        student_id: record.student_id.clone(),
                        student_name: record.student_name.clone(),
                        tier,
                        order: record.clone(),
                    });
                }
            }
        }

        students
    }
}

/// Tier implied by a single product name.
pub fn product_tier(product_name: &str, tiers: &TierConfig) -> PurchaseTier {
    if product_name.contains(&tiers.high.signature) {
        PurchaseTier::High
    } else if product_name.contains(&tiers.low.signature) {
        PurchaseTier::Low
    } else {
        PurchaseTier::None
    }
}

/// Give every row with an empty student id a synthetic one. Rows sharing an
/// e-mail share the id; rows with neither id nor e-mail each get their own.
/// Returns the number of rows repaired.
///
/// Best effort only: two students sharing one address are merged, and one
/// student using two addresses is split.
fn repair_missing_ids(records: &mut [OrderRecord], id_column: &str) -> usize {
    let taken: HashSet<String> = records
        .iter()
        .filter(|r| !r.student_id.is_empty())
        .map(|r| r.student_id.clone())
        .collect();

    let mut next = 1usize;
    let mut fresh_id = || loop {
        let candidate = format!("{SYNTHETIC_ID_PREFIX}{next}");
        next += 1;
        if !taken.contains(&candidate) {
            return candidate;
        }
    };

    let mut by_email: HashMap<String, String> = HashMap::new();
    let mut repaired = 0;

    for record in records.iter_mut().filter(|r| r.student_id.is_empty()) {
        let id = if record.email.is_empty() {
            fresh_id()
        } else {
            by_email
                .entry(record.email.clone())
                .or_insert_with(&mut fresh_id)
                .clone()
        };
        record.fields.insert(id_column.to_string(), id.clone());
        record.student_id = id;
        repaired += 1;
    }

    repaired
}

/// Collapse rows identical on (student id, student name, product name),
/// keeping the first.
fn dedup_line_items(records: Vec<OrderRecord>) -> Vec<OrderRecord> {
    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    records
        .into_iter()
        .filter(|r| {
            seen.insert((
                r.student_id.clone(),
                r.student_name.clone(),
                r.product_name.clone(),
            ))
        })
        .collect()
}
