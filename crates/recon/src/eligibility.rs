//! First-year eligibility predicates.
//!
//! Older order exports only carry the textbook title, so eligibility is a
//! substring test on that column. Newer exports carry the school year as a
//! number. Both implement [`Eligibility`]; the configuration picks one.

use crate::model::OrderRecord;
use crate::normalize::ascii_digits;

pub trait Eligibility: std::fmt::Debug {
    fn is_first_year(&self, record: &OrderRecord) -> bool;
}

#[derive(Debug, Clone)]
pub struct TitleContains {
    pub column: String,
    pub needle: String,
}

impl Eligibility for TitleContains {
    fn is_first_year(&self, record: &OrderRecord) -> bool {
        record.field(&self.column).contains(&self.needle)
    }
}

#[derive(Debug, Clone)]
pub struct YearEquals {
    pub column: String,
    pub year: i64,
}

impl Eligibility for YearEquals {
    fn is_first_year(&self, record: &OrderRecord) -> bool {
        parse_year(record.field(&self.column)) == Some(self.year)
    }
}

/// Spreadsheet exports write integers as "1", "1.0" or full-width "１".
fn parse_year(raw: &str) -> Option<i64> {
    let cell = ascii_digits(raw.trim());
    if let Ok(n) = cell.parse::<i64>() {
        return Some(n);
    }
    let f: f64 = cell.parse().ok()?;
    (f.fract() == 0.0).then_some(f as i64)
}
