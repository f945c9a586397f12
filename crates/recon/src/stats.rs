//! Read-only diagnostics over an order dataset. Nothing here feeds the
//! pipeline.

use std::collections::HashSet;

use serde::Serialize;

use crate::config::TierConfig;
use crate::order::OrderDataset;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderStats {
    pub rows: usize,
    /// Distinct student ids (synthetic ids included).
    pub unique_ids: usize,
    /// Distinct normalized names. Lower than `unique_ids` when namesakes exist.
    pub unique_names: usize,
    /// Distinct (id, name) pairs.
    pub unique_id_name_pairs: usize,
    pub high_signature_rows: usize,
    pub low_signature_rows: usize,
}

/// Compute uniqueness counts and signature hits.
pub fn order_stats(orders: &OrderDataset, tiers: &TierConfig) -> OrderStats {
    let records = orders.records();
    let ids: HashSet<&str> = records.iter().map(|r| r.student_id.as_str()).collect();
    let names: HashSet<&str> = records.iter().map(|r| r.student_name.as_str()).collect();
    let pairs: HashSet<(&str, &str)> = records
        .iter()
        .map(|r| (r.student_id.as_str(), r.student_name.as_str()))
        .collect();

    OrderStats {
        rows: records.len(),
        unique_ids: ids.len(),
        unique_names: names.len(),
        unique_id_name_pairs: pairs.len(),
        high_signature_rows: records
            .iter()
            .filter(|r| r.product_name.contains(&tiers.high.signature))
            .count(),
        low_signature_rows: records
            .iter()
            .filter(|r| r.product_name.contains(&tiers.low.signature))
            .count(),
    }
}

impl std::fmt::Display for OrderStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "rows: {}", self.rows)?;
        writeln!(
            f,
            "unique students: {} by id, {} by name, {} by id+name",
            self.unique_ids, self.unique_names, self.unique_id_name_pairs
        )?;
        write!(
            f,
            "signature rows: {} high, {} low",
            self.high_signature_rows, self.low_signature_rows
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Generation;
    use crate::model::Table;

    #[test]
    fn uniqueness_definitions_diverge() {
        let config = Generation::SchoolYear.config();
        let headers: Vec<&str> = config
            .order
            .headers
            .as_ref()
            .unwrap()
            .iter()
            .map(String::as_str)
            .collect();
        // id, 学籍番号, 生徒名, 生徒名（カナ）, メールアドレス, registered, 学校ID, 現在の学年, 教科書タイトル, 商品名
        let table = Table::from_rows(
            "orders",
            &headers,
            &[
                &["1", "001", "田中", "", "a@x", "", "", "1", "", "【アプリ版辞書】DONGURI(6辞書)"],
                &["2", "001", "田中", "", "a@x", "", "", "1", "", "【アプリ版辞書】DONGURI(3辞書)"],
                &["3", "002", "田中", "", "b@x", "", "", "1", "", "【アプリ版辞書】DONGURI(3辞書)"],
                &["4", "003", "佐藤", "", "c@x", "", "", "1", "", "購入しない"],
            ],
        );
        let orders = OrderDataset::load(&table, &config.order).unwrap();
        let before = orders.records().to_vec();
        let stats = order_stats(&orders, &config.tiers);

        assert_eq!(stats.rows, 4);
        assert_eq!(stats.unique_ids, 3);
        assert_eq!(stats.unique_names, 2);
        assert_eq!(stats.unique_id_name_pairs, 3);
        assert_eq!(stats.high_signature_rows, 1);
        assert_eq!(stats.low_signature_rows, 2);
        assert_eq!(orders.records(), before.as_slice());
    }
}
