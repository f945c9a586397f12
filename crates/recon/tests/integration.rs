use rosterlink_recon::config::{Generation, LinkConfig};
use rosterlink_recon::export::{Bundle, MemorySink, TableSink};
use rosterlink_recon::model::{Allocation, PurchaseTier, Table};
use rosterlink_recon::pipeline::{LinkagePipeline, PipelineInput, Stage};
use rosterlink_recon::LinkError;

const HIGH: &str = "【アプリ版辞書】DONGURI(6辞書)";
const LOW: &str = "【アプリ版辞書】DONGURI(3辞書)";
const NO_DICT: &str = "英語テキスト";
const FIRST_YEAR: &str = "高校1年英語";

const ROSTER_HEADERS: [&str; 5] = ["テスト番号", "合格学科", "クラス２", "出席番号", "氏\u{3000}名"];

// -------------------------------------------------------------------------
// Fixture builders
// -------------------------------------------------------------------------

/// One order row in the fixed export column order.
struct Order<'a> {
    id: &'a str,
    student_id: &'a str,
    name: &'a str,
    email: &'a str,
    year: &'a str,
    title: &'a str,
    product: &'a str,
}

impl<'a> Order<'a> {
    fn new(id: &'a str, student_id: &'a str, name: &'a str, product: &'a str) -> Self {
        Self {
            id,
            student_id,
            name,
            email: "",
            year: "1",
            title: FIRST_YEAR,
            product,
        }
    }

    fn email(mut self, email: &'a str) -> Self {
        self.email = email;
        self
    }

    fn year(mut self, year: &'a str, title: &'a str) -> Self {
        self.year = year;
        self.title = title;
        self
    }

    fn row(&self) -> Vec<String> {
        [
            self.id,
            self.student_id,
            self.name,
            "",
            self.email,
            "",
            "S01",
            self.year,
            self.title,
            self.product,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

fn orders(config: &LinkConfig, rows: &[Order]) -> Table {
    let headers = config.order.headers.clone().unwrap();
    let mut table = Table::new("orders", headers);
    table.rows = rows.iter().map(Order::row).collect();
    table
}

fn roster(rows: &[(&str, &str)]) -> Table {
    let mut table = Table::new("roster", ROSTER_HEADERS.iter().map(|h| h.to_string()).collect());
    table.rows = rows
        .iter()
        .enumerate()
        .map(|(i, (exam, name))| {
            vec![
                exam.to_string(),
                "普通科".into(),
                "A".into(),
                (i + 1).to_string(),
                name.to_string(),
            ]
        })
        .collect();
    table
}

fn pool(name: &str, users: &[&str]) -> Table {
    let mut table = Table::new(name, vec!["ユーザー名".into(), "一時パスワード".into()]);
    table.rows = users
        .iter()
        .map(|u| vec![u.to_string(), format!("pw-{u}")])
        .collect();
    table
}

fn run(config: &LinkConfig, input: PipelineInput) -> (LinkagePipeline<'_>, MemorySink) {
    let mut pipeline = LinkagePipeline::new(config, &input).unwrap();
    let mut sink = MemorySink::default();
    let report = pipeline.run(&mut sink).unwrap();
    assert!(report.is_complete());
    (pipeline, sink)
}

fn sheet<'a>(sink: &'a MemorySink, file: &str, index: usize) -> &'a Table {
    let bundle = sink
        .bundles
        .iter()
        .find(|b| b.file == file)
        .unwrap_or_else(|| panic!("no bundle named {file}"));
    &bundle.tables[index]
}

fn col(table: &Table, name: &str) -> usize {
    table.headers.iter().position(|h| h == name).unwrap()
}

// -------------------------------------------------------------------------
// End-to-end scenarios
// -------------------------------------------------------------------------

#[test]
fn single_high_buyer_gets_first_credential() {
    let config = Generation::TextbookTitle.config();
    let input = PipelineInput {
        orders: orders(&config, &[Order::new("1", "001", "田中太郎(タナカ)", HIGH)]),
        roster: roster(&[("001", "田中太郎")]),
        high_pool: pool("high", &["u1"]),
        low_pool: pool("low", &[]),
    };
    let (pipeline, sink) = run(&config, input);

    let result = pipeline.result().unwrap();
    assert_eq!(result.buyers.len(), 1);
    let buyer = &result.buyers[0];
    assert_eq!(buyer.tier, PurchaseTier::High);
    assert_eq!(buyer.linked.student.as_ref().unwrap().student_name, "田中太郎");
    assert_eq!(buyer.allocation.credential().unwrap().values[0], "u1");
    assert!(result.no_buyers.is_empty());
    assert!(result.manual_roster.is_empty());
    assert!(result.manual_orders.is_empty());
    assert!(pipeline.high_pool().remaining().is_empty());

    let buyers = sheet(&sink, &config.output.result.file, 0);
    assert_eq!(buyers.name, "購入者");
    assert_eq!(buyers.rows.len(), 1);
    assert_eq!(buyers.rows[0][col(buyers, "生徒名")], "田中太郎");
    assert_eq!(buyers.rows[0][col(buyers, "副教材タイプ")], "6辞書");
    assert_eq!(buyers.rows[0][col(buyers, "ユーザー名")], "u1");
    assert_eq!(buyers.rows[0][col(buyers, "一時パスワード")], "pw-u1");

    let remaining = sheet(&sink, &config.output.remaining.file, 0);
    assert!(remaining.rows.is_empty());
}

#[test]
fn unmatched_roster_row_goes_to_manual_roster_verbatim() {
    let config = Generation::TextbookTitle.config();
    let input = PipelineInput {
        orders: orders(&config, &[Order::new("1", "001", "田中太郎", LOW)]),
        roster: roster(&[("001", "田中太郎"), ("999", "鈴木\u{3000}花子")]),
        high_pool: pool("high", &[]),
        low_pool: pool("low", &["l1"]),
    };
    let (pipeline, sink) = run(&config, input);

    let result = pipeline.result().unwrap();
    assert_eq!(result.buyers.len(), 1);
    assert!(result.no_buyers.is_empty());
    assert_eq!(result.manual_roster.len(), 1);
    assert_eq!(result.manual_roster[0].exam_id, "999");
    assert!(result
        .buyers
        .iter()
        .all(|b| b.linked.roster.exam_id != "999"));

    let manual = sheet(&sink, &config.output.manual.file, 0);
    assert_eq!(manual.headers, ROSTER_HEADERS);
    assert_eq!(manual.rows, vec![vec!["999", "普通科", "A", "2", "鈴木花子"]]);
}

#[test]
fn short_pool_marks_later_rows_insufficient() {
    let config = Generation::TextbookTitle.config();
    let input = PipelineInput {
        orders: orders(
            &config,
            &[
                Order::new("1", "003", "C", HIGH),
                Order::new("2", "001", "A", HIGH),
                Order::new("3", "002", "B", HIGH),
            ],
        ),
        roster: roster(&[("001", "A"), ("002", "B"), ("003", "C")]),
        high_pool: pool("high", &["u1"]),
        low_pool: pool("low", &["l1"]),
    };
    let (pipeline, sink) = run(&config, input);

    let result = pipeline.result().unwrap();
    let exam_ids: Vec<&str> = result
        .buyers
        .iter()
        .map(|b| b.linked.roster.exam_id.as_str())
        .collect();
    assert_eq!(exam_ids, ["001", "002", "003"]);
    assert_eq!(result.buyers[0].allocation.credential().unwrap().values[0], "u1");
    assert_eq!(result.buyers[1].allocation, Allocation::Insufficient);
    assert_eq!(result.buyers[2].allocation, Allocation::Insufficient);
    assert!(pipeline.high_pool().remaining().is_empty());
    assert_eq!(pipeline.low_pool().remaining().len(), 1);

    let summary = pipeline.summary().unwrap();
    assert_eq!(summary.high_pool.allocated, 1);
    assert_eq!(summary.high_pool.shortfall, 2);

    let buyers = sheet(&sink, &config.output.result.file, 0);
    let user = col(buyers, "ユーザー名");
    let password = col(buyers, "一時パスワード");
    assert_eq!(buyers.rows[1][user], "アカウント不足");
    assert_eq!(buyers.rows[2][password], "アカウント不足");

    let leftover_low = sheet(&sink, &config.output.remaining.file, 1);
    assert_eq!(leftover_low.name, "3辞書アカウント");
    assert_eq!(leftover_low.rows, vec![vec!["l1", "pw-l1"]]);
}

#[test]
fn high_buyers_precede_low_buyers() {
    let config = Generation::TextbookTitle.config();
    let input = PipelineInput {
        orders: orders(
            &config,
            &[
                Order::new("1", "001", "A", LOW),
                Order::new("2", "002", "B", HIGH),
                Order::new("3", "003", "C", LOW),
                Order::new("4", "004", "D", HIGH),
            ],
        ),
        roster: roster(&[("001", "A"), ("002", "B"), ("003", "C"), ("004", "D")]),
        high_pool: pool("high", &["h1", "h2"]),
        low_pool: pool("low", &["l1", "l2"]),
    };
    let (pipeline, _) = run(&config, input);

    let users: Vec<(&str, &str)> = pipeline
        .result()
        .unwrap()
        .buyers
        .iter()
        .map(|b| {
            (
                b.linked.roster.exam_id.as_str(),
                b.allocation.credential().unwrap().values[0].as_str(),
            )
        })
        .collect();
    assert_eq!(users, [("002", "h1"), ("004", "h2"), ("001", "l1"), ("003", "l2")]);
}

#[test]
fn every_roster_row_lands_in_one_bucket() {
    let config = Generation::TextbookTitle.config();
    let input = PipelineInput {
        orders: orders(
            &config,
            &[
                Order::new("1", "001", "A", HIGH),
                Order::new("2", "002", "B", LOW),
                Order::new("3", "003", "C", NO_DICT),
                Order::new("4", "004", "D", HIGH).year("2", "高校2年英語"),
            ],
        ),
        roster: roster(&[("001", "A"), ("002", "B"), ("003", "C"), ("004", "D"), ("005", "E")]),
        high_pool: pool("high", &["h1"]),
        low_pool: pool("low", &[]),
    };
    let (pipeline, sink) = run(&config, input);

    let result = pipeline.result().unwrap();
    assert_eq!(result.buyers.len(), 2);
    assert_eq!(result.no_buyers.len(), 1);
    // 004 only has a second-year order, so it is unmatched after filtering.
    assert_eq!(result.manual_roster.len(), 2);
    assert_eq!(
        result.buyers.len() + result.no_buyers.len() + result.manual_roster.len(),
        5
    );

    let summary = pipeline.summary().unwrap();
    assert!(summary.conserved);
    assert_eq!(summary.eligible_order_rows, 3);
    assert_eq!(summary.buyers_low, 1);

    let no_buyers = sheet(&sink, &config.output.result.file, 1);
    assert_eq!(no_buyers.rows[0][col(no_buyers, "副教材タイプ")], "購入しない");
}

#[test]
fn both_signatures_classify_high() {
    let config = Generation::TextbookTitle.config();
    let input = PipelineInput {
        orders: orders(
            &config,
            &[
                Order::new("1", "001", "A", LOW),
                Order::new("2", "001", "A", HIGH),
            ],
        ),
        roster: roster(&[("001", "A")]),
        high_pool: pool("high", &["h1"]),
        low_pool: pool("low", &["l1"]),
    };
    let (pipeline, _) = run(&config, input);

    let result = pipeline.result().unwrap();
    assert_eq!(result.buyers.len(), 1);
    assert_eq!(result.buyers[0].tier, PurchaseTier::High);
    assert_eq!(pipeline.low_pool().remaining().len(), 1);
}

#[test]
fn unconsumed_students_go_to_manual_orders() {
    let config = Generation::TextbookTitle.config();
    let input = PipelineInput {
        orders: orders(
            &config,
            &[
                Order::new("1", "001", "A", HIGH),
                // Typo in the student number: never joined.
                Order::new("2", "0O2", "B", LOW),
            ],
        ),
        roster: roster(&[("001", "A"), ("002", "B")]),
        high_pool: pool("high", &["h1"]),
        low_pool: pool("low", &["l1"]),
    };
    let (pipeline, sink) = run(&config, input);

    let result = pipeline.result().unwrap();
    assert_eq!(result.manual_orders.len(), 1);
    assert_eq!(result.manual_orders[0].student_id, "0O2");
    assert_eq!(result.manual_roster.len(), 1);
    assert_eq!(result.manual_roster[0].exam_id, "002");

    let manual_orders = sheet(&sink, &config.output.manual.file, 1);
    assert_eq!(
        manual_orders.headers,
        ["id", "学籍番号", "生徒名", "教科書タイトル", "副教材タイプ"]
    );
    assert_eq!(manual_orders.rows[0][4], "3辞書");
}

#[test]
fn missing_ids_group_by_email() {
    let config = Generation::SchoolYear.config();
    let input = PipelineInput {
        orders: orders(
            &config,
            &[
                Order::new("1", "", "A", HIGH).email("a@example.jp"),
                Order::new("2", "", "A", LOW).email("a@example.jp"),
                Order::new("3", "", "B", LOW).email("b@example.jp"),
            ],
        ),
        roster: roster(&[("001", "A")]),
        high_pool: pool("high", &[]),
        low_pool: pool("low", &[]),
    };
    let (pipeline, _) = run(&config, input);

    let students = pipeline.students();
    assert_eq!(students.len(), 2);
    assert!(students[0].student_id.starts_with("SYN-"));
    assert_ne!(students[0].student_id, students[1].student_id);
    assert_eq!(students[0].tier, PurchaseTier::High);
    assert_eq!(pipeline.result().unwrap().manual_orders.len(), 2);
}

#[test]
fn school_year_preset_filters_on_year_column() {
    let config = Generation::SchoolYear.config();
    let input = PipelineInput {
        orders: orders(
            &config,
            &[
                Order::new("1", "001", "A", HIGH).year("１", ""),
                Order::new("2", "002", "B", HIGH).year("2", FIRST_YEAR),
                Order::new("3", "003", "C", LOW).year("1.0", ""),
            ],
        ),
        roster: roster(&[("001", "A"), ("002", "B"), ("003", "C")]),
        high_pool: pool("high", &["h1", "h2"]),
        low_pool: pool("low", &["l1"]),
    };
    let (pipeline, _) = run(&config, input);

    let summary = pipeline.summary().unwrap();
    assert_eq!(summary.eligible_order_rows, 2);
    assert_eq!(summary.buyers_high, 1);
    assert_eq!(summary.buyers_low, 1);
    assert_eq!(summary.manual_roster, 1);
}

#[test]
fn repeated_roster_key_rows_each_draw_a_credential() {
    let config = Generation::TextbookTitle.config();
    let input = PipelineInput {
        orders: orders(
            &config,
            &[
                Order::new("1", "001", "A", HIGH),
                Order::new("2", "001", "A2", NO_DICT).year("1", "別の1年教材"),
            ],
        ),
        roster: roster(&[("001", "A"), ("001", "A")]),
        high_pool: pool("high", &["h1", "h2"]),
        low_pool: pool("low", &[]),
    };
    let (pipeline, _) = run(&config, input);

    let summary = pipeline.summary().unwrap();
    assert_eq!(summary.duplicate_roster_keys, 1);
    assert_eq!(summary.buyers_high, 2);
    assert!(summary.conserved);
}

// -------------------------------------------------------------------------
// Failure paths
// -------------------------------------------------------------------------

#[test]
fn missing_order_column_is_a_schema_error() {
    let config = Generation::TextbookTitle.config();
    let input = PipelineInput {
        orders: Table::from_rows("orders", &["id", "学籍番号"], &[]),
        roster: roster(&[]),
        high_pool: pool("high", &[]),
        low_pool: pool("low", &[]),
    };
    let err = LinkagePipeline::new(&config, &input).unwrap_err();
    assert!(matches!(err, LinkError::Schema { ref table, .. } if table == "orders"));
}

struct RejectManual;

impl TableSink for RejectManual {
    type Error = String;

    fn write_bundle(&mut self, bundle: &Bundle) -> Result<(), String> {
        if bundle.file.contains("失敗") {
            Err("permission denied".into())
        } else {
            Ok(())
        }
    }
}

#[test]
fn failed_bundle_does_not_stop_the_others() {
    let config = Generation::TextbookTitle.config();
    let input = PipelineInput {
        orders: orders(&config, &[Order::new("1", "001", "A", HIGH)]),
        roster: roster(&[("001", "A")]),
        high_pool: pool("high", &["h1"]),
        low_pool: pool("low", &[]),
    };
    let mut pipeline = LinkagePipeline::new(&config, &input).unwrap();
    let report = pipeline.run(&mut RejectManual).unwrap();

    assert_eq!(pipeline.stage(), Stage::Exported);
    assert_eq!(report.written.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].file, config.output.manual.file);
    assert!(!report.is_complete());
}

#[test]
fn config_from_toml_drives_the_pipeline() {
    let toml = r#"
name = "custom"

[order]
record_id = "rid"
student_id = "sid"
student_name = "name"
email = "mail"
school_year = "grade"
product_name = "product"
columns = ["sid", "name"]
eligibility = { kind = "year_equals", column = "grade", year = 1 }

[roster]
exam_id = "exam"
student_name = "name"
columns = ["exam", "name"]

[join]
roster_key = "exam"
order_key = "sid"

[tiers]
high = { label = "H", signature = "PREMIUM" }
low = { label = "L", signature = "BASIC" }
"#;
    let config = LinkConfig::from_toml(toml).unwrap();
    let input = PipelineInput {
        orders: Table::from_rows(
            "orders",
            &["rid", "sid", "name", "mail", "grade", "product"],
            &[&["1", "7", "Ann (A)", "a@x", "1", "BASIC plan"]],
        ),
        roster: Table::from_rows("roster", &["exam", "name"], &[&["7", "Ann"]]),
        high_pool: pool("high", &[]),
        low_pool: pool("low", &["l1"]),
    };
    let (pipeline, sink) = run(&config, input);

    let buyers = sheet(&sink, &config.output.result.file, 0);
    assert_eq!(
        buyers.headers,
        ["exam", "name", "sid", "name", "副教材タイプ", "ユーザー名", "一時パスワード"]
    );
    assert_eq!(buyers.rows[0], ["7", "Ann", "7", "Ann", "L", "l1", "pw-l1"]);
    assert_eq!(pipeline.summary().unwrap().buyers_low, 1);
}
