use serde::Deserialize;

use crate::eligibility::{Eligibility, TitleContains, YearEquals};
use crate::error::LinkError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Everything that differs between dataset generations. One pipeline
/// implementation serves every generation by swapping this value.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    pub name: String,
    pub order: OrderSchema,
    pub roster: RosterSchema,
    pub join: JoinConfig,
    #[serde(default)]
    pub tiers: TierConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub split: Option<SplitRule>,
}

// ---------------------------------------------------------------------------
// Order side
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct OrderSchema {
    /// Encoding label of the order export (WHATWG label, e.g. "shift_jis").
    #[serde(default = "default_utf8")]
    pub encoding: String,
    /// Fixed column order for header-less exports. When absent the first
    /// row of the file is the header.
    #[serde(default)]
    pub headers: Option<Vec<String>>,
    pub record_id: String,
    pub student_id: String,
    pub student_name: String,
    pub email: String,
    pub school_year: String,
    pub product_name: String,
    pub eligibility: EligibilityRule,
    /// Order-side columns carried into joined rows and ManualOrders.
    pub columns: Vec<String>,
}

impl OrderSchema {
    /// Every column the loader needs to find in the order table.
    pub fn required_columns(&self) -> Vec<&str> {
        let mut cols = vec![
            self.record_id.as_str(),
            self.student_id.as_str(),
            self.student_name.as_str(),
            self.email.as_str(),
            self.school_year.as_str(),
            self.product_name.as_str(),
            self.eligibility.column(),
        ];
        cols.sort_unstable();
        cols.dedup();
        cols
    }
}

/// First-year eligibility predicate, selected per generation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EligibilityRule {
    /// Cell contains a literal substring (e.g. textbook title contains "1年").
    TitleContains { column: String, needle: String },
    /// Cell parses to the given number (e.g. current school year == 1).
    YearEquals { column: String, year: i64 },
}

impl EligibilityRule {
    pub fn column(&self) -> &str {
        match self {
            Self::TitleContains { column, .. } | Self::YearEquals { column, .. } => column,
        }
    }

    pub fn predicate(&self) -> Box<dyn Eligibility> {
        match self {
            Self::TitleContains { column, needle } => Box::new(TitleContains {
                column: column.clone(),
                needle: needle.clone(),
            }),
            Self::YearEquals { column, year } => Box::new(YearEquals {
                column: column.clone(),
                year: *year,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Roster side
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RosterSchema {
    #[serde(default = "default_utf8")]
    pub encoding: String,
    pub exam_id: String,
    pub student_name: String,
    /// Roster-side columns carried into joined rows and ManualRoster.
    pub columns: Vec<String>,
}

// ---------------------------------------------------------------------------
// Join
// ---------------------------------------------------------------------------

/// Which roster column is matched against which order column.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinConfig {
    pub roster_key: String,
    pub order_key: String,
}

// ---------------------------------------------------------------------------
// Tiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TierSpec {
    /// Label written to the tier column.
    pub label: String,
    /// Substring of the product name that marks this tier.
    pub signature: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TierConfig {
    /// Header of the tier column in joined output.
    #[serde(default = "default_tier_column")]
    pub column: String,
    pub high: TierSpec,
    pub low: TierSpec,
    #[serde(default = "default_none_label")]
    pub none_label: String,
    #[serde(default = "default_manual_label")]
    pub manual_label: String,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            column: default_tier_column(),
            high: TierSpec {
                label: "6辞書".into(),
                signature: "【アプリ版辞書】DONGURI(6辞書)".into(),
            },
            low: TierSpec {
                label: "3辞書".into(),
                signature: "【アプリ版辞書】DONGURI(3辞書)".into(),
            },
            none_label: default_none_label(),
            manual_label: default_manual_label(),
        }
    }
}

fn default_tier_column() -> String {
    "副教材タイプ".into()
}

fn default_none_label() -> String {
    "購入しない".into()
}

fn default_manual_label() -> String {
    "（手動で作成）".into()
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// One output file holding two named sheets.
#[derive(Debug, Clone, Deserialize)]
pub struct BundleNames {
    pub file: String,
    pub sheets: [String; 2],
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Written into every credential column of a buyer the pool could not cover.
    #[serde(default = "default_insufficient_marker")]
    pub insufficient_marker: String,
    #[serde(default = "default_result_bundle")]
    pub result: BundleNames,
    #[serde(default = "default_manual_bundle")]
    pub manual: BundleNames,
    #[serde(default = "default_remaining_bundle")]
    pub remaining: BundleNames,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            insufficient_marker: default_insufficient_marker(),
            result: default_result_bundle(),
            manual: default_manual_bundle(),
            remaining: default_remaining_bundle(),
        }
    }
}

fn default_insufficient_marker() -> String {
    "アカウント不足".into()
}

fn default_result_bundle() -> BundleNames {
    BundleNames {
        file: "学生情報・DONGURIアカウント情報紐付け結果一覧".into(),
        sheets: ["購入者".into(), "非購入者".into()],
    }
}

fn default_manual_bundle() -> BundleNames {
    BundleNames {
        file: "DONGURIアカウント情報紐付けに失敗した学生一覧".into(),
        sheets: ["生徒一覧".into(), "購入情報-マッチング候補".into()],
    }
}

fn default_remaining_bundle() -> BundleNames {
    BundleNames {
        file: "DONGURI残りのアカウント一覧".into(),
        sheets: ["6辞書アカウント".into(), "3辞書アカウント".into()],
    }
}

// ---------------------------------------------------------------------------
// Combined credential export
// ---------------------------------------------------------------------------

/// How to split a credential export that ships both tiers in one file.
#[derive(Debug, Clone, Deserialize)]
pub struct SplitRule {
    /// Column whose text names the product of each account.
    pub remark_column: String,
    pub high_marker: String,
    pub low_marker: String,
    /// Columns kept in both split pools, in this order.
    pub columns: Vec<String>,
}

impl Default for SplitRule {
    fn default() -> Self {
        Self {
            remark_column: "備考".into(),
            high_marker: "ジーニアス５辞書".into(),
            low_marker: "ジーニアス英和/和英".into(),
            columns: vec!["ユーザー名".into(), "グループ名".into(), "一時パスワード".into()],
        }
    }
}

fn default_utf8() -> String {
    "utf-8".into()
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

/// Historical dataset generations with built-in configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    /// Shift_JIS order export; first-year = textbook title contains "1年".
    TextbookTitle,
    /// UTF-8 order export; first-year = current school year equals 1.
    SchoolYear,
}

impl Generation {
    pub const ALL: [Generation; 2] = [Generation::TextbookTitle, Generation::SchoolYear];

    pub fn name(&self) -> &'static str {
        match self {
            Self::TextbookTitle => "textbook-title",
            Self::SchoolYear => "school-year",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.name() == name)
    }

    pub fn config(&self) -> LinkConfig {
        let (encoding, eligibility) = match self {
            Self::TextbookTitle => (
                "shift_jis",
                EligibilityRule::TitleContains {
                    column: "教科書タイトル".into(),
                    needle: "1年".into(),
                },
            ),
            Self::SchoolYear => (
                "utf-8",
                EligibilityRule::YearEquals {
                    column: "現在の学年".into(),
                    year: 1,
                },
            ),
        };

        let order_headers = [
            "id",
            "学籍番号",
            "生徒名",
            "生徒名（カナ）",
            "メールアドレス",
            "registered",
            "学校ID",
            "現在の学年",
            "教科書タイトル",
            "商品名",
        ];

        LinkConfig {
            name: self.name().into(),
            order: OrderSchema {
                encoding: encoding.into(),
                headers: Some(order_headers.iter().map(|h| h.to_string()).collect()),
                record_id: "id".into(),
                student_id: "学籍番号".into(),
                student_name: "生徒名".into(),
                email: "メールアドレス".into(),
                school_year: "現在の学年".into(),
                product_name: "商品名".into(),
                eligibility,
                columns: vec![
                    "id".into(),
                    "学籍番号".into(),
                    "生徒名".into(),
                    "教科書タイトル".into(),
                ],
            },
            roster: RosterSchema {
                encoding: "utf-8".into(),
                exam_id: "テスト番号".into(),
                student_name: "氏\u{3000}名".into(),
                columns: vec![
                    "テスト番号".into(),
                    "合格学科".into(),
                    "クラス２".into(),
                    "出席番号".into(),
                    "氏\u{3000}名".into(),
                ],
            },
            join: JoinConfig {
                roster_key: "テスト番号".into(),
                order_key: "学籍番号".into(),
            },
            tiers: TierConfig::default(),
            output: OutputConfig::default(),
            split: Some(SplitRule::default()),
        }
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl LinkConfig {
    pub fn from_toml(input: &str) -> Result<Self, LinkError> {
        let config: LinkConfig =
            toml::from_str(input).map_err(|e| LinkError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LinkError> {
        let invalid = |msg: String| Err(LinkError::ConfigValidation(msg));

        if self.tiers.high.signature.is_empty() || self.tiers.low.signature.is_empty() {
            return invalid("tier signatures must not be empty".into());
        }
        if self.tiers.high.signature == self.tiers.low.signature {
            return invalid(format!(
                "high and low tiers share the signature '{}'",
                self.tiers.high.signature
            ));
        }
        if self.join.roster_key.is_empty() || self.join.order_key.is_empty() {
            return invalid("join keys must name a column on both sides".into());
        }

        if let Some(headers) = &self.order.headers {
            let output = self.order.columns.iter().map(String::as_str);
            for col in self.order.required_columns().into_iter().chain(output) {
                if !headers.iter().any(|h| h == col) {
                    return invalid(format!("order.headers does not list column '{col}'"));
                }
            }
        }

        for label in [&self.order.encoding, &self.roster.encoding] {
            if !is_known_encoding(label) {
                return invalid(format!("unknown encoding label '{label}'"));
            }
        }

        for bundle in [&self.output.result, &self.output.manual, &self.output.remaining] {
            if bundle.file.trim().is_empty() {
                return invalid("output bundle file names must not be empty".into());
            }
            if bundle.sheets[0] == bundle.sheets[1] {
                return invalid(format!(
                    "bundle '{}' uses the sheet name '{}' twice",
                    bundle.file, bundle.sheets[0]
                ));
            }
        }

        Ok(())
    }
}

/// Encoding labels the I/O layer can decode. Kept in the engine so a config
/// can be validated before any file is opened.
pub const KNOWN_ENCODINGS: &[&str] = &[
    "utf-8",
    "utf8",
    "shift_jis",
    "shift-jis",
    "sjis",
    "ms932",
    "windows-31j",
    "euc-jp",
    "iso-2022-jp",
    "windows-1252",
];

fn is_known_encoding(label: &str) -> bool {
    let label = label.trim().to_ascii_lowercase();
    KNOWN_ENCODINGS.iter().any(|k| *k == label)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
name = "Spring intake"

[order]
encoding = "shift_jis"
record_id = "id"
student_id = "student_no"
student_name = "name"
email = "email"
school_year = "grade"
product_name = "product"
columns = ["id", "student_no", "name"]

[order.eligibility]
kind = "year_equals"
column = "grade"
year = 1

[roster]
exam_id = "exam_no"
student_name = "full_name"
columns = ["exam_no", "course", "full_name"]

[join]
roster_key = "exam_no"
order_key = "student_no"

[tiers]
column = "tier"
high = { label = "six", signature = "(6)" }
low = { label = "three", signature = "(3)" }
"#;

    #[test]
    fn parse_valid() {
        let config = LinkConfig::from_toml(VALID).unwrap();
        assert_eq!(config.name, "Spring intake");
        assert_eq!(config.order.encoding, "shift_jis");
        assert!(config.order.headers.is_none());
        assert_eq!(
            config.order.eligibility,
            EligibilityRule::YearEquals {
                column: "grade".into(),
                year: 1
            }
        );
        assert_eq!(config.roster.encoding, "utf-8");
        assert_eq!(config.tiers.high.label, "six");
        assert_eq!(config.tiers.none_label, "購入しない");
        assert_eq!(config.output.insufficient_marker, "アカウント不足");
        assert!(config.split.is_none());
    }

    #[test]
    fn parse_title_contains_rule() {
        let input = VALID.replace(
            "kind = \"year_equals\"\ncolumn = \"grade\"\nyear = 1",
            "kind = \"title_contains\"\ncolumn = \"title\"\nneedle = \"1年\"",
        );
        let config = LinkConfig::from_toml(&input).unwrap();
        assert_eq!(config.order.eligibility.column(), "title");
    }

    #[test]
    fn reject_unknown_eligibility_kind() {
        let input = VALID.replace("year_equals", "year_between");
        let err = LinkConfig::from_toml(&input).unwrap_err();
        assert!(matches!(err, LinkError::ConfigParse(_)));
    }

    #[test]
    fn reject_shared_signature() {
        let input = VALID.replace("signature = \"(3)\"", "signature = \"(6)\"");
        let err = LinkConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("share the signature"));
    }

    #[test]
    fn reject_unknown_encoding() {
        let input = VALID.replace("shift_jis", "klingon");
        let err = LinkConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("klingon"));
    }

    #[test]
    fn reject_headers_missing_required_column() {
        let input = VALID.replace(
            "encoding = \"shift_jis\"",
            "encoding = \"shift_jis\"\nheaders = [\"id\", \"student_no\"]",
        );
        let err = LinkConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("order.headers"));
    }

    #[test]
    fn reject_headers_missing_output_column() {
        let headers = r#"headers = ["id", "student_no", "name", "email", "grade", "product"]"#;
        let input = VALID
            .replace("encoding = \"shift_jis\"", &format!("encoding = \"shift_jis\"\n{headers}"))
            .replace(
                r#"columns = ["id", "student_no", "name"]"#,
                r#"columns = ["id", "student_no", "nmae"]"#,
            );
        let err = LinkConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("'nmae'"));
    }

    #[test]
    fn presets_validate() {
        for generation in Generation::ALL {
            let config = generation.config();
            config.validate().unwrap();
            assert_eq!(Generation::from_name(generation.name()), Some(generation));
        }
        assert_eq!(Generation::from_name("nope"), None);
    }

    #[test]
    fn presets_differ_only_in_eligibility_and_encoding() {
        let a = Generation::TextbookTitle.config();
        let b = Generation::SchoolYear.config();
        assert_eq!(a.order.encoding, "shift_jis");
        assert_eq!(b.order.encoding, "utf-8");
        assert_eq!(a.order.eligibility.column(), "教科書タイトル");
        assert_eq!(b.order.eligibility.column(), "現在の学年");
        assert_eq!(a.join.roster_key, b.join.roster_key);
        assert_eq!(a.join.order_key, b.join.order_key);
    }
}
