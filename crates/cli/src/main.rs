// rlink - link school rosters to dictionary orders and hand out accounts

mod exit_codes;
mod link;
mod logging;
mod tools;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rosterlink_io::{IoError, OutputFormat};
use rosterlink_recon::{Generation, LinkConfig, LinkError};

use exit_codes::{io_exit_code, link_exit_code, EXIT_CONFIG_INVALID, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};
use logging::{init_logging, LogConfig, LogFormat};

#[derive(Parser)]
#[command(name = "rlink")]
#[command(about = "Link roster and order exports, then allocate dictionary accounts")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log line format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    /// Disable colored log output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full linkage: filter, classify, join, allocate, partition, export
    #[command(after_help = "\
Examples:
  rlink run --orders cms.csv --roster jiyu.csv --high-pool 6dic.xlsx --low-pool 3dic.xlsx
  rlink run --preset school-year --orders cms.csv --roster jiyu.csv \\
            --high-pool 6dic.xlsx --low-pool 3dic.xlsx --out results/ --json
  rlink run --config spring.toml ... --format csv
  rlink run ... --high-pool 6dic.csv --low-pool 3dic.csv --pool-encoding shift_jis")]
    Run {
        /// Order export (csv, or xlsx/xls/ods first sheet)
        #[arg(long)]
        orders: PathBuf,

        /// Test-roster export
        #[arg(long)]
        roster: PathBuf,

        /// Credential pool for the high tier
        #[arg(long)]
        high_pool: PathBuf,

        /// Credential pool for the low tier
        #[arg(long)]
        low_pool: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,

        /// Override the order export's encoding label
        #[arg(long)]
        orders_encoding: Option<String>,

        /// Encoding of delimited credential pool files
        #[arg(long, default_value = "utf-8")]
        pool_encoding: String,

        /// Directory for the three output bundles
        #[arg(long, default_value = ".")]
        out: PathBuf,

        /// Output file layout
        #[arg(long, value_enum, default_value_t = FormatArg::Xlsx)]
        format: FormatArg,

        /// Print the run report as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Uniqueness counts and signature hits for an order export
    #[command(after_help = "\
Examples:
  rlink stats --orders cms.csv
  rlink stats --orders cms.csv --eligible-only --json")]
    Stats {
        #[arg(long)]
        orders: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,

        /// Override the order export's encoding label
        #[arg(long)]
        orders_encoding: Option<String>,

        /// Count only first-year rows
        #[arg(long)]
        eligible_only: bool,

        #[arg(long)]
        json: bool,
    },

    /// Split a combined credential export into high and low pools
    #[command(after_help = "\
Examples:
  rlink split-pool --input accounts_2022.csv
    writes accounts_2022_6dic.xlsx and accounts_2022_3dic.xlsx next to the input")]
    SplitPool {
        #[arg(long, short)]
        input: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,

        /// Encoding of a delimited input
        #[arg(long, default_value = "utf-8")]
        encoding: String,
    },

    /// Re-encode a delimited export as UTF-8
    #[command(name = "to-utf8")]
    ToUtf8 {
        #[arg(long, short)]
        input: PathBuf,

        /// Output path (default: <input>.utf8.csv)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Source encoding label
        #[arg(long, default_value = "shift_jis")]
        encoding: String,
    },

    /// Check a config file without running
    Validate {
        #[arg(long)]
        config: PathBuf,
    },

    /// List the built-in presets
    Presets,
}

/// Where the linkage configuration comes from.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// TOML config file
    #[arg(long, conflicts_with = "preset")]
    pub config: Option<PathBuf>,

    /// Built-in preset (see `rlink presets`); default textbook-title
    #[arg(long)]
    pub preset: Option<String>,
}

impl ConfigArgs {
    pub fn resolve(&self) -> Result<LinkConfig, CliError> {
        if let Some(path) = &self.config {
            return load_config_file(path);
        }
        let name = self.preset.as_deref().unwrap_or(Generation::TextbookTitle.name());
        Generation::from_name(name)
            .map(|g| g.config())
            .ok_or_else(|| {
                let names: Vec<&str> = Generation::ALL.iter().map(|g| g.name()).collect();
                CliError::args(format!("unknown preset '{name}'"))
                    .with_hint(format!("available presets: {}", names.join(", ")))
            })
    }
}

pub fn load_config_file(path: &std::path::Path) -> Result<LinkConfig, CliError> {
    let text = std::fs::read_to_string(path).map_err(|e| CliError {
        code: EXIT_CONFIG_INVALID,
        message: format!("cannot read config {}: {e}", path.display()),
        hint: None,
    })?;
    LinkConfig::from_toml(&text).map_err(|e| CliError::from(e).in_file(path))
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Xlsx,
    Csv,
}

impl From<FormatArg> for OutputFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Xlsx => OutputFormat::Xlsx,
            FormatArg::Csv => OutputFormat::Csv,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(
        &LogConfig::from_verbosity(cli.verbose)
            .with_format(cli.log_format)
            .with_ansi(!cli.no_color),
    );

    let result = match cli.command {
        Commands::Run {
            orders,
            roster,
            high_pool,
            low_pool,
            config,
            orders_encoding,
            pool_encoding,
            out,
            format,
            json,
        } => link::cmd_run(link::RunArgs {
            orders,
            roster,
            high_pool,
            low_pool,
            config,
            orders_encoding,
            pool_encoding,
            out,
            format: format.into(),
            json,
        }),
        Commands::Stats {
            orders,
            config,
            orders_encoding,
            eligible_only,
            json,
        } => link::cmd_stats(orders, config, orders_encoding, eligible_only, json),
        Commands::SplitPool {
            input,
            config,
            encoding,
        } => tools::cmd_split_pool(input, config, encoding),
        Commands::ToUtf8 {
            input,
            output,
            encoding,
        } => tools::cmd_to_utf8(input, output, encoding),
        Commands::Validate { config } => link::cmd_validate(config),
        Commands::Presets => link::cmd_presets(),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    fn in_file(mut self, path: &std::path::Path) -> Self {
        self.message = format!("{}: {}", path.display(), self.message);
        self
    }
}

impl From<LinkError> for CliError {
    fn from(err: LinkError) -> Self {
        let hint = match &err {
            LinkError::Schema { table, .. } => Some(format!(
                "check the {table} column names in the config, or pick another --preset"
            )),
            _ => None,
        };
        Self { code: link_exit_code(&err), message: err.to_string(), hint }
    }
}

impl From<IoError> for CliError {
    fn from(err: IoError) -> Self {
        let hint = match &err {
            IoError::UnknownEncoding(_) => {
                Some("use a WHATWG label such as utf-8, shift_jis or euc-jp".to_string())
            }
            IoError::UnsupportedFormat { .. } => {
                Some("convert the file to .csv or .xlsx first".to_string())
            }
            _ => None,
        };
        Self { code: io_exit_code(&err), message: err.to_string(), hint }
    }
}
