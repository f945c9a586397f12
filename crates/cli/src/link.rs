//! `rlink run`, `stats`, `validate`, `presets`.

use std::path::{Path, PathBuf};

use rosterlink_io::{read_table, DirectorySink, OutputFormat, ReadOptions};
use rosterlink_recon::order::OrderDataset;
use rosterlink_recon::stats::order_stats;
use rosterlink_recon::{Generation, LinkConfig, LinkReport, LinkagePipeline, PipelineInput, Table};

use crate::exit_codes::EXIT_EXPORT_PARTIAL;
use crate::{load_config_file, CliError, ConfigArgs};

pub struct RunArgs {
    pub orders: PathBuf,
    pub roster: PathBuf,
    pub high_pool: PathBuf,
    pub low_pool: PathBuf,
    pub config: ConfigArgs,
    pub orders_encoding: Option<String>,
    pub pool_encoding: String,
    pub out: PathBuf,
    pub format: OutputFormat,
    pub json: bool,
}

fn read_orders(path: &Path, config: &LinkConfig, encoding: Option<&str>) -> Result<Table, CliError> {
    let options = ReadOptions {
        encoding: encoding.unwrap_or(&config.order.encoding),
        headers: config.order.headers.as_deref(),
    };
    Ok(read_table(path, "orders", options)?)
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let config = args.config.resolve()?;
    let pool_options = ReadOptions {
        encoding: &args.pool_encoding,
        headers: None,
    };

    let input = PipelineInput {
        orders: read_orders(&args.orders, &config, args.orders_encoding.as_deref())?,
        roster: read_table(
            &args.roster,
            "roster",
            ReadOptions {
                encoding: &config.roster.encoding,
                headers: None,
            },
        )?,
        high_pool: read_table(&args.high_pool, "high_pool", pool_options)?,
        low_pool: read_table(&args.low_pool, "low_pool", pool_options)?,
    };

    let mut pipeline = LinkagePipeline::new(&config, &input)?;
    let mut sink = DirectorySink::new(&args.out, args.format);
    let export = pipeline.run(&mut sink)?;

    let report = LinkReport {
        meta: pipeline.meta(),
        summary: pipeline.summary()?,
        export: Some(export),
    };

    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{json}");
    }

    // Human summary to stderr
    eprint!("{}", report.summary);
    for path in sink.written() {
        eprintln!("wrote {}", path.display());
    }

    match report.export {
        Some(ref export) if !export.is_complete() => {
            let failed: Vec<String> = export
                .failed
                .iter()
                .map(|f| format!("{} ({})", f.file, f.message))
                .collect();
            Err(CliError {
                code: EXIT_EXPORT_PARTIAL,
                message: format!("{} bundle(s) not written: {}", failed.len(), failed.join("; ")),
                hint: Some(format!("check that {} is writable", args.out.display())),
            })
        }
        _ => Ok(()),
    }
}

pub fn cmd_stats(
    orders: PathBuf,
    config: ConfigArgs,
    orders_encoding: Option<String>,
    eligible_only: bool,
    json: bool,
) -> Result<(), CliError> {
    let config = config.resolve()?;
    let table = read_orders(&orders, &config, orders_encoding.as_deref())?;
    let mut dataset = OrderDataset::load(&table, &config.order)?;
    if eligible_only {
        dataset = dataset.filter(config.order.eligibility.predicate().as_ref());
    }

    let stats = order_stats(&dataset, &config.tiers);
    if json {
        let out = serde_json::to_string_pretty(&stats)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{out}");
    } else {
        println!("{stats}");
    }
    Ok(())
}

pub fn cmd_validate(path: PathBuf) -> Result<(), CliError> {
    let config = load_config_file(&path)?;
    eprintln!("{}: ok ({})", path.display(), config.name);
    Ok(())
}

pub fn cmd_presets() -> Result<(), CliError> {
    for generation in Generation::ALL {
        let config = generation.config();
        println!(
            "{:<16} order encoding {:<10} join {} = {}",
            generation.name(),
            config.order.encoding,
            config.join.roster_key,
            config.join.order_key,
        );
    }
    Ok(())
}
