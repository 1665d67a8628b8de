pub mod adapters;
pub mod aggregate;
pub mod category;
pub mod cli;
pub mod config;
pub mod countries;
pub mod data;
pub mod fetch;
pub mod io_utils;
pub mod period;
pub mod pipeline;
pub mod ranking;
pub mod report;
pub mod reshape;
pub mod rows;
pub mod sink;
pub mod tables;

use std::{env, fs, io::Write, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    category::CategoryTagger,
    cli::{Cli, Commands, OutputFormat},
    config::PipelineConfig,
    fetch::{HttpFetcher, HttpTimeouts},
    sink::{CsvDirSink, SqlScriptSink, TableSink},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("food_insecurity_etl", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => handle_run(&args),
        Commands::Rank(args) => handle_rank(&args),
        Commands::Pivot(args) => handle_pivot(&args),
        Commands::Config(args) => handle_config(&args),
        Commands::Sources(args) => handle_sources(&args),
    }
}

fn handle_run(args: &cli::RunArgs) -> Result<()> {
    let config = PipelineConfig::load_or_default(args.config.as_deref())?;
    let registry = adapters::default_registry(&config)?;
    let adapters = pipeline::select_adapters(registry, &args.only)?;
    let fetcher = HttpFetcher::new(HttpTimeouts::from_secs(
        args.connect_timeout_secs,
        args.timeout_secs,
        args.bulk_timeout_secs,
    )?)?;
    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Creating output directory {:?}", args.output_dir))?;
    let mut sink: Box<dyn TableSink> = match args.format {
        OutputFormat::Csv => Box::new(CsvDirSink::new(&args.output_dir)),
        OutputFormat::Sql => Box::new(SqlScriptSink::new(&args.output_dir)),
    };
    info!("Writing {:?} output to {:?}", args.format, args.output_dir);
    let report = pipeline::run(&config, &adapters, &fetcher, sink.as_mut())?;
    print!("{}", report::render_run_report(&report));
    Ok(())
}

fn read_final(path: &std::path::Path) -> Result<data::CanonicalTable> {
    let raw = io_utils::read_raw_table_from_path(path)?;
    tables::canonical_from_raw(&raw).with_context(|| format!("Reading Final table {path:?}"))
}

fn handle_rank(args: &cli::RankArgs) -> Result<()> {
    let config = PipelineConfig::load_or_default(args.config.as_deref())?;
    let mut table = aggregate::concat([read_final(&args.input)?.records])?;
    table.drop_missing();
    let tagger = CategoryTagger::from_config(&config.categories);
    let (full, unmatched) = tagger.tag(ranking::rank_changes(&table));
    sink::write_csv(&args.output, &tables::full_columns(), &tables::full_rows(&full))
        .with_context(|| format!("Writing {:?}", args.output))?;
    info!(
        "Ranked {} row(s) into {:?} ({} indicator(s) without a category)",
        full.len(),
        args.output,
        unmatched.len()
    );
    Ok(())
}

fn handle_pivot(args: &cli::PivotArgs) -> Result<()> {
    let table = read_final(&args.input)?;
    let pivoted = aggregate::pivot(&table)?;
    sink::write_csv(
        &args.output,
        &tables::pivoted_columns(&pivoted),
        &tables::pivoted_rows(&pivoted),
    )
    .with_context(|| format!("Writing {:?}", args.output))?;
    info!(
        "Pivoted {} row(s) into {} row(s) x {} column(s)",
        table.len(),
        pivoted.rows.len(),
        pivoted.column_count()
    );
    Ok(())
}

fn handle_config(args: &cli::ConfigArgs) -> Result<()> {
    let config = PipelineConfig::default();
    match &args.output {
        Some(path) => {
            config.save(path)?;
            info!("Default configuration written to {path:?}");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(config.to_yaml()?.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn handle_sources(args: &cli::SourcesArgs) -> Result<()> {
    let config = PipelineConfig::load_or_default(args.config.as_deref())?;
    let registry = adapters::default_registry(&config)?;
    print!("{}", report::render_sources(&registry));
    Ok(())
}
