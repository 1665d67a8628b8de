use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Collect World Bank and FAO food-security indicators into ranked tables",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch every source, derive rankings, and write the output tables
    Run(RunArgs),
    /// Rank and categorize an existing Final table offline
    Rank(RankArgs),
    /// Pivot an existing Final table to one column per indicator
    Pivot(PivotArgs),
    /// Print or save the built-in configuration as YAML
    Config(ConfigArgs),
    /// List the registered source adapters and their endpoints
    Sources(SourcesArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One CSV file per table
    Csv,
    /// One transactional SQL script per table
    Sql,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Directory receiving the output tables
    #[arg(short, long = "output-dir")]
    pub output_dir: PathBuf,
    /// Output format for the tables
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,
    /// YAML configuration replacing the built-in defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Only run these adapters (comma separated ids, see `sources`)
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,
    /// Seconds allowed to establish each HTTP connection
    #[arg(long, default_value_t = 30)]
    pub connect_timeout_secs: u64,
    /// Seconds allowed per API request, body included
    #[arg(long, default_value_t = 120)]
    pub timeout_secs: u64,
    /// Seconds allowed per bulk archive download, body included
    #[arg(long, default_value_t = 3600)]
    pub bulk_timeout_secs: u64,
}

#[derive(Debug, Args)]
pub struct RankArgs {
    /// Final table CSV (Country, Year, Indicator, Value)
    #[arg(short, long)]
    pub input: PathBuf,
    /// Destination for the Full_Indicator_Data CSV
    #[arg(short, long)]
    pub output: PathBuf,
    /// YAML configuration providing the category map
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct PivotArgs {
    /// Final table CSV (Country, Year, Indicator, Value)
    #[arg(short, long)]
    pub input: PathBuf,
    /// Destination for the Final_Pivoted CSV
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Write the YAML here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct SourcesArgs {
    /// YAML configuration replacing the built-in defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
