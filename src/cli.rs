//! CLI argument parsing for the enrichment commands.
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "hrxe",
    version,
    about = "Enrich HR-XML staffing contracts from an order table",
    after_help = "Examples:\n  hrxe enrich --input contracts.xml --table orders.json\n  hrxe enrich --input contracts.xml --table orders.json --recap recap.csv --json\n  hrxe batch --table orders.json --out-dir enriched/ in/*.xml\n  hrxe locate --input contracts.xml\n  hrxe init-config --out hrxe.json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Log filter for stderr diagnostics (e.g. `info`, `hrxe=debug`)
    #[arg(long, global = true, value_name = "FILTER", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Enrich(EnrichArgs),
    Batch(BatchArgs),
    Locate(LocateArgs),
    CheckTable(CheckTableArgs),
    InitConfig(InitConfigArgs),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum RecapFormat {
    #[default]
    Csv,
    Json,
}

#[derive(Parser, Debug)]
#[command(about = "Enrich one document")]
pub struct EnrichArgs {
    /// Document to enrich
    #[arg(long, value_name = "XML")]
    pub input: PathBuf,

    /// Order table (JSON array of rows or mapping keyed by order id)
    #[arg(long, value_name = "JSON")]
    pub table: PathBuf,

    /// Enricher config; built-in defaults when omitted
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output document (default: <input stem>.enriched.xml beside the input)
    #[arg(long, value_name = "XML")]
    pub out: Option<PathBuf>,

    /// Write a per-contract recap
    #[arg(long, value_name = "PATH")]
    pub recap: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = RecapFormat::Csv, requires = "recap")]
    pub recap_format: RecapFormat,

    /// Write the run summary as JSON
    #[arg(long, value_name = "PATH")]
    pub summary: Option<PathBuf>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Enrich many independent documents in parallel")]
pub struct BatchArgs {
    #[arg(long, value_name = "JSON")]
    pub table: PathBuf,

    /// Directory receiving one enriched document per input
    #[arg(long, value_name = "DIR")]
    pub out_dir: PathBuf,

    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Worker threads (default: available parallelism)
    #[arg(long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,

    #[arg(value_name = "XML", required = true)]
    pub inputs: Vec<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "List detected contracts without modifying anything")]
pub struct LocateArgs {
    #[arg(long, value_name = "XML")]
    pub input: PathBuf,

    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Load and validate an order table")]
pub struct CheckTableArgs {
    #[arg(long, value_name = "JSON")]
    pub table: PathBuf,

    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Write the default enricher config")]
pub struct InitConfigArgs {
    /// Destination file; the config is printed to stdout when omitted
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// Overwrite an existing config
    #[arg(long)]
    pub force: bool,
}
