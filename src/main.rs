use anyhow::Result;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod batch;
mod cli;
mod config;
mod document;
mod engine;
mod key;
mod locate;
mod output;
mod report;
mod resolve;
mod table;
mod upsert;
mod workflow;

use cli::{Command, RootArgs};

fn main() -> Result<()> {
    let cli = RootArgs::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Command::Enrich(args) => workflow::run_enrich(args),
        Command::Batch(args) => workflow::run_batch_command(args),
        Command::Locate(args) => workflow::run_locate(args),
        Command::CheckTable(args) => workflow::run_check_table(args),
        Command::InitConfig(args) => workflow::run_init_config(args),
    }
}
