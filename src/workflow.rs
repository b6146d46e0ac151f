use crate::batch::{plan_jobs, run_batch, worker_count};
use crate::cli::{BatchArgs, CheckTableArgs, EnrichArgs, InitConfigArgs, LocateArgs};
use crate::config::{config_stub, default_config, load_or_default, write_config, EnricherConfig};
use crate::document::Document;
use crate::engine::{enrich_document, EnrichOptions};
use crate::locate::{locate, AmbiguousScope};
use crate::output::{default_output_path, write_atomic, write_json, write_recap};
use crate::report::recap_rows;
use crate::table::{load_table, OrderTable};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

pub fn run_enrich(args: EnrichArgs) -> Result<()> {
    let config = load_or_default(args.config.as_deref())?;
    let (table, options) = prepare(&args.table, &config)?;
    let bytes = fs::read(&args.input).with_context(|| format!("read {}", args.input.display()))?;
    let enriched = enrich_document(&bytes, &table, &options)
        .with_context(|| format!("parse {}", args.input.display()))?;

    let out = args
        .out
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input));
    write_atomic(&out, &enriched.bytes)?;
    eprintln!("wrote {}", out.display());
    if let Some(recap) = &args.recap {
        write_recap(recap, &recap_rows(&enriched.outcomes), args.recap_format)?;
        eprintln!("wrote {}", recap.display());
    }
    if let Some(summary) = &args.summary {
        write_json(summary, &enriched.summary)
            .with_context(|| format!("write summary {}", summary.display()))?;
        eprintln!("wrote {}", summary.display());
    }

    if args.json {
        let text =
            serde_json::to_string_pretty(&enriched.summary).context("serialize run summary")?;
        println!("{text}");
    } else {
        println!("output encoding: {}", enriched.encoding);
        print!("{}", enriched.summary.render_text());
        if enriched.recovered_issues > 0 {
            println!("recovered markup issues: {}", enriched.recovered_issues);
        }
    }
    Ok(())
}

pub fn run_batch_command(args: BatchArgs) -> Result<()> {
    let config = load_or_default(args.config.as_deref())?;
    let (table, options) = prepare(&args.table, &config)?;
    let jobs = plan_jobs(&args.inputs, &args.out_dir)?;
    let workers = worker_count(args.jobs, jobs.len());
    let report = run_batch(&jobs, &table, &options, workers);

    if args.json {
        let text = serde_json::to_string_pretty(&report).context("serialize batch report")?;
        println!("{text}");
    } else {
        for item in &report.items {
            match (&item.summary, &item.error) {
                (_, Some(error)) => println!("FAILED {}: {error}", item.input.display()),
                (Some(summary), None) => println!(
                    "ok {} -> {} ({} contracts, {} updates)",
                    item.input.display(),
                    item.output.display(),
                    summary.contracts_detected,
                    summary.field_updates()
                ),
                (None, None) => {}
            }
        }
    }
    if !report.succeeded() {
        return Err(anyhow!(
            "{} of {} documents failed",
            report.failed,
            report.documents
        ));
    }
    Ok(())
}

#[derive(Serialize)]
struct LocatedContract {
    order_id: String,
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    assignment_id: Option<String>,
    path: String,
}

#[derive(Serialize)]
struct LocateReport {
    contracts: Vec<LocatedContract>,
    ambiguous_scopes: Vec<AmbiguousScope>,
    ignored_order_ids: Vec<String>,
}

pub fn run_locate(args: LocateArgs) -> Result<()> {
    let config = load_or_default(args.config.as_deref())?;
    let bytes = fs::read(&args.input).with_context(|| format!("read {}", args.input.display()))?;
    let doc = Document::parse(&bytes).with_context(|| format!("parse {}", args.input.display()))?;
    let located = locate(&doc, &config.order_id_patterns);
    let report = LocateReport {
        contracts: located
            .contracts
            .iter()
            .map(|contract| LocatedContract {
                order_id: contract.order_id.clone(),
                key: contract.key.to_string(),
                assignment_id: contract.assignment_id.clone(),
                path: doc.path_of(contract.node),
            })
            .collect(),
        ambiguous_scopes: located.ambiguous,
        ignored_order_ids: located.ignored_order_ids,
    };

    if args.json {
        let text = serde_json::to_string_pretty(&report).context("serialize locate report")?;
        println!("{text}");
        return Ok(());
    }
    for contract in &report.contracts {
        println!(
            "{}\t{}\t{}",
            contract.order_id,
            contract.assignment_id.as_deref().unwrap_or("-"),
            contract.path
        );
    }
    for scope in &report.ambiguous_scopes {
        println!("ambiguous\t{}\t{}", scope.order_ids.join(","), scope.path);
    }
    for order_id in &report.ignored_order_ids {
        println!("ignored\t{order_id}");
    }
    Ok(())
}

pub fn run_check_table(args: CheckTableArgs) -> Result<()> {
    let config = load_or_default(args.config.as_deref())?;
    let table = load_table(&args.table, &config)?;
    println!("{} order records", table.len());
    Ok(())
}

pub fn run_init_config(args: InitConfigArgs) -> Result<()> {
    let Some(out) = &args.out else {
        println!("{}", config_stub()?);
        return Ok(());
    };
    write_config(out, &default_config(), args.force)?;
    println!("wrote {}", out.display());
    Ok(())
}

fn prepare(table_path: &Path, config: &EnricherConfig) -> Result<(OrderTable, EnrichOptions)> {
    let table = load_table(table_path, config)?;
    let options = EnrichOptions::from_config(config).context("compile enricher rules")?;
    Ok((table, options))
}
