//! Many-document runs on a scoped worker pool.
//!
//! Documents are independent; workers share the read-only order table and
//! options, and each document owns its tree exclusively. One document's
//! failure is recorded and never stops the others.
use crate::engine::{enrich_document, EnrichOptions};
use crate::output::write_atomic;
use crate::report::RunSummary;
use crate::table::OrderTable;
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub input: PathBuf,
    pub output: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub documents: usize,
    pub failed: usize,
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    pub fn succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Map every input to `<out_dir>/<file name>`. Two inputs with the same
/// file name would overwrite each other, so that is rejected up front.
pub fn plan_jobs(inputs: &[PathBuf], out_dir: &Path) -> Result<Vec<BatchJob>> {
    let mut seen = BTreeSet::new();
    let mut jobs = Vec::with_capacity(inputs.len());
    for input in inputs {
        let Some(name) = input.file_name() else {
            bail!("input {} has no file name", input.display());
        };
        if !seen.insert(name.to_os_string()) {
            bail!(
                "several inputs are named {}; outputs would collide in {}",
                name.to_string_lossy(),
                out_dir.display()
            );
        }
        jobs.push(BatchJob {
            input: input.clone(),
            output: out_dir.join(name),
        });
    }
    Ok(jobs)
}

/// Worker count: the requested one, else the machine's parallelism,
/// never more than there are jobs.
pub fn worker_count(requested: Option<usize>, jobs: usize) -> usize {
    let available = thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    requested.unwrap_or(available).clamp(1, jobs.max(1))
}

pub fn run_batch(
    jobs: &[BatchJob],
    table: &OrderTable,
    options: &EnrichOptions,
    workers: usize,
) -> BatchReport {
    let next = AtomicUsize::new(0);
    let slots: Mutex<Vec<Option<BatchItem>>> = Mutex::new(vec![None; jobs.len()]);
    tracing::info!(documents = jobs.len(), workers, "batch started");

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let index = next.fetch_add(1, Ordering::Relaxed);
                let Some(job) = jobs.get(index) else {
                    break;
                };
                let item = run_job(job, table, options);
                if let Ok(mut slots) = slots.lock() {
                    slots[index] = Some(item);
                }
            });
        }
    });

    let slots = slots.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
    let items: Vec<BatchItem> = slots
        .into_iter()
        .zip(jobs)
        .map(|(slot, job)| {
            slot.unwrap_or_else(|| BatchItem {
                input: job.input.clone(),
                output: job.output.clone(),
                summary: None,
                error: Some("document was not processed".to_string()),
            })
        })
        .collect();
    let failed = items.iter().filter(|item| item.error.is_some()).count();
    tracing::info!(documents = items.len(), failed, "batch finished");
    BatchReport {
        documents: items.len(),
        failed,
        items,
    }
}

fn run_job(job: &BatchJob, table: &OrderTable, options: &EnrichOptions) -> BatchItem {
    let (summary, error) = match enrich_file(job, table, options) {
        Ok(summary) => (Some(summary), None),
        Err(err) => {
            tracing::error!(input = %job.input.display(), error = %format!("{err:#}"), "document failed");
            (None, Some(format!("{err:#}")))
        }
    };
    BatchItem {
        input: job.input.clone(),
        output: job.output.clone(),
        summary,
        error,
    }
}

fn enrich_file(job: &BatchJob, table: &OrderTable, options: &EnrichOptions) -> Result<RunSummary> {
    let bytes =
        fs::read(&job.input).with_context(|| format!("read {}", job.input.display()))?;
    let enriched = enrich_document(&bytes, table, options)
        .with_context(|| format!("parse {}", job.input.display()))?;
    write_atomic(&job.output, &enriched.bytes)?;
    Ok(enriched.summary)
}
