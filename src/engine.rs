//! One-document enrichment pipeline: parse, locate, resolve, summarize, write.
use crate::config::{ConfigError, EnricherConfig, OrderIdPattern};
use crate::document::{Document, ParseError};
use crate::locate::{locate, LocateResult};
use crate::report::{summarize, EnrichmentOutcome, RunSummary};
use crate::resolve::{resolve_contract, ResolverRules};
use crate::table::OrderTable;

/// Everything the pipeline needs besides the document and the table.
#[derive(Debug, Clone)]
pub struct EnrichOptions {
    pub order_id_patterns: Vec<OrderIdPattern>,
    pub rules: ResolverRules,
    pub sample_limit: usize,
}

impl EnrichOptions {
    pub fn from_config(config: &EnricherConfig) -> Result<EnrichOptions, ConfigError> {
        Ok(EnrichOptions {
            order_id_patterns: config.order_id_patterns.clone(),
            rules: ResolverRules::from_config(config)?,
            sample_limit: config.sample_limit,
        })
    }
}

#[derive(Debug)]
pub struct EnrichedDocument {
    /// Serialized output in the input's declared encoding.
    pub bytes: Vec<u8>,
    pub outcomes: Vec<EnrichmentOutcome>,
    pub summary: RunSummary,
    pub encoding: String,
    /// Malformed-markup repairs made while parsing.
    pub recovered_issues: usize,
}

/// Enrich one serialized document against `table`.
///
/// Only a fatal parse error aborts; per-contract write defects are carried
/// on their outcomes.
pub fn enrich_document(
    bytes: &[u8],
    table: &OrderTable,
    options: &EnrichOptions,
) -> Result<EnrichedDocument, ParseError> {
    let mut doc = Document::parse(bytes)?;
    let located = locate(&doc, &options.order_id_patterns);
    let outcomes = enrich_located(&mut doc, &located, table, options);
    let summary = summarize(&outcomes, &located, table.len(), options.sample_limit);
    tracing::info!(
        contracts = summary.contracts_detected,
        matched = summary.matched,
        unmatched = summary.unmatched,
        updates = summary.field_updates(),
        "document enriched"
    );
    Ok(EnrichedDocument {
        bytes: doc.to_bytes(),
        outcomes,
        summary,
        encoding: doc.encoding_label().to_string(),
        recovered_issues: doc.recovered_issues(),
    })
}

/// Resolve every located contract of `doc` in document order.
pub fn enrich_located(
    doc: &mut Document,
    located: &LocateResult,
    table: &OrderTable,
    options: &EnrichOptions,
) -> Vec<EnrichmentOutcome> {
    located
        .contracts
        .iter()
        .map(|contract| {
            let record = table.get(&contract.key);
            resolve_contract(doc, contract, record, &options.rules)
        })
        .collect()
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
