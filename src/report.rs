//! Run reporting: per-contract outcomes, the recap table and the run summary.
use crate::locate::{AmbiguousScope, LocateResult};
use crate::resolve::{FieldChange, ResolutionNote};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// What happened to one contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichmentOutcome {
    pub order_id: String,
    pub assignment_id: Option<String>,
    pub matched: bool,
    pub coefficient: FieldChange,
    pub status_code: FieldChange,
    pub status_description: FieldChange,
    pub note: ResolutionNote,
    /// Write defect isolated to this contract.
    pub error: Option<String>,
}

impl EnrichmentOutcome {
    pub fn changed(&self) -> bool {
        self.coefficient.changed() || self.status_code.changed() || self.status_description.changed()
    }

    pub fn recap_row(&self) -> RecapRow {
        RecapRow {
            order_id: self.order_id.clone(),
            assignment_id: self.assignment_id.clone().unwrap_or_default(),
            coefficient_before: self.coefficient.before.clone(),
            coefficient_after: self.coefficient.after.clone(),
            status_code_before: self.status_code.before.clone(),
            status_code_after: self.status_code.after.clone(),
            status_description_before: self.status_description.before.clone(),
            status_description_after: self.status_description.after.clone(),
            matched: self.matched,
            note: self.note.as_str().to_string(),
            error: self.error.clone().unwrap_or_default(),
        }
    }
}

/// Flat recap line, one per contract, for CSV or JSON export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecapRow {
    pub order_id: String,
    pub assignment_id: String,
    pub coefficient_before: String,
    pub coefficient_after: String,
    pub status_code_before: String,
    pub status_code_after: String,
    pub status_description_before: String,
    pub status_description_after: String,
    pub matched: bool,
    pub note: String,
    pub error: String,
}

pub const ZERO_UPDATE_WARNING: &str =
    "order records were loaded but no field was updated; check key normalization and column mapping";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub contracts_detected: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub unmatched_with_fallback: usize,
    pub coefficient_updates: usize,
    pub status_code_updates: usize,
    pub status_description_updates: usize,
    pub failed_contracts: usize,
    pub modified_ids_sample: Vec<String>,
    pub unmatched_sample: Vec<String>,
    pub ignored_order_ids: Vec<String>,
    pub ambiguous_scopes: Vec<AmbiguousScope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl RunSummary {
    pub fn field_updates(&self) -> usize {
        self.coefficient_updates + self.status_code_updates + self.status_description_updates
    }

    /// Multi-line human summary for terminal output.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("contracts detected: {}\n", self.contracts_detected));
        out.push_str(&format!(
            "matched: {}; unmatched: {} ({} with PositionLevel fallback)\n",
            self.matched, self.unmatched, self.unmatched_with_fallback
        ));
        out.push_str(&format!(
            "updates: coefficient {}; status code {}; status description {}\n",
            self.coefficient_updates, self.status_code_updates, self.status_description_updates
        ));
        if self.failed_contracts > 0 {
            out.push_str(&format!("failed contracts: {}\n", self.failed_contracts));
        }
        if !self.modified_ids_sample.is_empty() {
            out.push_str(&format!("modified: {}\n", self.modified_ids_sample.join(", ")));
        }
        if !self.unmatched_sample.is_empty() {
            out.push_str(&format!("unmatched: {}\n", self.unmatched_sample.join(", ")));
        }
        if !self.ignored_order_ids.is_empty() {
            out.push_str(&format!(
                "ignored order ids (no accepted pattern): {}\n",
                self.ignored_order_ids.join(", ")
            ));
        }
        for scope in &self.ambiguous_scopes {
            out.push_str(&format!(
                "ambiguous scope {} holds several contracts ({}); not processed\n",
                scope.path,
                scope.order_ids.join(", ")
            ));
        }
        if let Some(warning) = &self.warning {
            out.push_str(&format!("warning: {warning}\n"));
        }
        out
    }
}

/// Aggregate outcomes into the run summary.
pub fn summarize(
    outcomes: &[EnrichmentOutcome],
    located: &LocateResult,
    table_records: usize,
    sample_limit: usize,
) -> RunSummary {
    let mut summary = RunSummary {
        contracts_detected: outcomes.len(),
        ignored_order_ids: located.ignored_order_ids.clone(),
        ambiguous_scopes: located.ambiguous.clone(),
        ..RunSummary::default()
    };
    for outcome in outcomes {
        if outcome.matched {
            summary.matched += 1;
        } else {
            summary.unmatched += 1;
            if outcome.note == ResolutionNote::PositionLevelFallback && outcome.coefficient.changed()
            {
                summary.unmatched_with_fallback += 1;
            }
            if summary.unmatched_sample.len() < sample_limit {
                summary.unmatched_sample.push(outcome.order_id.clone());
            }
        }
        summary.coefficient_updates += usize::from(outcome.coefficient.changed());
        summary.status_code_updates += usize::from(outcome.status_code.changed());
        summary.status_description_updates += usize::from(outcome.status_description.changed());
        summary.failed_contracts += usize::from(outcome.error.is_some());
        if outcome.changed() && summary.modified_ids_sample.len() < sample_limit {
            summary.modified_ids_sample.push(outcome.order_id.clone());
        }
    }
    if table_records > 0 && summary.field_updates() == 0 {
        tracing::warn!(table_records, "{ZERO_UPDATE_WARNING}");
        summary.warning = Some(ZERO_UPDATE_WARNING.to_string());
    }
    summary
}

pub fn recap_rows(outcomes: &[EnrichmentOutcome]) -> Vec<RecapRow> {
    outcomes.iter().map(EnrichmentOutcome::recap_row).collect()
}

pub fn write_recap_csv<W: Write>(rows: &[RecapRow], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for row in rows {
        csv.serialize(row).context("serialize recap row")?;
    }
    csv.flush().context("flush recap CSV")?;
    Ok(())
}

pub fn write_recap_json<W: Write>(rows: &[RecapRow], writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, rows).context("serialize recap JSON")?;
    Ok(())
}
