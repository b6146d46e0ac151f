//! Per-contract field resolution: decide the coefficient, status code and
//! status description of one contract and write them into its scope.
use crate::config::{compile_classification_pattern, ConfigError, EnricherConfig};
use crate::document::{Document, NodeId};
use crate::locate::ContractContext;
use crate::report::EnrichmentOutcome;
use crate::table::OrderRecord;
use crate::upsert::{assign_all, assign_first, UpsertError};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

pub const COEFFICIENT_PATH: [&str; 2] = ["PositionCharacteristics", "PositionCoefficient"];
pub const LEVEL_PATH: [&str; 2] = ["PositionCharacteristics", "PositionLevel"];
pub const STATUS_CODE_PATH: [&str; 3] = ["PositionCharacteristics", "PositionStatus", "Code"];
pub const STATUS_DESCRIPTION_PATH: [&str; 3] =
    ["PositionCharacteristics", "PositionStatus", "Description"];

/// The three fields the enricher is allowed to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetField {
    Coefficient,
    StatusCode,
    StatusDescription,
}

impl TargetField {
    pub fn path(self) -> &'static [&'static str] {
        match self {
            TargetField::Coefficient => &COEFFICIENT_PATH,
            TargetField::StatusCode => &STATUS_CODE_PATH,
            TargetField::StatusDescription => &STATUS_DESCRIPTION_PATH,
        }
    }
}

/// Which policy produced a contract's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionNote {
    ExternalRecord,
    PositionLevelFallback,
    NoRecord,
}

impl ResolutionNote {
    pub fn as_str(self) -> &'static str {
        match self {
            ResolutionNote::ExternalRecord => "from external record",
            ResolutionNote::PositionLevelFallback => "copié depuis PositionLevel",
            ResolutionNote::NoRecord => "",
        }
    }
}

impl fmt::Display for ResolutionNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trimmed text of one field before and after resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub before: String,
    pub after: String,
}

impl FieldChange {
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

/// Injected business tables consulted by the resolver.
#[derive(Debug, Clone)]
pub struct ResolverRules {
    pub classification_pattern: Regex,
    pub status_labels: BTreeMap<String, String>,
}

impl ResolverRules {
    pub fn from_config(config: &EnricherConfig) -> Result<ResolverRules, ConfigError> {
        Ok(ResolverRules {
            classification_pattern: compile_classification_pattern(config)?,
            status_labels: config.status_labels.clone(),
        })
    }
}

/// Status code of a `CODE - Label` value: the text before the first
/// hyphen, or the whole value without one. The label part is not used.
pub fn split_status(status: &str) -> String {
    let code = status.split_once('-').map_or(status, |(code, _)| code);
    code.trim().to_string()
}

struct Assignment {
    field: TargetField,
    value: String,
}

/// Resolve and write the fields of `contract`, returning its outcome.
///
/// Values and write targets are checked before the first write, so a
/// defect leaves the whole contract untouched and is recorded on the
/// outcome instead of aborting the run.
pub fn resolve_contract(
    doc: &mut Document,
    contract: &ContractContext,
    record: Option<&OrderRecord>,
    rules: &ResolverRules,
) -> EnrichmentOutcome {
    let pruned = contract.nested.as_slice();
    let scope = contract.node;
    let before_coefficient = field_text(doc, scope, &COEFFICIENT_PATH, pruned);
    let before_code = field_text(doc, scope, &STATUS_CODE_PATH, pruned);
    let before_description = field_text(doc, scope, &STATUS_DESCRIPTION_PATH, pruned);
    let level = field_text(doc, scope, &LEVEL_PATH, pruned);

    let mut assignments = Vec::new();
    let mut note = match record {
        Some(_) => ResolutionNote::ExternalRecord,
        None => ResolutionNote::NoRecord,
    };

    match record {
        Some(record) => {
            if let Some(classification) = non_empty(record.classification.as_deref()) {
                assignments.push(Assignment {
                    field: TargetField::Coefficient,
                    value: classification.to_string(),
                });
            }
            let code = record
                .status
                .as_deref()
                .map(split_status)
                .unwrap_or_default();
            if !code.is_empty() {
                assignments.push(Assignment {
                    field: TargetField::StatusCode,
                    value: code.clone(),
                });
            }
            let description = non_empty(record.status_description.as_deref())
                .map(str::to_string)
                .or_else(|| rules.status_labels.get(&code).cloned());
            if let Some(description) = description.filter(|text| !text.trim().is_empty()) {
                assignments.push(Assignment {
                    field: TargetField::StatusDescription,
                    value: description.trim().to_string(),
                });
            }
        }
        None => {
            if before_coefficient.is_empty() && rules.classification_pattern.is_match(&level) {
                note = ResolutionNote::PositionLevelFallback;
                assignments.push(Assignment {
                    field: TargetField::Coefficient,
                    value: level.clone(),
                });
            }
        }
    }

    let error = apply(doc, scope, &assignments, pruned).err();
    if let Some(err) = &error {
        tracing::error!(order_id = %contract.order_id, error = %err, "contract write failed");
    }

    let outcome = EnrichmentOutcome {
        order_id: contract.order_id.clone(),
        assignment_id: contract.assignment_id.clone(),
        matched: record.is_some(),
        coefficient: FieldChange {
            before: before_coefficient,
            after: field_text(doc, scope, &COEFFICIENT_PATH, pruned),
        },
        status_code: FieldChange {
            before: before_code,
            after: field_text(doc, scope, &STATUS_CODE_PATH, pruned),
        },
        status_description: FieldChange {
            before: before_description,
            after: field_text(doc, scope, &STATUS_DESCRIPTION_PATH, pruned),
        },
        note,
        error: error.map(|err| err.to_string()),
    };
    tracing::debug!(
        order_id = %outcome.order_id,
        matched = outcome.matched,
        note = %outcome.note,
        changed = outcome.changed(),
        "contract resolved"
    );
    outcome
}

/// Write every assignment, or none of them when a target is unusable.
fn apply(
    doc: &mut Document,
    scope: NodeId,
    assignments: &[Assignment],
    pruned: &[NodeId],
) -> Result<(), UpsertError> {
    check_targets(doc, scope, assignments, pruned)?;
    for assignment in assignments {
        let path = assignment.field.path();
        match assignment.field {
            // Status blocks may be duplicated; keep every copy consistent.
            TargetField::StatusCode | TargetField::StatusDescription => {
                assign_all(doc, scope, path, &assignment.value, pruned)?;
            }
            TargetField::Coefficient => {
                assign_first(doc, scope, path, &assignment.value, pruned)?;
            }
        }
    }
    Ok(())
}

fn check_targets(
    doc: &Document,
    scope: NodeId,
    assignments: &[Assignment],
    pruned: &[NodeId],
) -> Result<(), UpsertError> {
    if !doc.is_element(scope) {
        return Err(UpsertError::NotAnElement(doc.path_of(scope)));
    }
    for assignment in assignments {
        let path = assignment.field.path();
        if path.is_empty() {
            return Err(UpsertError::EmptyPath);
        }
        let existing = doc.select_pruned(scope, path, pruned);
        if let Some(node) = existing.into_iter().find(|node| !doc.is_element(*node)) {
            return Err(UpsertError::NotAnElement(doc.path_of(node)));
        }
    }
    Ok(())
}

fn field_text(doc: &Document, scope: NodeId, path: &[&str], pruned: &[NodeId]) -> String {
    doc.select_pruned(scope, path, pruned)
        .first()
        .map(|node| doc.text(*node).trim().to_string())
        .unwrap_or_default()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod tests;
