//! Contract location inside multi-contract documents.
//!
//! A contract is anchored by a `ReferenceInformation` block whose
//! `OrderId/IdValue` carries text. The anchor's parent is the contract scope:
//! it also holds the position fields of the same contract.
use crate::config::OrderIdPattern;
use crate::document::{Document, NodeId};
use crate::key::{normalize, NormalizedKey};
use serde::Serialize;

pub const REFERENCE_ANCHOR: &str = "ReferenceInformation";
const ORDER_ID: &str = "OrderId";
const ASSIGNMENT_ID: &str = "AssignmentId";
const ID_VALUE: &str = "IdValue";

/// One contract scope: a handle into the document plus its identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractContext {
    /// Parent of the reference anchor; field lookups start here.
    pub node: NodeId,
    /// Order id text as written in the document (trimmed).
    pub order_id: String,
    pub key: NormalizedKey,
    pub assignment_id: Option<String>,
    /// Scopes of other contracts nested below this one; never searched.
    pub nested: Vec<NodeId>,
}

/// A parent holding several valid reference anchors. Its sub-scopes cannot
/// be told apart, so none of its contracts is processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmbiguousScope {
    #[serde(skip)]
    pub node: NodeId,
    pub path: String,
    pub order_ids: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LocateResult {
    pub contracts: Vec<ContractContext>,
    pub ambiguous: Vec<AmbiguousScope>,
    /// Order ids found in anchors that match none of the accepted patterns.
    pub ignored_order_ids: Vec<String>,
}

struct Anchor {
    node: NodeId,
    order_id: String,
    key: NormalizedKey,
}

/// Find every contract scope of `doc`, in document order.
pub fn locate(doc: &Document, patterns: &[OrderIdPattern]) -> LocateResult {
    let mut result = LocateResult::default();
    let mut groups: Vec<(NodeId, Vec<Anchor>)> = Vec::new();

    for node in doc.descendants(doc.root()) {
        if doc.local_name(node) != Some(REFERENCE_ANCHOR) {
            continue;
        }
        let Some(order_id) = id_value(doc, node, ORDER_ID) else {
            continue;
        };
        let Some(parent) = doc.parent(node) else {
            continue;
        };
        let key = normalize(&order_id);
        if !patterns.iter().any(|pattern| pattern.matches(&key)) {
            tracing::debug!(order_id = %order_id, "order id matches no accepted pattern; ignored");
            result.ignored_order_ids.push(order_id);
            continue;
        }
        let anchor = Anchor {
            node,
            order_id,
            key,
        };
        match groups.iter_mut().find(|(scope, _)| *scope == parent) {
            Some((_, anchors)) => anchors.push(anchor),
            None => groups.push((parent, vec![anchor])),
        }
    }

    for (scope, mut anchors) in groups {
        if anchors.len() > 1 {
            let ambiguous = AmbiguousScope {
                node: scope,
                path: doc.path_of(scope),
                order_ids: anchors.into_iter().map(|anchor| anchor.order_id).collect(),
            };
            tracing::warn!(
                path = %ambiguous.path,
                order_ids = ?ambiguous.order_ids,
                "several contracts share one scope; left untouched"
            );
            result.ambiguous.push(ambiguous);
            continue;
        }
        let Some(anchor) = anchors.pop() else {
            continue;
        };
        result.contracts.push(ContractContext {
            node: scope,
            assignment_id: id_value(doc, anchor.node, ASSIGNMENT_ID),
            order_id: anchor.order_id,
            key: anchor.key,
            nested: Vec::new(),
        });
    }

    let scopes: Vec<NodeId> = result
        .contracts
        .iter()
        .map(|contract| contract.node)
        .chain(result.ambiguous.iter().map(|scope| scope.node))
        .collect();
    for contract in &mut result.contracts {
        contract.nested = scopes
            .iter()
            .copied()
            .filter(|scope| *scope != contract.node && is_ancestor(doc, contract.node, *scope))
            .collect();
    }

    tracing::debug!(
        contracts = result.contracts.len(),
        ambiguous = result.ambiguous.len(),
        ignored = result.ignored_order_ids.len(),
        "contracts located"
    );
    result
}

/// First non-empty `<container>/IdValue` text directly under `anchor`.
fn id_value(doc: &Document, anchor: NodeId, container: &str) -> Option<String> {
    doc.children_by_local_name(anchor, container)
        .flat_map(|node| doc.children_by_local_name(node, ID_VALUE))
        .map(|node| doc.text(node).trim().to_string())
        .find(|text| !text.is_empty())
}

fn is_ancestor(doc: &Document, ancestor: NodeId, node: NodeId) -> bool {
    std::iter::successors(doc.parent(node), |current| doc.parent(*current))
        .any(|current| current == ancestor)
}
