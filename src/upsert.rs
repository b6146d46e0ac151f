//! Locate-or-create writes on local-name element paths.
use crate::document::{Document, NodeId};

/// Defects that stop a single contract's write; other contracts continue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpsertError {
    #[error("upsert path is empty")]
    EmptyPath,
    #[error("upsert target {0} is not an element")]
    NotAnElement(String),
}

/// Walk `path` from `node` through direct children, creating missing
/// segments, then set the last segment's text to `value`.
///
/// Created elements take the nearest enclosing default namespace. Existing
/// children are always reused, so repeated calls never add siblings.
/// Returns whether the tree changed.
pub fn upsert(
    doc: &mut Document,
    node: NodeId,
    path: &[&str],
    value: &str,
) -> Result<bool, UpsertError> {
    if path.is_empty() {
        return Err(UpsertError::EmptyPath);
    }
    if !doc.is_element(node) {
        return Err(UpsertError::NotAnElement(doc.path_of(node)));
    }
    let mut current = node;
    let mut changed = false;
    for segment in path {
        current = match doc.first_child_by_local_name(current, segment) {
            Some(child) => child,
            None => {
                changed = true;
                doc.append_element(current, segment)
                    .ok_or_else(|| UpsertError::NotAnElement(doc.path_of(current)))?
            }
        };
    }
    if doc.text(current) != value {
        doc.set_text(current, value);
        changed = true;
    }
    Ok(changed)
}

/// Upsert `path` inside `scope`, starting from the deepest existing prefix.
///
/// The prefix is searched like [`Document::select_pruned`] (first segment at any
/// depth), so a contract whose `PositionCharacteristics` sits below an
/// intermediate element gets the new leaf there rather than a second
/// `PositionCharacteristics` directly under the scope.
pub fn upsert_within(
    doc: &mut Document,
    scope: NodeId,
    path: &[&str],
    value: &str,
    pruned: &[NodeId],
) -> Result<bool, UpsertError> {
    for split in (1..path.len()).rev() {
        if let Some(base) = doc.select_pruned(scope, &path[..split], pruned).first().copied() {
            return upsert(doc, base, &path[split..], value);
        }
    }
    upsert(doc, scope, path, value)
}

/// Set the first existing `path` match, or create one.
pub fn assign_first(
    doc: &mut Document,
    scope: NodeId,
    path: &[&str],
    value: &str,
    pruned: &[NodeId],
) -> Result<bool, UpsertError> {
    match doc.select_pruned(scope, path, pruned).first().copied() {
        Some(node) => set_if_different(doc, node, value),
        None => upsert_within(doc, scope, path, value, pruned),
    }
}

/// Set every existing `path` match, or create one when there is none.
pub fn assign_all(
    doc: &mut Document,
    scope: NodeId,
    path: &[&str],
    value: &str,
    pruned: &[NodeId],
) -> Result<bool, UpsertError> {
    let nodes = doc.select_pruned(scope, path, pruned);
    if nodes.is_empty() {
        return upsert_within(doc, scope, path, value, pruned);
    }
    let mut changed = false;
    for node in nodes {
        changed |= set_if_different(doc, node, value)?;
    }
    Ok(changed)
}

fn set_if_different(doc: &mut Document, node: NodeId, value: &str) -> Result<bool, UpsertError> {
    if doc.text(node) == value {
        return Ok(false);
    }
    if !doc.set_text(node, value) {
        return Err(UpsertError::NotAnElement(doc.path_of(node)));
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COEFFICIENT: [&str; 2] = ["PositionCharacteristics", "PositionCoefficient"];

    fn parse(xml: &str) -> Document {
        Document::parse(xml.as_bytes()).expect("parse")
    }

    #[test]
    fn creates_missing_path_in_enclosing_namespace() {
        let mut doc = parse(r#"<Root xmlns="urn:x"><Contract xmlns="urn:y"/></Root>"#);
        let contract = doc.first_child_by_local_name(doc.root(), "Contract").expect("contract");
        assert_eq!(upsert(&mut doc, contract, &COEFFICIENT, "A2"), Ok(true));

        let out = String::from_utf8(doc.to_bytes()).expect("utf-8");
        assert!(out.contains(
            "<Contract xmlns=\"urn:y\">\n    <PositionCharacteristics>\n      <PositionCoefficient>A2</PositionCoefficient>"
        ));
        let created = doc.select_first(contract, &COEFFICIENT).expect("created");
        assert_eq!(doc.nearest_default_namespace(created), Some("urn:y"));
    }

    #[test]
    fn reuses_existing_prefixed_elements() {
        let mut doc = parse(
            r#"<h:Contract xmlns:h="urn:h"><h:PositionCharacteristics><h:PositionCoefficient>old</h:PositionCoefficient></h:PositionCharacteristics></h:Contract>"#,
        );
        let root = doc.root();
        assert_eq!(upsert(&mut doc, root, &COEFFICIENT, "B1"), Ok(true));
        let nodes = doc.select(root, &COEFFICIENT);
        assert_eq!(nodes.len(), 1);
        assert_eq!(doc.text(nodes[0]), "B1");
        assert_eq!(
            doc.element(nodes[0]).map(|e| e.name.as_str()),
            Some("h:PositionCoefficient")
        );
    }

    #[test]
    fn upsert_is_idempotent() {
        let mut doc = parse("<Contract/>");
        let root = doc.root();
        assert_eq!(upsert(&mut doc, root, &COEFFICIENT, "C4"), Ok(true));
        let once = doc.to_bytes();
        assert_eq!(upsert(&mut doc, root, &COEFFICIENT, "C4"), Ok(false));
        assert_eq!(doc.to_bytes(), once);
        assert_eq!(doc.children_by_local_name(root, "PositionCharacteristics").count(), 1);
    }

    #[test]
    fn rejects_empty_paths() {
        let mut doc = parse("<Contract/>");
        let root = doc.root();
        assert_eq!(upsert(&mut doc, root, &[], "x"), Err(UpsertError::EmptyPath));
    }

    #[test]
    fn upsert_within_extends_nested_prefix() {
        let mut doc = parse(
            "<Contract><Detail><PositionCharacteristics><PositionStatus/></PositionCharacteristics></Detail></Contract>",
        );
        let root = doc.root();
        let path = ["PositionCharacteristics", "PositionStatus", "Code"];
        assert_eq!(upsert_within(&mut doc, root, &path, "OP", &[]), Ok(true));
        assert_eq!(doc.children_by_local_name(root, "PositionCharacteristics").count(), 0);
        assert_eq!(doc.select_text(root, &path), "OP");
    }

    #[test]
    fn assign_all_updates_every_match() {
        let mut doc = parse(
            "<Contract><PositionCharacteristics>\
               <PositionStatus><Code>X</Code></PositionStatus>\
               <PositionStatus><Code>Y</Code></PositionStatus>\
             </PositionCharacteristics></Contract>",
        );
        let root = doc.root();
        let path = ["PositionCharacteristics", "PositionStatus", "Code"];
        assert_eq!(assign_all(&mut doc, root, &path, "OP", &[]), Ok(true));
        let codes: Vec<String> = doc
            .select(root, &path)
            .into_iter()
            .map(|node| doc.text(node))
            .collect();
        assert_eq!(codes, vec!["OP".to_string(), "OP".to_string()]);
        assert_eq!(assign_all(&mut doc, root, &path, "OP", &[]), Ok(false));
    }

    #[test]
    fn pruned_scopes_are_not_written() {
        let mut doc = parse(
            "<Outer><Inner><PositionCharacteristics><PositionCoefficient>Z9</PositionCoefficient></PositionCharacteristics></Inner></Outer>",
        );
        let root = doc.root();
        let inner = doc.first_child_by_local_name(root, "Inner").expect("inner");
        assert_eq!(assign_first(&mut doc, root, &COEFFICIENT, "A1", &[inner]), Ok(true));
        assert_eq!(doc.select_text(inner, &COEFFICIENT), "Z9");
        let direct = doc
            .first_child_by_local_name(root, "PositionCharacteristics")
            .expect("created under outer");
        assert_eq!(doc.select_text(root, &["PositionCharacteristics", "PositionCoefficient"]), "Z9");
        assert_eq!(
            doc.first_child_by_local_name(direct, "PositionCoefficient")
                .map(|node| doc.text(node)),
            Some("A1".to_string())
        );
    }
}
