use super::{Document, NodeKind, ParseError};

const NAMESPACED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Envelope xmlns="urn:outer" xmlns:h="urn:hr">
  <h:Body>
    <Assignment xmlns="urn:inner">
      <PositionCharacteristics>
        <PositionLevel>B3</PositionLevel>
      </PositionCharacteristics>
    </Assignment>
  </h:Body>
</Envelope>
"#;

fn parse(text: &str) -> Document {
    Document::parse(text.as_bytes()).expect("parse document")
}

fn output(doc: &Document) -> String {
    String::from_utf8(doc.to_bytes()).expect("utf-8 output")
}

#[test]
fn child_lookup_ignores_prefixes() {
    let doc = parse(NAMESPACED);
    let root = doc.root();
    let body = doc
        .first_child_by_local_name(root, "Body")
        .expect("prefixed child found by local name");
    assert_eq!(doc.element(body).map(|e| e.name.as_str()), Some("h:Body"));
    assert!(doc.first_child_by_local_name(root, "h:Body").is_none());
}

#[test]
fn select_starts_anywhere_then_follows_children() {
    let doc = parse(NAMESPACED);
    let levels = doc.select(doc.root(), &["PositionCharacteristics", "PositionLevel"]);
    assert_eq!(levels.len(), 1);
    assert_eq!(doc.text(levels[0]), "B3");
    assert_eq!(
        doc.select_text(doc.root(), &["PositionCharacteristics", "PositionLevel"]),
        "B3"
    );
    assert!(doc.select(doc.root(), &["PositionLevel", "PositionCharacteristics"]).is_empty());
}

#[test]
fn select_pruned_skips_nested_scopes() {
    let doc = parse(
        "<Outer><Code>1</Code><Inner><Code>2</Code></Inner><Other><Code>3</Code></Other></Outer>",
    );
    let root = doc.root();
    let inner = doc.first_child_by_local_name(root, "Inner").expect("inner");
    let texts = |nodes: Vec<super::NodeId>| {
        nodes.into_iter().map(|node| doc.text(node)).collect::<Vec<_>>()
    };
    assert_eq!(texts(doc.select_pruned(root, &["Code"], &[])), vec!["1", "2", "3"]);
    assert_eq!(texts(doc.select_pruned(root, &["Code"], &[inner])), vec!["1", "3"]);
    assert!(doc.select_pruned(root, &[], &[]).is_empty());
}

#[test]
fn nearest_default_namespace_prefers_closest_declaration() {
    let doc = parse(NAMESPACED);
    let characteristics = doc
        .select_first(doc.root(), &["PositionCharacteristics"])
        .expect("characteristics");
    assert_eq!(doc.nearest_default_namespace(characteristics), Some("urn:inner"));
    let body = doc.first_child_by_local_name(doc.root(), "Body").expect("body");
    assert_eq!(doc.nearest_default_namespace(body), Some("urn:outer"));
}

#[test]
fn appended_elements_inherit_the_enclosing_default_namespace() {
    let mut doc = parse(NAMESPACED);
    let characteristics = doc
        .select_first(doc.root(), &["PositionCharacteristics"])
        .expect("characteristics");
    let created = doc
        .append_element(characteristics, "PositionCoefficient")
        .expect("append under element");
    doc.set_text(created, "A2");

    let element = doc.element(created).expect("element");
    assert_eq!(element.name, "PositionCoefficient");
    assert!(element.attributes.is_empty());
    assert!(output(&doc).contains("<PositionCoefficient>A2</PositionCoefficient>"));
}

#[test]
fn appended_elements_redeclare_namespace_after_undeclaration() {
    let mut doc = parse(r#"<Root xmlns="urn:a"><Plain xmlns=""><Leaf/></Plain></Root>"#);
    let plain = doc.first_child_by_local_name(doc.root(), "Plain").expect("plain");
    let created = doc.append_element(plain, "Added").expect("append");
    let element = doc.element(created).expect("element");
    assert_eq!(element.attribute("xmlns"), Some("urn:a"));
}

#[test]
fn set_text_replaces_existing_text_only() {
    let mut doc = parse("<Code>old<!-- keep --></Code>");
    let root = doc.root();
    assert!(doc.set_text(root, "new"));
    assert_eq!(doc.text(root), "new");
    assert!(doc
        .children(root)
        .iter()
        .any(|child| matches!(doc.kind(*child), NodeKind::Comment(_))));
}

#[test]
fn serialization_pretty_prints_and_is_stable() {
    let doc = parse("<a><b>x</b><c/><d><e>1 &amp; 2</e></d></a>");
    let first = output(&doc);
    assert_eq!(
        first,
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<a>\n  <b>x</b>\n  <c/>\n  <d>\n    <e>1 &amp; 2</e>\n  </d>\n</a>\n"
    );
    let second = output(&parse(&first));
    assert_eq!(first, second);
}

#[test]
fn declared_latin1_encoding_round_trips() {
    let mut bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><Label>Op".to_vec();
    bytes.push(0xE9); // e-acute in Latin-1
    bytes.extend_from_slice(b"rateur</Label>");

    let doc = Document::parse(&bytes).expect("parse latin-1");
    assert_eq!(doc.text(doc.root()), "Op\u{e9}rateur");
    assert_eq!(doc.encoding_label(), "ISO-8859-1");

    let out = doc.to_bytes();
    assert!(out.starts_with(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>"));
    assert!(out.windows(2).any(|pair| pair == [b'p', 0xE9]));
    assert!(std::str::from_utf8(&out).is_err());
}

#[test]
fn missing_declaration_defaults_to_utf8() {
    let doc = parse("<a>\u{e9}</a>");
    assert_eq!(doc.encoding_label(), "UTF-8");
    assert!(output(&doc).starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
}

fn utf16le_with_bom(text: &str) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xFE];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes
}

#[test]
fn utf16_bom_without_declaration_is_written_as_utf8() {
    let doc = Document::parse(&utf16le_with_bom("<Label>Op\u{e9}rateur</Label>"))
        .expect("parse utf-16");
    assert_eq!(doc.text(doc.root()), "Op\u{e9}rateur");
    assert_eq!(doc.encoding_label(), "UTF-8");
    assert_eq!(
        output(&doc),
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Label>Op\u{e9}rateur</Label>\n"
    );
}

#[test]
fn declared_utf16_is_written_back_as_utf16() {
    let source = "<?xml version=\"1.0\" encoding=\"UTF-16\"?><Label>Op\u{e9}rateur</Label>";
    let doc = Document::parse(&utf16le_with_bom(source)).expect("parse utf-16");
    assert_eq!(doc.encoding_label(), "UTF-16");
    assert_eq!(doc.recovered_issues(), 0);

    let out = doc.to_bytes();
    assert_eq!(
        out,
        utf16le_with_bom(
            "<?xml version=\"1.0\" encoding=\"UTF-16\"?>\n<Label>Op\u{e9}rateur</Label>\n"
        )
    );
    let reparsed = Document::parse(&out).expect("reparse utf-16 output");
    assert_eq!(reparsed.text(reparsed.root()), "Op\u{e9}rateur");
    assert_eq!(reparsed.to_bytes(), out);
}

#[test]
fn bom_overrides_a_conflicting_declaration() {
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice(
        "<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><Note>\u{e9}t\u{e9}</Note>".as_bytes(),
    );
    let doc = Document::parse(&bytes).expect("parse bom document");
    assert_eq!(doc.text(doc.root()), "\u{e9}t\u{e9}");
    assert_eq!(doc.encoding_label(), "UTF-8");
    assert_eq!(doc.recovered_issues(), 1);

    let once = doc.to_bytes();
    assert_eq!(
        String::from_utf8(once.clone()).expect("utf-8 output"),
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Note>\u{e9}t\u{e9}</Note>\n"
    );
    let reparsed = Document::parse(&once).expect("reparse output");
    assert_eq!(reparsed.text(reparsed.root()), "\u{e9}t\u{e9}");
    assert_eq!(reparsed.recovered_issues(), 0);
    assert_eq!(reparsed.to_bytes(), once);
}

#[test]
fn utf16_label_without_bom_is_declared_as_utf8() {
    let doc = parse("<?xml version=\"1.0\" encoding=\"UTF-16\"?><a>x</a>");
    assert_eq!(doc.encoding_label(), "UTF-8");
    assert!(output(&doc).starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
}

#[test]
fn unbalanced_end_tags_are_recovered() {
    let doc = parse("<a><b><c>text</b><d/></a></z>");
    assert!(doc.recovered_issues() >= 2);
    let root = doc.root();
    let names: Vec<&str> = doc
        .child_elements(root)
        .filter_map(|child| doc.local_name(child))
        .collect();
    assert_eq!(names, vec!["b", "d"]);
    assert_eq!(doc.select_text(root, &["b", "c"]), "text");
}

#[test]
fn unclosed_elements_are_closed_at_end_of_input() {
    let doc = parse("<a><b>open");
    assert_eq!(doc.recovered_issues(), 1);
    assert_eq!(doc.select_text(doc.root(), &["b"]), "open");
}

#[test]
fn comments_and_processing_instructions_survive() {
    let doc = parse("<?xml version=\"1.0\"?><!-- head --><a><?keep me?><b>1</b></a><!-- tail -->");
    let out = output(&doc);
    assert!(out.contains("<!-- head -->\n<a>"));
    assert!(out.contains("  <?keep me?>\n"));
    assert!(out.ends_with("</a>\n<!-- tail -->\n"));
}

#[test]
fn empty_input_has_no_root() {
    let err = Document::parse(b"   ").expect_err("no root");
    assert!(matches!(err, ParseError::MissingRoot));
}

#[test]
fn second_root_element_is_fatal() {
    let err = Document::parse(b"<a/><b/>").expect_err("two roots");
    assert!(matches!(err, ParseError::TrailingElement { .. }));
}

#[test]
fn unknown_encoding_label_is_fatal() {
    let err = Document::parse(b"<?xml version=\"1.0\" encoding=\"x-klingon\"?><a/>")
        .expect_err("unknown label");
    assert!(matches!(err, ParseError::UnsupportedEncoding { .. }));
}

#[test]
fn path_of_lists_local_names_from_root() {
    let doc = parse(NAMESPACED);
    let level = doc
        .select_first(doc.root(), &["PositionCharacteristics", "PositionLevel"])
        .expect("level");
    assert_eq!(
        doc.path_of(level),
        "/Envelope/Body/Assignment/PositionCharacteristics/PositionLevel"
    );
}
