//! Pretty-printing serializer that re-encodes into the source encoding.
use super::{Document, Element, NodeId, NodeKind};
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use quick_xml::escape::{escape, partial_escape};

const INDENT: &str = "  ";

pub(super) fn write_document(doc: &Document) -> Vec<u8> {
    let mut out = String::new();
    out.push_str(&format!(
        "<?xml version=\"{}\" encoding=\"{}\"",
        doc.prolog.version,
        doc.encoding_label()
    ));
    if let Some(standalone) = &doc.prolog.standalone {
        out.push_str(&format!(" standalone=\"{standalone}\""));
    }
    out.push_str("?>\n");

    for id in &doc.before_root {
        write_block(doc, &mut out, *id, 0);
    }
    write_block(doc, &mut out, doc.root, 0);
    for id in &doc.after_root {
        write_block(doc, &mut out, *id, 0);
    }
    encode_output(&out, doc.encoding)
}

/// Write a node on its own indented line(s).
fn write_block(doc: &Document, out: &mut String, id: NodeId, depth: usize) {
    let indent = INDENT.repeat(depth);
    match doc.kind(id) {
        NodeKind::Element(element) => {
            out.push_str(&indent);
            let children = doc.children(id);
            if children.is_empty() {
                write_open_tag(out, element, true);
                out.push('\n');
            } else if has_text_content(doc, id) {
                write_inline(doc, out, id);
                out.push('\n');
            } else {
                write_open_tag(out, element, false);
                out.push('\n');
                for child in children {
                    write_block(doc, out, *child, depth + 1);
                }
                out.push_str(&indent);
                write_close_tag(out, element);
                out.push('\n');
            }
        }
        _ => {
            out.push_str(&indent);
            write_inline(doc, out, id);
            out.push('\n');
        }
    }
}

/// Write a node without any added whitespace.
fn write_inline(doc: &Document, out: &mut String, id: NodeId) {
    match doc.kind(id) {
        NodeKind::Element(element) => {
            let children = doc.children(id);
            if children.is_empty() {
                write_open_tag(out, element, true);
                return;
            }
            write_open_tag(out, element, false);
            for child in children {
                write_inline(doc, out, *child);
            }
            write_close_tag(out, element);
        }
        NodeKind::Text(text) => out.push_str(&escape_text(text)),
        NodeKind::CData(text) => {
            out.push_str("<![CDATA[");
            out.push_str(text);
            out.push_str("]]>");
        }
        NodeKind::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeKind::ProcessingInstruction(text) => {
            out.push_str("<?");
            out.push_str(text);
            out.push_str("?>");
        }
        NodeKind::DocType(text) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(text.trim());
            out.push('>');
        }
    }
}

fn has_text_content(doc: &Document, id: NodeId) -> bool {
    doc.children(id)
        .iter()
        .any(|child| matches!(doc.kind(*child), NodeKind::Text(_) | NodeKind::CData(_)))
}

fn write_open_tag(out: &mut String, element: &Element, self_closing: bool) {
    out.push('<');
    out.push_str(&element.name);
    for attr in &element.attributes {
        out.push(' ');
        out.push_str(&attr.name);
        out.push_str("=\"");
        out.push_str(&escape_attribute(&attr.value));
        out.push('"');
    }
    out.push_str(if self_closing { "/>" } else { ">" });
}

fn write_close_tag(out: &mut String, element: &Element) {
    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}

fn escape_text(text: &str) -> String {
    partial_escape(text).replace('\r', "&#13;")
}

fn escape_attribute(value: &str) -> String {
    escape(value)
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
        .replace('\t', "&#9;")
}

fn encode_output(text: &str, encoding: &'static Encoding) -> Vec<u8> {
    if encoding == UTF_8 {
        return text.as_bytes().to_vec();
    }
    if encoding == UTF_16LE || encoding == UTF_16BE {
        let little_endian = encoding == UTF_16LE;
        let mut bytes = Vec::with_capacity(text.len() * 2 + 2);
        let bom: u16 = 0xFEFF;
        for unit in std::iter::once(bom).chain(text.encode_utf16()) {
            if little_endian {
                bytes.extend_from_slice(&unit.to_le_bytes());
            } else {
                bytes.extend_from_slice(&unit.to_be_bytes());
            }
        }
        return bytes;
    }
    let (bytes, used, unmappable) = encoding.encode(text);
    if unmappable {
        tracing::warn!(
            encoding = used.name(),
            "characters not representable in the output encoding were written as character references"
        );
    }
    bytes.into_owned()
}
