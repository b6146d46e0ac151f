//! Tolerant loader: bytes -> decoded text -> arena tree.
use super::{Attribute, Document, Element, Node, NodeId, NodeKind, Prolog};
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::reader::Reader;
use regex::bytes::Regex;
use std::borrow::Cow;

/// Input that cannot be turned into a document at all.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unsupported declared encoding {label:?}")]
    UnsupportedEncoding { label: String },
    #[error("malformed XML at byte {position}: {message}")]
    Syntax { position: String, message: String },
    #[error("document has no root element")]
    MissingRoot,
    #[error("unexpected element <{name}> after the root element")]
    TrailingElement { name: String },
}

const DECLARATION_SCAN_BYTES: usize = 1024;

struct SourceText<'a> {
    text: Cow<'a, str>,
    encoding: &'static Encoding,
}

/// Decode `bytes` using BOM, then declared encoding, then UTF-8.
fn decode_source(bytes: &[u8]) -> Result<SourceText<'_>, ParseError> {
    let encoding = match Encoding::for_bom(bytes) {
        Some((encoding, _)) => encoding,
        None => match declared_encoding_label(bytes) {
            Some(label) => {
                let declared = Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
                    ParseError::UnsupportedEncoding {
                        label: label.clone(),
                    }
                })?;
                // A readable ASCII declaration without BOM cannot be UTF-16.
                if is_utf16(declared) {
                    UTF_8
                } else {
                    declared
                }
            }
            None => UTF_8,
        },
    };
    // `decode` re-sniffs the BOM and strips it from the output.
    let (text, actual, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::warn!(
            encoding = actual.name(),
            "input contains byte sequences invalid for its encoding; replaced"
        );
    }
    Ok(SourceText {
        text,
        encoding: actual,
    })
}

/// Read the `encoding` pseudo-attribute of an ASCII-compatible declaration.
fn declared_encoding_label(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(DECLARATION_SCAN_BYTES)];
    if !head.starts_with(b"<?xml") {
        return None;
    }
    let end = head.windows(2).position(|pair| pair == b"?>")?;
    let decl = &head[..end];
    let pattern = Regex::new(r#"encoding\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("regex for declared encoding");
    let caps = pattern.captures(decl)?;
    let label = caps.get(1).or_else(|| caps.get(2))?;
    Some(String::from_utf8_lossy(label.as_bytes()).into_owned())
}

pub(super) fn parse_document(bytes: &[u8]) -> Result<Document, ParseError> {
    let source = decode_source(bytes)?;
    let mut reader = Reader::from_str(&source.text);
    {
        let config = reader.config_mut();
        // End-tag balance is repaired by the builder instead of rejected.
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.check_comments = false;
    }

    let mut builder = TreeBuilder::default();
    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(err) => {
                return Err(ParseError::Syntax {
                    position: reader.buffer_position().to_string(),
                    message: err.to_string(),
                })
            }
        };
        match event {
            Event::Decl(decl) => builder.declaration(&decl),
            Event::Start(start) => builder.open(&start, false)?,
            Event::Empty(start) => builder.open(&start, true)?,
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                builder.close(&name);
            }
            Event::Text(text) => {
                let raw = String::from_utf8_lossy(&text).into_owned();
                if raw.trim().is_empty() {
                    continue;
                }
                let value = match text.unescape() {
                    Ok(value) => value.into_owned(),
                    Err(err) => {
                        builder.recover(format!("kept undecodable text as-is: {err}"));
                        raw
                    }
                };
                builder.leaf(NodeKind::Text(value));
            }
            Event::CData(cdata) => {
                let value = String::from_utf8_lossy(&cdata).into_owned();
                builder.leaf(NodeKind::CData(value));
            }
            Event::Comment(comment) => {
                let value = String::from_utf8_lossy(&comment).into_owned();
                builder.misc(NodeKind::Comment(value));
            }
            Event::PI(pi) => {
                let value = String::from_utf8_lossy(&pi).into_owned();
                builder.misc(NodeKind::ProcessingInstruction(value));
            }
            Event::DocType(doctype) => {
                let value = String::from_utf8_lossy(&doctype).into_owned();
                builder.misc(NodeKind::DocType(value));
            }
            Event::Eof => break,
        }
    }
    builder.finish(source.encoding)
}

#[derive(Default)]
struct TreeBuilder {
    nodes: Vec<Node>,
    root: Option<NodeId>,
    open: Vec<NodeId>,
    before_root: Vec<NodeId>,
    after_root: Vec<NodeId>,
    prolog: Prolog,
    recovered: usize,
}

impl TreeBuilder {
    fn declaration(&mut self, decl: &BytesDecl<'_>) {
        if let Ok(version) = decl.version() {
            self.prolog.version = String::from_utf8_lossy(&version).into_owned();
        }
        if let Some(Ok(encoding)) = decl.encoding() {
            self.prolog.encoding_label = Some(String::from_utf8_lossy(&encoding).into_owned());
        }
        if let Some(Ok(standalone)) = decl.standalone() {
            self.prolog.standalone = Some(String::from_utf8_lossy(&standalone).into_owned());
        }
    }

    fn open(&mut self, start: &BytesStart<'_>, empty: bool) -> Result<(), ParseError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        if self.open.is_empty() && self.root.is_some() {
            return Err(ParseError::TrailingElement { name });
        }
        let mut attributes = Vec::new();
        for attr in start.attributes().with_checks(false) {
            let attr = match attr {
                Ok(attr) => attr,
                Err(err) => {
                    self.recover(format!("skipped malformed attribute on <{name}>: {err}"));
                    continue;
                }
            };
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = match attr.unescape_value() {
                Ok(value) => value.into_owned(),
                Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
            };
            attributes.push(Attribute { name: key, value });
        }

        let parent = self.open.last().copied();
        let id = self.alloc(parent, NodeKind::Element(Element { name, attributes }));
        match parent {
            Some(parent) => self.nodes[parent.0].children.push(id),
            None => self.root = Some(id),
        }
        if !empty {
            self.open.push(id);
        }
        Ok(())
    }

    fn close(&mut self, name: &str) {
        let matching = self.open.iter().rposition(|id| match &self.nodes[id.0].kind {
            NodeKind::Element(element) => element.name == name,
            _ => false,
        });
        match matching {
            Some(index) => {
                let implicit = self.open.len() - index - 1;
                if implicit > 0 {
                    self.recover(format!(
                        "</{name}> closed {implicit} unterminated element(s)"
                    ));
                }
                self.open.truncate(index);
            }
            None => self.recover(format!("dropped stray end tag </{name}>")),
        }
    }

    fn leaf(&mut self, kind: NodeKind) {
        match self.open.last().copied() {
            Some(parent) => {
                let id = self.alloc(Some(parent), kind);
                self.nodes[parent.0].children.push(id);
            }
            None => self.recover("dropped text outside the root element".to_string()),
        }
    }

    fn misc(&mut self, kind: NodeKind) {
        if !self.open.is_empty() {
            self.leaf(kind);
            return;
        }
        let id = self.alloc(None, kind);
        if self.root.is_some() {
            self.after_root.push(id);
        } else {
            self.before_root.push(id);
        }
    }

    /// Pick the output encoding and make the declared label agree with it.
    ///
    /// Without a declaration the output is UTF-8. A label that contradicts
    /// the bytes (BOM or undeclarable UTF-16) is replaced by the encoding
    /// actually used to decode.
    fn reconcile_encoding(&mut self, decoded: &'static Encoding) -> &'static Encoding {
        let Some(label) = self.prolog.encoding_label.take() else {
            return UTF_8;
        };
        match Encoding::for_label(label.trim().as_bytes()) {
            Some(declared) if same_encoding(declared, decoded) => {
                self.prolog.encoding_label = Some(label);
            }
            _ => {
                let actual = canonical_label(decoded);
                self.recover(format!(
                    "declared encoding {label:?} does not match the input bytes; declaring {actual}"
                ));
                self.prolog.encoding_label = Some(actual.to_string());
            }
        }
        decoded
    }

    fn recover(&mut self, detail: String) {
        self.recovered += 1;
        tracing::warn!(%detail, "recovered malformed markup");
    }

    fn alloc(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            kind,
        });
        id
    }

    fn finish(mut self, decoded: &'static Encoding) -> Result<Document, ParseError> {
        let encoding = self.reconcile_encoding(decoded);
        if !self.open.is_empty() {
            let unclosed = self.open.len();
            self.recover(format!(
                "closed {unclosed} element(s) left open at end of input"
            ));
        }
        let root = self.root.ok_or(ParseError::MissingRoot)?;
        tracing::debug!(
            nodes = self.nodes.len(),
            encoding = encoding.name(),
            recovered = self.recovered,
            "document parsed"
        );
        Ok(Document {
            nodes: self.nodes,
            root,
            before_root: self.before_root,
            after_root: self.after_root,
            prolog: self.prolog,
            encoding,
            recovered_issues: self.recovered,
        })
    }
}

fn is_utf16(encoding: &'static Encoding) -> bool {
    encoding == UTF_16LE || encoding == UTF_16BE
}

fn same_encoding(declared: &'static Encoding, decoded: &'static Encoding) -> bool {
    declared == decoded || (is_utf16(declared) && is_utf16(decoded))
}

fn canonical_label(encoding: &'static Encoding) -> &'static str {
    if is_utf16(encoding) {
        "UTF-16"
    } else {
        encoding.name()
    }
}
