//! Mutable, namespace-aware XML tree.
//!
//! Nodes live in an arena owned by [`Document`] and are addressed by
//! [`NodeId`] handles, so contract scopes found during location stay valid
//! while upserts mutate the tree. Lookups match on local names only; the
//! namespace prefix of the source markup is kept verbatim for serialization.
use encoding_rs::Encoding;

mod parse;
mod write;

pub use parse::ParseError;

/// Stable handle of a node inside a [`Document`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Attribute as written in the source (qualified name, unescaped value).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Element payload: qualified name plus attributes in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<Attribute>,
}

impl Element {
    /// Name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction(String),
    DocType(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// Values carried by the XML declaration of the source document.
#[derive(Debug, Clone)]
pub struct Prolog {
    pub version: String,
    /// Declared encoding label, kept as written when it agrees with the
    /// bytes. `None` when the source had no declaration.
    pub encoding_label: Option<String>,
    pub standalone: Option<String>,
}

impl Default for Prolog {
    fn default() -> Self {
        Prolog {
            version: "1.0".to_string(),
            encoding_label: None,
            standalone: None,
        }
    }
}

/// Parsed document: arena, root handle, declaration and source encoding.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    before_root: Vec<NodeId>,
    after_root: Vec<NodeId>,
    prolog: Prolog,
    encoding: &'static Encoding,
    recovered_issues: usize,
}

impl Document {
    /// Parse raw bytes, decoding them with the declared (or BOM) encoding.
    pub fn parse(bytes: &[u8]) -> Result<Document, ParseError> {
        parse::parse_document(bytes)
    }

    /// Serialize the tree back into the encoding it was read with.
    pub fn to_bytes(&self) -> Vec<u8> {
        write::write_document(self)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Label used for the output declaration: the declared one or `UTF-8`.
    pub fn encoding_label(&self) -> &str {
        self.prolog.encoding_label.as_deref().unwrap_or("UTF-8")
    }

    /// Number of low-risk markup problems repaired while parsing.
    pub fn recovered_issues(&self) -> usize {
        self.recovered_issues
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(Element::local_name)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Direct element children, in document order.
    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|child| self.is_element(*child))
    }

    /// Direct element children whose local name is `name`, ignoring prefixes.
    pub fn children_by_local_name<'a>(
        &'a self,
        id: NodeId,
        name: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.child_elements(id)
            .filter(move |child| self.local_name(*child) == Some(name))
    }

    pub fn first_child_by_local_name(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.children_by_local_name(id, name).next()
    }

    /// All element descendants of `id` (excluding `id`) in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants_pruned(id, &[])
    }

    /// Like [`Document::descendants`], without entering the `pruned` subtrees.
    pub fn descendants_pruned(&self, id: NodeId, pruned: &[NodeId]) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            if !self.is_element(next) || pruned.contains(&next) {
                continue;
            }
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    #[cfg(test)]
    pub fn select(&self, id: NodeId, path: &[&str]) -> Vec<NodeId> {
        self.select_pruned(id, path, &[])
    }

    /// Resolve a local-name path below `id`, never looking inside the
    /// `pruned` subtrees.
    ///
    /// The first segment matches any descendant, the following segments
    /// match direct children, so `["A", "B"]` finds every `B` whose parent
    /// is an `A` somewhere inside `id`.
    pub fn select_pruned(&self, id: NodeId, path: &[&str], pruned: &[NodeId]) -> Vec<NodeId> {
        let Some((first, rest)) = path.split_first() else {
            return Vec::new();
        };
        let mut current: Vec<NodeId> = self
            .descendants_pruned(id, pruned)
            .into_iter()
            .filter(|node| self.local_name(*node) == Some(*first))
            .collect();
        for segment in rest {
            current = current
                .iter()
                .flat_map(|node| self.children_by_local_name(*node, segment))
                .filter(|node| !pruned.contains(node))
                .collect();
        }
        current
    }

    /// First match of [`Document::select`].
    #[cfg(test)]
    pub fn select_first(&self, id: NodeId, path: &[&str]) -> Option<NodeId> {
        self.select(id, path).into_iter().next()
    }

    /// Concatenated direct text (and CDATA) content of a node.
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            match self.kind(*child) {
                NodeKind::Text(text) | NodeKind::CData(text) => out.push_str(text),
                _ => {}
            }
        }
        out
    }

    /// Trimmed text of the first node matching `path`, empty when absent.
    #[cfg(test)]
    pub fn select_text(&self, id: NodeId, path: &[&str]) -> String {
        self.select_first(id, path)
            .map(|node| self.text(node).trim().to_string())
            .unwrap_or_default()
    }

    /// Replace the direct text content of `id` with `value`.
    ///
    /// Returns false when `id` is not an element.
    pub fn set_text(&mut self, id: NodeId, value: &str) -> bool {
        if !self.is_element(id) {
            return false;
        }
        let kept: Vec<NodeId> = self
            .children(id)
            .iter()
            .copied()
            .filter(|child| {
                !matches!(
                    self.kind(*child),
                    NodeKind::Text(_) | NodeKind::CData(_)
                )
            })
            .collect();
        let mut children = Vec::with_capacity(kept.len() + 1);
        if !value.is_empty() {
            children.push(self.alloc(Some(id), NodeKind::Text(value.to_string())));
        }
        children.extend(kept);
        self.nodes[id.0].children = children;
        true
    }

    /// Default namespace URI in effect for `id`, skipping undeclarations.
    ///
    /// Walks from `id` through its ancestors and returns the first non-empty
    /// `xmlns` declaration.
    pub fn nearest_default_namespace(&self, id: NodeId) -> Option<&str> {
        self.ancestors_or_self(id)
            .filter_map(|node| self.element(node))
            .filter_map(|element| element.attribute("xmlns"))
            .find(|uri| !uri.is_empty())
    }

    /// Default namespace an unprefixed child of `id` would inherit as-is.
    fn in_scope_default_namespace(&self, id: NodeId) -> Option<&str> {
        self.ancestors_or_self(id)
            .filter_map(|node| self.element(node))
            .find_map(|element| element.attribute("xmlns"))
            .filter(|uri| !uri.is_empty())
    }

    fn ancestors_or_self(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), move |node| self.parent(*node))
    }

    /// Append a new element named `local_name` under `parent`.
    ///
    /// The element is written unprefixed so it lands in the nearest
    /// enclosing default namespace; an explicit `xmlns` is added only when an
    /// `xmlns=""` undeclaration sits between `parent` and that namespace.
    pub fn append_element(&mut self, parent: NodeId, local_name: &str) -> Option<NodeId> {
        if !self.is_element(parent) {
            return None;
        }
        let nearest = self.nearest_default_namespace(parent).map(str::to_string);
        let inherited = self.in_scope_default_namespace(parent).map(str::to_string);
        let mut attributes = Vec::new();
        if let Some(uri) = nearest.filter(|uri| inherited.as_deref() != Some(uri.as_str())) {
            attributes.push(Attribute {
                name: "xmlns".to_string(),
                value: uri,
            });
        }
        let child = self.alloc(
            Some(parent),
            NodeKind::Element(Element {
                name: local_name.to_string(),
                attributes,
            }),
        );
        self.nodes[parent.0].children.push(child);
        Some(child)
    }

    /// Slash-separated local-name path from the root, for diagnostics.
    pub fn path_of(&self, id: NodeId) -> String {
        let mut names: Vec<&str> = self
            .ancestors_or_self(id)
            .filter_map(|node| self.local_name(node))
            .collect();
        names.reverse();
        format!("/{}", names.join("/"))
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
}

fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

#[cfg(test)]
mod tests;
