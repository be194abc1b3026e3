use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::fmt::{self, Display, Formatter, Write as _};

/// The `xml:` prefix namespace, predeclared in every document.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Index of a node inside its [`Document`] arena.
///
/// Ids are stable for the lifetime of the document: detaching a node does
/// not invalidate ids, and cloning a document preserves them. Identity
/// comparisons between nodes are comparisons of `NodeId`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Comment,
}

#[derive(Debug, Clone)]
pub struct NodeData {
    pub kind: NodeKind,
    /// Qualified name in Clark notation (`{uri}local`); empty for comments.
    pub tag: String,
    /// Character data before the first child.
    pub text: Option<String>,
    /// Character data after this node, inside the parent.
    pub tail: Option<String>,
    /// Attributes keyed by Clark-notation name.
    pub attrs: BTreeMap<String, String>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) parent: Option<NodeId>,
}

/// An XML tree held in an arena.
///
/// All structural mutation goes through the document so parent and child
/// links stay consistent.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
    /// Namespace declarations on the root element (prefix -> uri, empty
    /// string for the default namespace).
    pub nsmap: BTreeMap<String, String>,
    /// Every prefix -> uri binding seen in the document, first one wins.
    pub prefixes: BTreeMap<String, String>,
}

impl Document {
    /// Create a document whose root is a new element with the given tag.
    pub fn new(root_tag: impl Into<String>) -> Self {
        let root = NodeData {
            kind: NodeKind::Element,
            tag: root_tag.into(),
            text: None,
            tail: None,
            attrs: BTreeMap::new(),
            children: Vec::new(),
            parent: None,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            nsmap: BTreeMap::new(),
            prefixes: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }

    /// Create a detached element node.
    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.push(NodeData {
            kind: NodeKind::Element,
            tag: tag.into(),
            text: None,
            tail: None,
            attrs: BTreeMap::new(),
            children: Vec::new(),
            parent: None,
        })
    }

    /// Create a detached comment node.
    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData {
            kind: NodeKind::Comment,
            tag: String::new(),
            text: Some(text.into()),
            tail: None,
            attrs: BTreeMap::new(),
            children: Vec::new(),
            parent: None,
        })
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(data);
        id
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Position of `child` among the children of `parent`.
    pub fn index_of(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.nodes[parent.0].children.iter().position(|c| *c == child)
    }

    /// Insert a detached node as a child at `position` (clamped to the end).
    pub fn insert(&mut self, parent: NodeId, position: usize, child: NodeId) {
        debug_assert!(self.nodes[child.0].parent.is_none());
        let len = self.nodes[parent.0].children.len();
        let position = position.min(len);
        self.nodes[parent.0].children.insert(position, child);
        self.nodes[child.0].parent = Some(parent);
    }

    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        let position = self.nodes[parent.0].children.len();
        self.insert(parent, position, child);
    }

    /// Detach a node from its parent. The node and its subtree stay in the
    /// arena and keep their ids.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
    }

    /// Deep-copy a subtree within this document, returning the detached copy.
    /// The copy's tail is not carried over.
    pub fn copy_subtree(&mut self, id: NodeId) -> NodeId {
        let mut data = self.nodes[id.0].clone();
        data.parent = None;
        data.tail = None;
        let children = std::mem::take(&mut data.children);
        let copy = self.push(data);
        for child in children {
            let child_copy = self.copy_child(child);
            self.nodes[child_copy.0].parent = Some(copy);
            self.nodes[copy.0].children.push(child_copy);
        }
        copy
    }

    fn copy_child(&mut self, id: NodeId) -> NodeId {
        let mut data = self.nodes[id.0].clone();
        data.parent = None;
        let children = std::mem::take(&mut data.children);
        let copy = self.push(data);
        for child in children {
            let child_copy = self.copy_child(child);
            self.nodes[child_copy.0].parent = Some(copy);
            self.nodes[copy.0].children.push(child_copy);
        }
        copy
    }

    /// Whether `id` is still reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.nodes[current.0].parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Structural equality of the trees under both roots, plus the root
    /// namespace maps. Arena layout is irrelevant.
    pub fn tree_eq(&self, other: &Document) -> bool {
        self.nsmap == other.nsmap && subtree_eq(self, self.root, other, other.root)
    }
}

/// Structural equality of two subtrees, possibly from different documents.
/// The tails of the two top nodes are not compared.
pub fn subtree_eq(a_doc: &Document, a: NodeId, b_doc: &Document, b: NodeId) -> bool {
    fn eq(a_doc: &Document, a: NodeId, b_doc: &Document, b: NodeId, top: bool) -> bool {
        let an = a_doc.node(a);
        let bn = b_doc.node(b);
        an.kind == bn.kind
            && an.tag == bn.tag
            && an.text == bn.text
            && (top || an.tail == bn.tail)
            && an.attrs == bn.attrs
            && an.children.len() == bn.children.len()
            && an
                .children
                .iter()
                .zip(&bn.children)
                .all(|(ac, bc)| eq(a_doc, *ac, b_doc, *bc, false))
    }
    eq(a_doc, a, b_doc, b, true)
}

/// Iterator over a subtree in post order: all descendants first, the
/// subtree root last.
pub fn post_order(doc: &Document, root: NodeId) -> PostOrder<'_> {
    PostOrder {
        doc,
        stack: vec![(root, 0)],
    }
}

pub struct PostOrder<'a> {
    doc: &'a Document,
    stack: Vec<(NodeId, usize)>,
}

impl Iterator for PostOrder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        loop {
            let (node, child_idx) = *self.stack.last()?;
            let children = self.doc.children(node);
            if child_idx < children.len() {
                self.stack.last_mut().unwrap().1 += 1;
                self.stack.push((children[child_idx], 0));
            } else {
                self.stack.pop();
                return Some(node);
            }
        }
    }
}

/// Post order with the children of every node visited in reverse.
pub fn reverse_post_order(doc: &Document, root: NodeId) -> ReversePostOrder<'_> {
    ReversePostOrder {
        doc,
        stack: vec![(root, 0)],
    }
}

pub struct ReversePostOrder<'a> {
    doc: &'a Document,
    stack: Vec<(NodeId, usize)>,
}

impl Iterator for ReversePostOrder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        loop {
            let (node, visited) = *self.stack.last()?;
            let children = self.doc.children(node);
            if visited < children.len() {
                self.stack.last_mut().unwrap().1 += 1;
                self.stack.push((children[children.len() - 1 - visited], 0));
            } else {
                self.stack.pop();
                return Some(node);
            }
        }
    }
}

/// Iterator over a subtree level by level, the subtree root first.
pub fn breadth_first(doc: &Document, root: NodeId) -> BreadthFirst<'_> {
    let mut queue = VecDeque::new();
    queue.push_back(root);
    BreadthFirst { doc, queue }
}

pub struct BreadthFirst<'a> {
    doc: &'a Document,
    queue: VecDeque<NodeId>,
}

impl Iterator for BreadthFirst<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let node = self.queue.pop_front()?;
        self.queue.extend(self.doc.children(node).iter().copied());
        Some(node)
    }
}

/// An owned XML subtree detached from any arena.
///
/// Used where a subtree must outlive its document, notably the placeholder
/// table. The [`Display`] form is deterministic (attributes sorted, tails
/// omitted at the top level) and markup-escaped, so it serializes distinct
/// subtrees to distinct strings; it serves as the placeholder identity key.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub kind: NodeKind,
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub text: Option<String>,
    pub tail: Option<String>,
    pub children: Vec<Fragment>,
}

impl Fragment {
    /// Create an empty element fragment.
    pub fn element(tag: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Element,
            tag: tag.into(),
            attrs: BTreeMap::new(),
            text: None,
            tail: None,
            children: Vec::new(),
        }
    }

    /// Copy a subtree out of a document. The top node's tail is dropped.
    pub fn of(doc: &Document, id: NodeId) -> Self {
        fn convert(doc: &Document, id: NodeId, top: bool) -> Fragment {
            let node = doc.node(id);
            Fragment {
                kind: node.kind,
                tag: node.tag.clone(),
                attrs: node.attrs.clone(),
                text: node.text.clone(),
                tail: if top { None } else { node.tail.clone() },
                children: doc
                    .children(id)
                    .iter()
                    .map(|c| convert(doc, *c, false))
                    .collect(),
            }
        }
        convert(doc, id, true)
    }

    /// Materialize this fragment inside a document, returning the detached
    /// node id.
    pub fn materialize(&self, doc: &mut Document) -> NodeId {
        let id = match self.kind {
            NodeKind::Element => doc.create_element(self.tag.clone()),
            NodeKind::Comment => doc.create_comment(self.text.clone().unwrap_or_default()),
        };
        {
            let node = doc.node_mut(id);
            node.attrs = self.attrs.clone();
            node.text = self.text.clone();
            node.tail = self.tail.clone();
        }
        for child in &self.children {
            let child_id = child.materialize(doc);
            doc.append(id, child_id);
        }
        id
    }
}

impl Display for Fragment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.kind == NodeKind::Comment {
            // Escaping rules do not apply inside comments.
            return write!(f, "<!--{}-->", self.text.as_deref().unwrap_or(""));
        }
        write!(f, "<{}", self.tag)?;
        for (key, value) in &self.attrs {
            write!(f, " {}=\"", key)?;
            write_escaped(f, value, true)?;
            f.write_str("\"")?;
        }

        if self.children.is_empty() && self.text.is_none() {
            return write!(f, "/>");
        }

        write!(f, ">")?;
        if let Some(text) = &self.text {
            write_escaped(f, text, false)?;
        }
        for child in &self.children {
            write!(f, "{}", child)?;
            if let Some(tail) = &child.tail {
                write_escaped(f, tail, false)?;
            }
        }
        write!(f, "</{}>", self.tag)
    }
}

/// XML-escape character data. Without escaping, text that merely looks
/// like markup would serialize the same as real markup, and anything keyed
/// on the serialized form would conflate the two.
fn write_escaped(f: &mut Formatter<'_>, value: &str, in_attribute: bool) -> fmt::Result {
    for ch in value.chars() {
        match ch {
            '&' => f.write_str("&amp;")?,
            '<' => f.write_str("&lt;")?,
            '>' => f.write_str("&gt;")?,
            '"' if in_attribute => f.write_str("&quot;")?,
            _ => f.write_char(ch)?,
        }
    }
    Ok(())
}
