/// A single primitive operation of an edit script.
///
/// Actions are plain values: they carry xpath strings and scalars, never
/// node references, so a script outlives the trees it was computed from.
/// The differ produces them in application order; the patcher and the
/// formatters consume them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditAction {
    /// Remove the node and its subtree.
    DeleteNode { node: String },
    /// Create a new empty element as a child of `target` at `position`.
    InsertNode {
        target: String,
        tag: String,
        position: usize,
    },
    /// Change an element's tag.
    RenameNode { node: String, tag: String },
    /// Detach `node` and reinsert it under `target` at `position`.
    MoveNode {
        node: String,
        target: String,
        position: usize,
    },
    /// Replace the text before the first child.
    UpdateTextIn {
        node: String,
        text: Option<String>,
        old_text: Option<String>,
    },
    /// Replace the tail text after the node.
    UpdateTextAfter {
        node: String,
        text: Option<String>,
        old_text: Option<String>,
    },
    /// Change the value of an existing attribute.
    UpdateAttrib {
        node: String,
        name: String,
        value: String,
    },
    /// Remove an existing attribute.
    DeleteAttrib { node: String, name: String },
    /// Add an attribute that must not already exist.
    InsertAttrib {
        node: String,
        name: String,
        value: String,
    },
    /// Rename an attribute, preserving its value.
    RenameAttrib {
        node: String,
        old_name: String,
        new_name: String,
    },
    /// Create a comment node as a child of `target` at `position`.
    InsertComment {
        target: String,
        position: usize,
        text: String,
    },
    /// Declare a namespace prefix at the root.
    InsertNamespace { prefix: String, uri: String },
    /// Undeclare a namespace prefix at the root.
    DeleteNamespace { prefix: String },
}
