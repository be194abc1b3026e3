use std::collections::BTreeMap;

use crate::actions::EditAction;
use crate::format::{FormatError, Formatter, Normalize};
use crate::tree::{Document, NodeId};
use crate::xpath::{resolve, xpath_of};

/// A rendering compatible with the wire format of an earlier generation of
/// this tool: `remove`/`insert-first`/`insert-after`/`move-first`/
/// `move-after` verbs, attribute operations expressed as synthetic
/// attribute nodes.
pub struct LegacyFormatter {
    normalize: Normalize,
}

impl LegacyFormatter {
    pub fn new(normalize: Normalize) -> Self {
        Self { normalize }
    }
}

impl Default for LegacyFormatter {
    fn default() -> Self {
        Self::new(Normalize::Tags)
    }
}

impl Formatter for LegacyFormatter {
    fn normalize(&self) -> Normalize {
        self.normalize
    }

    fn format(&mut self, actions: &[EditAction], left: &Document) -> Result<String, FormatError> {
        let mut records = Vec::new();
        for action in actions {
            handle_action(action, left, &mut records)?;
        }
        Ok(records
            .iter()
            .map(|fields| format!("[{}]", fields.join(", ")))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

fn lookup(action: &EditAction, tree: &Document, xpath: &str) -> Result<NodeId, FormatError> {
    let empty = BTreeMap::new();
    resolve(tree, xpath, &empty, None).map_err(|source| FormatError::resolve(action, source))
}

/// The `\n<@name>\nvalue\n</@name>` shape the old format used for
/// attribute payloads.
fn attrib_node(name: &str, value: &str) -> String {
    format!("\n<@{name}>\n{value}\n</@{name}>")
}

fn handle_action(
    action: &EditAction,
    tree: &Document,
    records: &mut Vec<Vec<String>>,
) -> Result<(), FormatError> {
    match action {
        EditAction::DeleteNode { node } => {
            records.push(vec!["remove".into(), node.clone()]);
        }
        EditAction::DeleteAttrib { node, name } => {
            records.push(vec!["remove".into(), format!("{node}/@{name}")]);
        }
        EditAction::InsertAttrib { node, name, value } => {
            records.push(vec![
                "insert".into(),
                node.clone(),
                attrib_node(name, value),
            ]);
        }
        EditAction::InsertNode {
            target,
            tag,
            position,
        } => {
            if *position == 0 {
                records.push(vec!["insert-first".into(), target.clone(), format!("\n<{tag}/>")]);
            } else {
                let target_id = lookup(action, tree, target)?;
                let sibling = tree
                    .children(target_id)
                    .get(position - 1)
                    .copied()
                    .ok_or_else(|| FormatError::Unsupported {
                        action: format!("{action:?}"),
                    })?;
                records.push(vec![
                    "insert-after".into(),
                    xpath_of(tree, sibling),
                    format!("\n<{tag}/>"),
                ]);
            }
        }
        EditAction::RenameAttrib {
            node,
            old_name,
            new_name,
        } => {
            let node_id = lookup(action, tree, node)?;
            let value = tree
                .node(node_id)
                .attrs
                .get(old_name)
                .cloned()
                .ok_or_else(|| FormatError::MissingAttribute {
                    action: format!("{action:?}"),
                    name: old_name.clone(),
                })?;
            records.push(vec!["remove".into(), format!("{node}/@{old_name}")]);
            records.push(vec![
                "insert".into(),
                node.clone(),
                attrib_node(new_name, &value),
            ]);
        }
        EditAction::MoveNode {
            node,
            target,
            position,
        } => {
            if *position == 0 {
                records.push(vec!["move-first".into(), node.clone(), target.clone()]);
            } else {
                let node_id = lookup(action, tree, node)?;
                let target_id = lookup(action, tree, target)?;
                // The record is relative to the previous sibling in the
                // destination; moving down inside the same parent shifts
                // that sibling by one.
                let mut sibling_position = position - 1;
                if tree.parent(node_id) == Some(target_id)
                    && tree.index_of(target_id, node_id).expect("child of its parent")
                        <= sibling_position
                {
                    sibling_position += 1;
                }
                let sibling = tree
                    .children(target_id)
                    .get(sibling_position)
                    .copied()
                    .ok_or_else(|| FormatError::Unsupported {
                        action: format!("{action:?}"),
                    })?;
                records.push(vec![
                    "move-after".into(),
                    node.clone(),
                    xpath_of(tree, sibling),
                ]);
            }
        }
        EditAction::UpdateAttrib { node, name, value } => {
            records.push(vec![
                "update".into(),
                format!("{node}/@{name}"),
                quote(value),
            ]);
        }
        EditAction::UpdateTextIn { node, text, .. } => {
            records.push(vec![
                "update".into(),
                format!("{node}/text()[1]"),
                quote_opt(text),
            ]);
        }
        EditAction::UpdateTextAfter { node, text, .. } => {
            records.push(vec![
                "update".into(),
                format!("{node}/text()[2]"),
                quote_opt(text),
            ]);
        }
        EditAction::RenameNode { node, tag } => {
            records.push(vec!["rename".into(), node.clone(), tag.clone()]);
        }
        EditAction::InsertComment {
            target,
            position,
            text,
        } => {
            records.push(vec![
                "insert-comment".into(),
                target.clone(),
                position.to_string(),
                text.clone(),
            ]);
        }
        EditAction::InsertNamespace { prefix, uri } => {
            records.push(vec!["insert-namespace".into(), prefix.clone(), uri.clone()]);
        }
        EditAction::DeleteNamespace { prefix } => {
            records.push(vec!["delete-namespace".into(), prefix.clone()]);
        }
    }
    Ok(())
}

fn quote(value: &str) -> String {
    serde_json::to_string(value).expect("strings always serialize to JSON")
}

fn quote_opt(value: &Option<String>) -> String {
    match value {
        Some(value) => quote(value),
        None => "null".to_string(),
    }
}
