use std::collections::BTreeMap;

use thiserror::Error;

use crate::actions::EditAction;
use crate::tree::Document;
use crate::xpath::{resolve, XPathError};

/// Errors raised while applying an edit script.
#[derive(Debug, Error)]
pub enum PatchError {
    /// An xpath in the script did not resolve to exactly one node.
    #[error("cannot apply {action}: {source}")]
    Resolve {
        action: String,
        #[source]
        source: XPathError,
    },
    /// An action's precondition does not hold on the tree.
    #[error("cannot apply {action}: {reason}")]
    Precondition { action: String, reason: String },
}

/// Apply an edit script to a copy of `tree`, returning the patched tree.
///
/// Application is literal and order-preserving: the script is expected in
/// the order the differ emits it, so that every xpath resolves against the
/// tree state reached by the preceding actions.
pub fn patch(actions: &[EditAction], tree: &Document) -> Result<Document, PatchError> {
    let mut result = tree.clone();
    // Prefixes declared by namespace actions participate in xpath
    // resolution for the rest of the script.
    let mut nsmap: BTreeMap<String, String> = result.nsmap.clone();

    for action in actions {
        apply(action, &mut result, &mut nsmap)?;
    }
    Ok(result)
}

fn apply(
    action: &EditAction,
    tree: &mut Document,
    nsmap: &mut BTreeMap<String, String>,
) -> Result<(), PatchError> {
    let lookup = |tree: &Document, xpath: &str, nsmap: &BTreeMap<String, String>| {
        resolve(tree, xpath, nsmap, None).map_err(|source| PatchError::Resolve {
            action: describe(action),
            source,
        })
    };

    match action {
        EditAction::DeleteNode { node } => {
            let node = lookup(tree, node, nsmap)?;
            tree.detach(node);
        }
        EditAction::InsertNode {
            target,
            tag,
            position,
        } => {
            let target = lookup(tree, target, nsmap)?;
            let node = tree.create_element(tag.clone());
            tree.insert(target, *position, node);
        }
        EditAction::RenameNode { node, tag } => {
            let node = lookup(tree, node, nsmap)?;
            tree.node_mut(node).tag = tag.clone();
        }
        EditAction::MoveNode {
            node,
            target,
            position,
        } => {
            let node = lookup(tree, node, nsmap)?;
            tree.detach(node);
            let target = lookup(tree, target, nsmap)?;
            tree.insert(target, *position, node);
        }
        EditAction::UpdateTextIn { node, text, .. } => {
            let node = lookup(tree, node, nsmap)?;
            tree.node_mut(node).text = text.clone();
        }
        EditAction::UpdateTextAfter { node, text, .. } => {
            let node = lookup(tree, node, nsmap)?;
            tree.node_mut(node).tail = text.clone();
        }
        EditAction::UpdateAttrib { node, name, value } => {
            let node_id = lookup(tree, node, nsmap)?;
            if !tree.node(node_id).attrs.contains_key(name) {
                return Err(precondition(action, format!("attribute '{name}' is absent")));
            }
            tree.node_mut(node_id).attrs.insert(name.clone(), value.clone());
        }
        EditAction::DeleteAttrib { node, name } => {
            let node_id = lookup(tree, node, nsmap)?;
            if tree.node_mut(node_id).attrs.remove(name).is_none() {
                return Err(precondition(action, format!("attribute '{name}' is absent")));
            }
        }
        EditAction::InsertAttrib { node, name, value } => {
            let node_id = lookup(tree, node, nsmap)?;
            if tree.node(node_id).attrs.contains_key(name) {
                return Err(precondition(
                    action,
                    format!("attribute '{name}' already exists"),
                ));
            }
            tree.node_mut(node_id).attrs.insert(name.clone(), value.clone());
        }
        EditAction::RenameAttrib {
            node,
            old_name,
            new_name,
        } => {
            let node_id = lookup(tree, node, nsmap)?;
            if tree.node(node_id).attrs.contains_key(new_name) {
                return Err(precondition(
                    action,
                    format!("attribute '{new_name}' already exists"),
                ));
            }
            let value = tree.node_mut(node_id).attrs.remove(old_name).ok_or_else(|| {
                precondition(action, format!("attribute '{old_name}' is absent"))
            })?;
            tree.node_mut(node_id).attrs.insert(new_name.clone(), value);
        }
        EditAction::InsertComment {
            target,
            position,
            text,
        } => {
            let target = lookup(tree, target, nsmap)?;
            let node = tree.create_comment(text.clone());
            tree.insert(target, *position, node);
        }
        EditAction::InsertNamespace { prefix, uri } => {
            nsmap.insert(prefix.clone(), uri.clone());
            tree.nsmap.insert(prefix.clone(), uri.clone());
            tree.prefixes.entry(prefix.clone()).or_insert_with(|| uri.clone());
        }
        EditAction::DeleteNamespace { prefix } => {
            tree.nsmap.remove(prefix);
        }
    }
    Ok(())
}

fn precondition(action: &EditAction, reason: String) -> PatchError {
    PatchError::Precondition {
        action: describe(action),
        reason,
    }
}

fn describe(action: &EditAction) -> String {
    format!("{action:?}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn empty_script_is_identity() {
        let doc = parse(b"<root><a x=\"1\">t</a>tail</root>").unwrap();
        let patched = patch(&[], &doc).unwrap();
        assert!(patched.tree_eq(&doc));
    }

    #[test]
    fn attribute_preconditions_are_enforced() {
        let doc = parse(b"<root a=\"1\"/>").unwrap();

        let insert_existing = EditAction::InsertAttrib {
            node: "/root[1]".to_string(),
            name: "a".to_string(),
            value: "2".to_string(),
        };
        assert!(matches!(
            patch(&[insert_existing], &doc),
            Err(PatchError::Precondition { .. })
        ));

        let delete_missing = EditAction::DeleteAttrib {
            node: "/root[1]".to_string(),
            name: "b".to_string(),
        };
        assert!(matches!(
            patch(&[delete_missing], &doc),
            Err(PatchError::Precondition { .. })
        ));

        let rename_onto_existing = EditAction::RenameAttrib {
            node: "/root[1]".to_string(),
            old_name: "a".to_string(),
            new_name: "a".to_string(),
        };
        assert!(matches!(
            patch(&[rename_onto_existing], &doc),
            Err(PatchError::Precondition { .. })
        ));
    }

    #[test]
    fn unresolvable_xpath_is_fatal() {
        let doc = parse(b"<root/>").unwrap();
        let action = EditAction::DeleteNode {
            node: "/root/ghost[1]".to_string(),
        };
        assert!(matches!(
            patch(&[action], &doc),
            Err(PatchError::Resolve { .. })
        ));
    }

    #[test]
    fn inserted_namespace_resolves_later_paths() {
        let doc = parse(b"<root/>").unwrap();
        let script = [
            EditAction::InsertNamespace {
                prefix: "s".to_string(),
                uri: "urn:s".to_string(),
            },
            EditAction::InsertNode {
                target: "/root[1]".to_string(),
                tag: "{urn:s}child".to_string(),
                position: 0,
            },
            EditAction::UpdateTextIn {
                node: "/root/s:child[1]".to_string(),
                text: Some("x".to_string()),
                old_text: None,
            },
        ];
        let patched = patch(&script, &doc).unwrap();
        let child = patched.children(patched.root())[0];
        assert_eq!(patched.node(child).tag, "{urn:s}child");
        assert_eq!(patched.node(child).text.as_deref(), Some("x"));
    }
}
