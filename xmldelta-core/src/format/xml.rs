use std::collections::BTreeMap;

use crate::actions::EditAction;
use crate::format::{diff_name, FormatError, Formatter, Normalize, DIFF_NS, DIFF_PREFIX};
use crate::placeholder::{MarkerKind, PlaceholderMaker, Segment, TagType};
use crate::textdiff::{text_diff, TextOp};
use crate::tree::{post_order, Document, NodeId, NodeKind};
use crate::utils::cleanup_whitespace;
use crate::writer::write_with;
use crate::xpath::resolve;

/// Renders a diff as a copy of the left tree annotated with markers in a
/// reserved namespace instead of destructive mutations.
///
/// Deleted nodes stay in the tree carrying `diff:delete`, so the xpaths of
/// later actions keep resolving; insert positions compensate by skipping
/// delete-marked siblings. Text updates become inline diffs, with changed
/// spans wrapped in `diff:insert`/`diff:delete`/`diff:replace` elements.
/// When text or formatting tags are configured, `prepare` folds their
/// sub-structure into placeholder characters so the inline diffs can see
/// through markup; `format` expands them back.
pub struct XmlFormatter {
    normalize: Normalize,
    pretty_print: bool,
    use_replace: bool,
    placeholderer: PlaceholderMaker,
    nsmap: BTreeMap<String, String>,
}

impl XmlFormatter {
    pub fn new(normalize: Normalize, pretty_print: bool) -> Self {
        Self::with_tags(normalize, pretty_print, Vec::new(), Vec::new())
    }

    /// A formatter that treats `text_tags` as text-bearing and
    /// `formatting_tags` as inline formatting.
    pub fn with_tags(
        normalize: Normalize,
        pretty_print: bool,
        text_tags: Vec<String>,
        formatting_tags: Vec<String>,
    ) -> Self {
        let mut nsmap = BTreeMap::new();
        nsmap.insert(DIFF_PREFIX.to_string(), DIFF_NS.to_string());
        Self {
            normalize,
            pretty_print,
            use_replace: false,
            placeholderer: PlaceholderMaker::new(text_tags, formatting_tags),
            nsmap,
        }
    }

    /// Collapse adjacent delete/insert pairs of the inline text diff into
    /// one `diff:replace` element carrying the old text as an attribute.
    pub fn use_replace(mut self) -> Self {
        self.use_replace = true;
        self
    }

    fn lookup(
        &self,
        action: &EditAction,
        tree: &Document,
        xpath: &str,
    ) -> Result<NodeId, FormatError> {
        resolve(tree, xpath, &self.nsmap, Some(&diff_name("delete")))
            .map_err(|source| FormatError::resolve(action, source))
    }

    fn handle_action(&mut self, action: &EditAction, tree: &mut Document) -> Result<(), FormatError> {
        match action {
            EditAction::DeleteNode { node } => {
                let node = self.lookup(action, tree, node)?;
                mark_deleted(tree, node);
            }
            EditAction::InsertNode {
                target,
                tag,
                position,
            } => {
                let target = self.lookup(action, tree, target)?;
                let position = real_insert_position(tree, target, *position);
                let node = tree.create_element(tag.clone());
                tree.node_mut(node).attrs.insert(diff_name("insert"), String::new());
                tree.insert(target, position, node);
            }
            EditAction::RenameNode { node, tag } => {
                let node = self.lookup(action, tree, node)?;
                let old_tag = std::mem::replace(&mut tree.node_mut(node).tag, tag.clone());
                tree.node_mut(node).attrs.insert(diff_name("rename"), old_tag);
            }
            EditAction::MoveNode {
                node,
                target,
                position,
            } => {
                // The original stays, marked deleted; a marked copy goes to
                // the destination.
                let node = self.lookup(action, tree, node)?;
                let copy = tree.copy_subtree(node);
                let target = self.lookup(action, tree, target)?;
                mark_deleted(tree, node);
                let position = real_insert_position(tree, target, *position);
                tree.node_mut(copy).attrs.insert(diff_name("insert"), String::new());
                tree.insert(target, position, copy);
            }
            EditAction::UpdateAttrib { node, name, value } => {
                let node_id = self.lookup(action, tree, node)?;
                let old = tree
                    .node_mut(node_id)
                    .attrs
                    .insert(name.clone(), value.clone())
                    .ok_or_else(|| FormatError::MissingAttribute {
                        action: format!("{action:?}"),
                        name: name.clone(),
                    })?;
                extend_diff_attr(tree, node_id, "update", &format!("{name}:{old}"));
            }
            EditAction::DeleteAttrib { node, name } => {
                let node_id = self.lookup(action, tree, node)?;
                if tree.node_mut(node_id).attrs.remove(name).is_none() {
                    return Err(FormatError::MissingAttribute {
                        action: format!("{action:?}"),
                        name: name.clone(),
                    });
                }
                extend_diff_attr(tree, node_id, "delete", name);
            }
            EditAction::InsertAttrib { node, name, value } => {
                let node_id = self.lookup(action, tree, node)?;
                tree.node_mut(node_id).attrs.insert(name.clone(), value.clone());
                extend_diff_attr(tree, node_id, "add", name);
            }
            EditAction::RenameAttrib {
                node,
                old_name,
                new_name,
            } => {
                let node_id = self.lookup(action, tree, node)?;
                let value = tree.node_mut(node_id).attrs.remove(old_name).ok_or_else(|| {
                    FormatError::MissingAttribute {
                        action: format!("{action:?}"),
                        name: old_name.clone(),
                    }
                })?;
                tree.node_mut(node_id).attrs.insert(new_name.clone(), value);
                extend_diff_attr(tree, node_id, "rename", &format!("{old_name}:{new_name}"));
            }
            EditAction::UpdateTextIn { node, text, .. } => {
                let node_id = self.lookup(action, tree, node)?;
                if tree.node(node_id).attrs.contains_key(&diff_name("insert")) {
                    // The whole node is marked inserted already; no point
                    // diff-wrapping its text.
                    tree.node_mut(node_id).text = text.clone();
                    return Ok(());
                }
                let old = tree.node_mut(node_id).text.take();
                self.make_diff_tags(tree, old, text.clone(), node_id, None);
            }
            EditAction::UpdateTextAfter { node, text, .. } => {
                let node_id = self.lookup(action, tree, node)?;
                let old = tree.node_mut(node_id).tail.take();
                let parent = tree.parent(node_id);
                self.make_diff_tags(tree, old, text.clone(), node_id, parent);
            }
            EditAction::InsertNamespace { prefix, uri } => {
                self.nsmap.insert(prefix.clone(), uri.clone());
            }
            EditAction::DeleteNamespace { .. } => {
                // Dropped declarations fall out of the serialization.
            }
            EditAction::InsertComment { .. } => {
                // This rendering strips comments in prepare, so a script
                // it is asked to render never legitimately contains one.
                return Err(FormatError::Unsupported {
                    action: format!("{action:?}"),
                });
            }
        }
        Ok(())
    }

    /// Run the inline text diff between two versions of a text slot and
    /// write the result into the tree: equal spans as plain text, changed
    /// spans wrapped in marker elements (as placeholders, expanded later),
    /// changed placeholders re-keyed to marked variants.
    ///
    /// With `parent` absent the target slot is `node.text`; otherwise it
    /// is `node.tail`, accumulated inside `parent`.
    fn make_diff_tags(
        &mut self,
        tree: &mut Document,
        old_value: Option<String>,
        new_value: Option<String>,
        node: NodeId,
        parent: Option<NodeId>,
    ) {
        let mut old_value = old_value.unwrap_or_default();
        let mut new_value = new_value.unwrap_or_default();
        if self.normalize.text() {
            old_value = cleanup_whitespace(&old_value).trim().to_string();
            new_value = cleanup_whitespace(&new_value).trim().to_string();
        }

        let chunks = self.realign_placeholders(text_diff(&old_value, &new_value));
        let pieces = if self.use_replace {
            join_delete_insert(chunks)
        } else {
            chunks
                .into_iter()
                .map(|(op, text)| match op {
                    TextOp::Equal => Piece::Equal(text),
                    TextOp::Delete => Piece::Delete(text),
                    TextOp::Insert => Piece::Insert(text),
                })
                .collect()
        };

        for piece in pieces {
            let (kind, text, attributes) = match piece {
                Piece::Equal(text) => {
                    self.append_text(tree, node, parent, &text);
                    continue;
                }
                Piece::Delete(text) => (MarkerKind::Delete, text, BTreeMap::new()),
                Piece::Insert(text) => (MarkerKind::Insert, text, BTreeMap::new()),
                Piece::Replace { new, old } => {
                    let mut attributes = BTreeMap::new();
                    attributes.insert("old-text".to_string(), old);
                    (MarkerKind::Replace, new, attributes)
                }
            };

            let mut chars = text.chars();
            let addition = match (chars.next(), chars.next()) {
                (Some(ch), None) if self.placeholderer.is_placeholder(ch) => self
                    .placeholderer
                    .mark_diff(ch, kind.as_str(), &attributes)
                    .to_string(),
                _ => self.placeholderer.wrap_diff(&text, kind, &attributes),
            };
            self.append_text(tree, node, parent, &addition);
        }
    }

    fn append_text(&self, tree: &mut Document, node: NodeId, parent: Option<NodeId>, text: &str) {
        let slot = match parent {
            None => &mut tree.node_mut(node).text,
            Some(_) => &mut tree.node_mut(node).tail,
        };
        match slot {
            Some(existing) => existing.push_str(text),
            None => *slot = Some(text.to_string()),
        }
    }

    /// Balance open/close placeholders in the diff stream.
    ///
    /// The text diff deletes before it inserts, which can interleave the
    /// close marker of one version with the open marker of the other.
    /// Tracking open markers on a stack and forcing every unmatched close
    /// out before the one requested keeps the structure well formed, so
    /// the placeholder expansion always yields a balanced tree.
    fn realign_placeholders(&self, chunks: Vec<(TextOp, String)>) -> Vec<(TextOp, String)> {
        let mut result: Vec<(TextOp, String)> = Vec::new();
        let mut stack: Vec<(TextOp, char)> = Vec::new();

        for (op, text) in chunks {
            for segment in self.placeholderer.split_string(&text) {
                match segment {
                    Segment::Text(t) => result.push((op, t)),
                    Segment::Placeholder(ch) => {
                        let entry = self.placeholderer.entry(ch).expect("known placeholder");
                        match entry.ttype {
                            TagType::Single => result.push((op, ch.to_string())),
                            TagType::Open => {
                                stack.push((op, entry.close_ph.expect("open has a close")));
                                result.push((op, ch.to_string()));
                            }
                            TagType::Close => loop {
                                match stack.pop() {
                                    Some((_, close)) if close == ch => {
                                        result.push((op, ch.to_string()));
                                        break;
                                    }
                                    Some((stack_op, close)) => {
                                        result.push((stack_op, close.to_string()));
                                    }
                                    // A close with no open on the stack has
                                    // nothing to balance; drop it.
                                    None => break,
                                }
                            },
                        }
                    }
                }
            }
        }
        result
    }
}

impl Formatter for XmlFormatter {
    fn normalize(&self) -> Normalize {
        self.normalize
    }

    fn prepare(&mut self, left: &mut Document, right: &mut Document) {
        // Comments are not part of this rendering.
        remove_comments(left);
        remove_comments(right);
        self.placeholderer.do_tree(left);
        self.placeholderer.do_tree(right);
    }

    fn format(&mut self, actions: &[EditAction], left: &Document) -> Result<String, FormatError> {
        let mut result = left.clone();
        for action in actions {
            self.handle_action(action, &mut result)?;
        }
        self.placeholderer.undo_tree(&mut result);

        let mut extra = self.nsmap.clone();
        if !uses_uri(&result, DIFF_NS) {
            extra.remove(DIFF_PREFIX);
        }
        Ok(write_with(&result, &extra, self.pretty_print)?)
    }
}

enum Piece {
    Equal(String),
    Delete(String),
    Insert(String),
    Replace { new: String, old: String },
}

/// Merge adjacent delete/insert pairs into replace pieces.
fn join_delete_insert(chunks: Vec<(TextOp, String)>) -> Vec<Piece> {
    if chunks.is_empty() {
        return Vec::new();
    }
    let mut pieces = Vec::new();
    let mut skip_next = false;
    for i in 0..chunks.len() - 1 {
        if skip_next {
            skip_next = false;
            continue;
        }
        let (op, text) = &chunks[i];
        let (next_op, next_text) = &chunks[i + 1];
        match (op, next_op) {
            (TextOp::Insert, TextOp::Delete) => {
                pieces.push(Piece::Replace {
                    new: text.clone(),
                    old: next_text.clone(),
                });
                skip_next = true;
            }
            (TextOp::Delete, TextOp::Insert) => {
                pieces.push(Piece::Replace {
                    new: next_text.clone(),
                    old: text.clone(),
                });
                skip_next = true;
            }
            _ => pieces.push(piece_of(*op, text.clone())),
        }
    }
    if !skip_next {
        let (op, text) = chunks.last().expect("chunks are not empty").clone();
        pieces.push(piece_of(op, text));
    }
    pieces
}

fn piece_of(op: TextOp, text: String) -> Piece {
    match op {
        TextOp::Equal => Piece::Equal(text),
        TextOp::Delete => Piece::Delete(text),
        TextOp::Insert => Piece::Insert(text),
    }
}

fn mark_deleted(tree: &mut Document, node: NodeId) {
    tree.node_mut(node).attrs.insert(diff_name("delete"), String::new());
}

/// Append to the node's accumulated `diff:<action>-attr` marker, `;`
/// separated when several attribute operations hit the same node.
fn extend_diff_attr(tree: &mut Document, node: NodeId, action: &str, value: &str) {
    let name = diff_name(&format!("{action}-attr"));
    let attrs = &mut tree.node_mut(node).attrs;
    let combined = match attrs.get(&name) {
        Some(existing) if !existing.is_empty() => format!("{existing};{value}"),
        _ => value.to_string(),
    };
    attrs.insert(name, combined);
}

/// The authored insert position counts only live children; skip the
/// delete-marked ones that are still physically present.
fn real_insert_position(tree: &Document, target: NodeId, position: usize) -> usize {
    let delete_name = diff_name("delete");
    let mut live = 0;
    let mut offset = 0;
    for &child in tree.children(target) {
        if tree.node(child).attrs.contains_key(&delete_name) {
            offset += 1;
        } else {
            live += 1;
        }
        if live > position {
            break;
        }
    }
    position + offset
}

fn remove_comments(tree: &mut Document) {
    let comments: Vec<NodeId> = post_order(tree, tree.root())
        .filter(|id| tree.node(*id).kind == NodeKind::Comment)
        .collect();
    for comment in comments {
        tree.detach(comment);
    }
}

fn uses_uri(tree: &Document, uri: &str) -> bool {
    let marker = format!("{{{uri}}}");
    post_order(tree, tree.root()).any(|id| {
        let data = tree.node(id);
        data.tag.starts_with(&marker) || data.attrs.keys().any(|k| k.starts_with(&marker))
    })
}
