use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use thiserror::Error;

use crate::actions::EditAction;
use crate::ratio::RatioMode;
use crate::tree::{breadth_first, post_order, reverse_post_order, Document, NodeId, NodeKind, XML_NS};
use crate::utils::{cleanup_whitespace, longest_common_subsequence};
use crate::xpath::{split_clark, xpath_of};

/// Errors raised when configuring or running the differ.
#[derive(Debug, Error)]
pub enum DiffError {
    /// Invalid configuration, rejected at construction.
    #[error("invalid differ configuration: {0}")]
    Config(String),
    /// A prefix is bound to different URIs on each side. There is no edit
    /// primitive for rebinding, so the diff refuses to guess.
    #[error("namespace prefix '{prefix}' is bound to different URIs on each side")]
    NamespaceRebinding { prefix: String },
    /// `match_trees` or `diff` called before `set_trees`.
    #[error("no trees have been set")]
    TreesNotSet,
}

/// An attribute that uniquely identifies a node, either everywhere or only
/// on a specific tag. When present on either side of a candidate pair it
/// becomes the sole determinant of the match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniqueAttr {
    Attr(String),
    TagAttr { tag: String, attr: String },
}

impl UniqueAttr {
    /// Parse a comma-separated list of `attr` or `{uri}tag@attr` entries.
    pub fn parse_list(spec: &str) -> Result<Vec<UniqueAttr>, DiffError> {
        let mut out = Vec::new();
        for entry in spec.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            match entry.split_once('@') {
                Some((tag, attr)) => {
                    if tag.is_empty() || attr.is_empty() {
                        return Err(DiffError::Config(format!(
                            "malformed unique attribute entry '{entry}'"
                        )));
                    }
                    out.push(UniqueAttr::TagAttr {
                        tag: tag.to_string(),
                        attr: attr.to_string(),
                    });
                }
                None => out.push(UniqueAttr::Attr(entry.to_string())),
            }
        }
        Ok(out)
    }
}

/// Configures matching behavior.
#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Minimum similarity for two nodes to be considered a match.
    pub f: f64,
    /// Attributes that uniquely identify a node.
    pub unique_attrs: Vec<UniqueAttr>,
    /// Sequence-similarity ratio used on node fingerprints.
    pub ratio_mode: RatioMode,
    /// Match with an LCS over the post-order node sequences.
    pub fast_match: bool,
    /// Pair all exact matches first, then fall back to greedy best-score
    /// matching. Mutually exclusive with `fast_match`.
    pub best_match: bool,
    /// Attributes removed from consideration when fingerprinting.
    pub ignored_attrs: Vec<String>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            f: 0.5,
            unique_attrs: vec![UniqueAttr::Attr(format!("{{{XML_NS}}}id"))],
            ratio_mode: RatioMode::default(),
            fast_match: false,
            best_match: false,
            ignored_attrs: Vec::new(),
        }
    }
}

/// One entry of the match set. Pairs found by the fast-match LCS carry no
/// score: the LCS only establishes that the ratio cleared the threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub left: NodeId,
    pub right: NodeId,
    pub score: Option<f64>,
}

/// Computes a node matching across two trees and an edit script that
/// realizes the right tree from the left.
///
/// The differ owns a deep copy of the left tree and mutates it while
/// emitting actions, so every xpath in the script is valid against the
/// tree state the patcher will have reached by that point. Not reusable
/// across concurrent calls; separate instances are independent.
pub struct Differ {
    options: DiffOptions,
    left: Option<Document>,
    right: Option<Document>,
    matches: Option<Vec<Match>>,
    l2r: HashMap<NodeId, NodeId>,
    r2l: HashMap<NodeId, NodeId>,
    inorder_left: HashSet<NodeId>,
    inorder_right: HashSet<NodeId>,
    left_fingerprints: HashMap<NodeId, String>,
    right_fingerprints: HashMap<NodeId, String>,
}

impl Differ {
    pub fn new(options: DiffOptions) -> Result<Self, DiffError> {
        if !(0.0..=1.0).contains(&options.f) {
            return Err(DiffError::Config(format!(
                "F must be between 0 and 1, got {}",
                options.f
            )));
        }
        if options.fast_match && options.best_match {
            return Err(DiffError::Config(
                "fast_match and best_match are mutually exclusive".to_string(),
            ));
        }
        Ok(Self {
            options,
            left: None,
            right: None,
            matches: None,
            l2r: HashMap::new(),
            r2l: HashMap::new(),
            inorder_left: HashSet::new(),
            inorder_right: HashSet::new(),
            left_fingerprints: HashMap::new(),
            right_fingerprints: HashMap::new(),
        })
    }

    /// Drop all per-run state: trees, matches, maps, in-order sets and
    /// fingerprint caches.
    pub fn clear(&mut self) {
        self.left = None;
        self.right = None;
        self.matches = None;
        self.l2r.clear();
        self.r2l.clear();
        self.inorder_left.clear();
        self.inorder_right.clear();
        self.left_fingerprints.clear();
        self.right_fingerprints.clear();
    }

    /// Install the two trees to diff. The left tree is deep-copied; the
    /// caller keeps ownership of both inputs.
    pub fn set_trees(&mut self, left: &Document, right: &Document) {
        self.clear();
        self.left = Some(left.clone());
        self.right = Some(right.clone());
    }

    /// The working copy of the left tree, which `diff` transforms toward
    /// the right tree as it emits actions.
    pub fn working_tree(&self) -> Option<&Document> {
        self.left.as_ref()
    }

    fn append_match(&mut self, lnode: NodeId, rnode: NodeId, score: Option<f64>) {
        self.matches.get_or_insert_with(Vec::new).push(Match {
            left: lnode,
            right: rnode,
            score,
        });
        self.l2r.insert(lnode, rnode);
        self.r2l.insert(rnode, lnode);
    }

    /// Establish the match set between the two trees. Idempotent: the
    /// result of the first call is cached until `clear` or `set_trees`.
    pub fn match_trees(&mut self) -> Result<&[Match], DiffError> {
        if self.left.is_none() || self.right.is_none() {
            return Err(DiffError::TreesNotSet);
        }
        if self.matches.is_some() {
            return Ok(self.matches.as_deref().unwrap());
        }
        self.matches = Some(Vec::new());

        let left_root = self.left.as_ref().unwrap().root();
        let right_root = self.right.as_ref().unwrap().root();

        // Work leaves-first, with the roots held out: they are paired
        // unconditionally at the end.
        let mut lnodes: Vec<NodeId> =
            post_order(self.left.as_ref().unwrap(), left_root).collect();
        let mut rnodes: Vec<NodeId> =
            post_order(self.right.as_ref().unwrap(), right_root).collect();
        lnodes.retain(|n| *n != left_root);
        rnodes.retain(|n| *n != right_root);

        if self.options.fast_match {
            let threshold = self.options.f;
            let (lsnap, rsnap) = (lnodes.clone(), rnodes.clone());
            let pairs = longest_common_subsequence(&lsnap, &rsnap, |l, r| {
                self.node_ratio(*l, *r) >= threshold
            });
            for &(li, ri) in &pairs {
                self.append_match(lsnap[li], rsnap[ri], None);
            }
            for &(li, ri) in pairs.iter().rev() {
                lnodes.remove(li);
                rnodes.remove(ri);
            }
        } else if self.options.best_match {
            let mut unmatched: Vec<(NodeId, Option<NodeId>, f64)> = Vec::new();

            // First pass: take every perfect match immediately.
            for lnode in std::mem::take(&mut lnodes) {
                let mut max_match = 0.0;
                let mut match_node = None;
                let mut found = false;
                let mut i = 0;
                while i < rnodes.len() {
                    let rnode = rnodes[i];
                    let score = self.node_ratio(lnode, rnode);
                    if score == 1.0 {
                        self.append_match(lnode, rnode, Some(1.0));
                        rnodes.remove(i);
                        found = true;
                        break;
                    }
                    if score > max_match {
                        match_node = Some(rnode);
                        max_match = score;
                    }
                    i += 1;
                }
                if !found {
                    unmatched.push((lnode, match_node, max_match));
                }
            }

            // Second pass: greedy best-score matching of the leftovers,
            // skipping candidates a perfect match already claimed.
            for (lnode, match_node, max_match) in unmatched {
                match match_node {
                    Some(rnode) if max_match >= self.options.f && rnodes.contains(&rnode) => {
                        self.append_match(lnode, rnode, Some(max_match));
                        rnodes.retain(|n| *n != rnode);
                    }
                    _ => lnodes.push(lnode),
                }
            }
        }

        // Generic scan over whatever remains, in post order, best score
        // wins, first candidate wins ties, a perfect score short-circuits.
        for lnode in std::mem::take(&mut lnodes) {
            let mut max_match = 0.0;
            let mut match_node = None;
            for &rnode in &rnodes {
                let score = self.node_ratio(lnode, rnode);
                if score > max_match {
                    match_node = Some(rnode);
                    max_match = score;
                }
                if score == 1.0 {
                    break;
                }
            }
            if max_match >= self.options.f {
                if let Some(rnode) = match_node {
                    self.append_match(lnode, rnode, Some(max_match));
                    rnodes.retain(|n| *n != rnode);
                }
            }
        }

        self.append_match(left_root, right_root, Some(1.0));
        Ok(self.matches.as_deref().unwrap())
    }

    /// Similarity of two nodes in `[0, 1]`.
    pub fn node_ratio(&mut self, lnode: NodeId, rnode: NodeId) -> f64 {
        let left = self.left.as_ref().expect("trees set");
        let right = self.right.as_ref().expect("trees set");
        let (lkind, rkind) = (left.node(lnode).kind, right.node(rnode).kind);
        if lkind == NodeKind::Comment || rkind == NodeKind::Comment {
            if lkind == rkind {
                let ltext = left.node(lnode).text.clone().unwrap_or_default();
                let rtext = right.node(rnode).text.clone().unwrap_or_default();
                return self.options.ratio_mode.ratio(&ltext, &rtext);
            }
            return 0.0;
        }

        for unique in &self.options.unique_attrs {
            let attr = match unique {
                UniqueAttr::Attr(attr) => attr,
                UniqueAttr::TagAttr { tag, attr } => {
                    if *tag != left.node(lnode).tag || *tag != right.node(rnode).tag {
                        continue;
                    }
                    attr
                }
            };
            let lvalue = left.node(lnode).attrs.get(attr);
            let rvalue = right.node(rnode).attrs.get(attr);
            if lvalue.is_some() || rvalue.is_some() {
                // The identifier is authoritative, content is not consulted.
                return if lvalue == rvalue { 1.0 } else { 0.0 };
            }
        }

        let leaf = self.leaf_ratio(lnode, rnode);
        match self.child_ratio(lnode, rnode) {
            Some(child) => ((leaf * leaf + child * child) / 2.0).sqrt(),
            None => leaf,
        }
    }

    fn leaf_ratio(&mut self, lnode: NodeId, rnode: NodeId) -> f64 {
        let Self {
            options,
            left,
            right,
            left_fingerprints,
            right_fingerprints,
            ..
        } = self;
        let ltext = fingerprint(
            left.as_ref().expect("trees set"),
            lnode,
            &options.ignored_attrs,
            left_fingerprints,
        );
        let rtext = fingerprint(
            right.as_ref().expect("trees set"),
            rnode,
            &options.ignored_attrs,
            right_fingerprints,
        );
        options.ratio_mode.ratio(&ltext, &rtext)
    }

    /// Fraction of already-matched child pairs, or `None` for two leaves.
    fn child_ratio(&self, lnode: NodeId, rnode: NodeId) -> Option<f64> {
        let left = self.left.as_ref().expect("trees set");
        let right = self.right.as_ref().expect("trees set");
        let lchildren = left.children(lnode);
        let rchildren = right.children(rnode);
        if lchildren.is_empty() && rchildren.is_empty() {
            return None;
        }

        let rset: HashSet<NodeId> = rchildren.iter().copied().collect();
        let count = lchildren
            .iter()
            .filter(|lchild| {
                self.l2r
                    .get(lchild)
                    .is_some_and(|rchild| rset.contains(rchild))
            })
            .count();
        Some(count as f64 / lchildren.len().max(rchildren.len()) as f64)
    }

    /// Generate the edit script. Matches first if needed.
    pub fn diff(&mut self) -> Result<Vec<EditAction>, DiffError> {
        if self.matches.is_none() {
            self.match_trees()?;
        }
        let mut actions = Vec::new();

        self.diff_namespaces(&mut actions)?;

        // Insert, move, rename, attribute and text updates, walking the
        // right tree top-down so parents are in place before children.
        let rnodes: Vec<NodeId> = {
            let right = self.right.as_ref().unwrap();
            breadth_first(right, right.root()).collect()
        };
        for rnode in rnodes {
            let rparent = self.right.as_ref().unwrap().parent(rnode);
            let ltarget = rparent.and_then(|p| self.r2l.get(&p).copied());

            if !self.r2l.contains_key(&rnode) {
                self.insert_node(rnode, ltarget, &mut actions);
            } else {
                self.move_and_rename(rnode, ltarget, &mut actions);
            }

            let lnode = self.r2l[&rnode];
            self.align_children(lnode, rnode, &mut actions);
            // Text updates come after child alignment: an annotated diff of
            // the text generates extra children, which would confuse later
            // inserts and deletes.
            self.update_node_text(lnode, rnode, &mut actions);
        }

        // Anything left unmatched in the working tree is deleted, leaves
        // first so whole-subtree removals collapse naturally.
        let lnodes: Vec<NodeId> = {
            let left = self.left.as_ref().unwrap();
            reverse_post_order(left, left.root()).collect()
        };
        for lnode in lnodes {
            if !self.l2r.contains_key(&lnode) {
                let left = self.left.as_mut().unwrap();
                actions.push(EditAction::DeleteNode {
                    node: xpath_of(left, lnode),
                });
                left.detach(lnode);
            }
        }

        Ok(actions)
    }

    fn diff_namespaces(&mut self, actions: &mut Vec<EditAction>) -> Result<(), DiffError> {
        let left_ns = self.left.as_ref().unwrap().nsmap.clone();
        let right_ns = self.right.as_ref().unwrap().nsmap.clone();

        for (prefix, uri) in &right_ns {
            match left_ns.get(prefix) {
                None => actions.push(EditAction::InsertNamespace {
                    prefix: prefix.clone(),
                    uri: uri.clone(),
                }),
                Some(existing) if existing != uri => {
                    return Err(DiffError::NamespaceRebinding {
                        prefix: prefix.clone(),
                    });
                }
                Some(_) => {}
            }
        }
        for prefix in left_ns.keys() {
            if !right_ns.contains_key(prefix) {
                actions.push(EditAction::DeleteNamespace {
                    prefix: prefix.clone(),
                });
            }
        }

        // Tags inserted from the right tree may use prefixes the left tree
        // has never seen; make them resolvable for xpath generation.
        let right_prefixes = self.right.as_ref().unwrap().prefixes.clone();
        let left = self.left.as_mut().unwrap();
        for (prefix, uri) in right_prefixes {
            left.prefixes.entry(prefix).or_insert(uri);
        }
        Ok(())
    }

    fn insert_node(
        &mut self,
        rnode: NodeId,
        ltarget: Option<NodeId>,
        actions: &mut Vec<EditAction>,
    ) {
        let position = self.find_pos(rnode);
        let ltarget = ltarget.expect("breadth-first order matches parents before children");
        let rdata = self.right.as_ref().unwrap().node(rnode).clone();

        let left = self.left.as_mut().unwrap();
        let target_path = xpath_of(left, ltarget);
        let lnode = match rdata.kind {
            NodeKind::Comment => {
                let text = rdata.text.clone().unwrap_or_default();
                actions.push(EditAction::InsertComment {
                    target: target_path,
                    position,
                    text: text.clone(),
                });
                left.create_comment(text)
            }
            NodeKind::Element => {
                actions.push(EditAction::InsertNode {
                    target: target_path,
                    tag: rdata.tag.clone(),
                    position,
                });
                left.create_element(rdata.tag.clone())
            }
        };

        self.append_match(lnode, rnode, Some(1.0));
        self.left.as_mut().unwrap().insert(ltarget, position, lnode);
        self.inorder_left.insert(lnode);
        self.inorder_right.insert(rnode);
        self.update_node_attr(lnode, rnode, actions);
    }

    fn move_and_rename(
        &mut self,
        rnode: NodeId,
        ltarget: Option<NodeId>,
        actions: &mut Vec<EditAction>,
    ) {
        let lnode = self.r2l[&rnode];
        let lparent = self.left.as_ref().unwrap().parent(lnode);

        if ltarget != lparent {
            let position = self.find_pos(rnode);
            let ltarget = ltarget.expect("only the roots have no parents, and they are matched");
            let left = self.left.as_mut().unwrap();
            actions.push(EditAction::MoveNode {
                node: xpath_of(left, lnode),
                target: xpath_of(left, ltarget),
                position,
            });
            left.detach(lnode);
            left.insert(ltarget, position, lnode);
            self.inorder_left.insert(lnode);
            self.inorder_right.insert(rnode);
        }

        let rtag = self.right.as_ref().unwrap().node(rnode).tag.clone();
        let left = self.left.as_mut().unwrap();
        if left.node(lnode).tag != rtag {
            actions.push(EditAction::RenameNode {
                node: xpath_of(left, lnode),
                tag: rtag.clone(),
            });
            left.node_mut(lnode).tag = rtag;
        }

        self.update_node_attr(lnode, rnode, actions);
    }

    fn update_node_attr(&mut self, lnode: NodeId, rnode: NodeId, actions: &mut Vec<EditAction>) {
        let ignored = self.options.ignored_attrs.clone();
        let right_attrs = considered_attrs(self.right.as_ref().unwrap(), rnode, &ignored);
        let left_attrs = considered_attrs(self.left.as_ref().unwrap(), lnode, &ignored);
        let left = self.left.as_mut().unwrap();
        let left_xpath = xpath_of(left, lnode);

        let left_keys: BTreeSet<&String> = left_attrs.keys().collect();
        let right_keys: BTreeSet<&String> = right_attrs.keys().collect();

        // Update: common attributes whose values differ. Sorted order
        // keeps the edit script reproducible.
        for &key in left_keys.intersection(&right_keys) {
            if left_attrs[key] != right_attrs[key] {
                actions.push(EditAction::UpdateAttrib {
                    node: left_xpath.clone(),
                    name: key.clone(),
                    value: right_attrs[key].clone(),
                });
                left.node_mut(lnode)
                    .attrs
                    .insert(key.clone(), right_attrs[key].clone());
            }
        }

        let mut new_keys: BTreeSet<String> = right_keys
            .difference(&left_keys)
            .map(|k| (*k).clone())
            .collect();
        let removed_keys: Vec<String> = left_keys
            .difference(&right_keys)
            .map(|k| (*k).clone())
            .collect();

        // Move: a removed attribute whose value reappears under a new name
        // is a rename, one action instead of a delete and an insert.
        let mut new_by_value: BTreeMap<String, String> = BTreeMap::new();
        for (key, value) in &right_attrs {
            if new_keys.contains(key) {
                new_by_value.insert(value.clone(), key.clone());
            }
        }
        for old_name in &removed_keys {
            let value = left_attrs[old_name].clone();
            if let Some(new_name) = new_by_value.remove(&value) {
                actions.push(EditAction::RenameAttrib {
                    node: left_xpath.clone(),
                    old_name: old_name.clone(),
                    new_name: new_name.clone(),
                });
                new_keys.remove(&new_name);
                left.node_mut(lnode).attrs.remove(old_name);
                left.node_mut(lnode).attrs.insert(new_name, value);
            }
        }

        // Insert: attributes only on the right.
        for key in &new_keys {
            actions.push(EditAction::InsertAttrib {
                node: left_xpath.clone(),
                name: key.clone(),
                value: right_attrs[key].clone(),
            });
            left.node_mut(lnode)
                .attrs
                .insert(key.clone(), right_attrs[key].clone());
        }

        // Delete: attributes only on the left, unless consumed by a rename.
        for key in &removed_keys {
            if !left.node(lnode).attrs.contains_key(key) {
                continue;
            }
            actions.push(EditAction::DeleteAttrib {
                node: left_xpath.clone(),
                name: key.clone(),
            });
            left.node_mut(lnode).attrs.remove(key);
        }
    }

    fn update_node_text(&mut self, lnode: NodeId, rnode: NodeId, actions: &mut Vec<EditAction>) {
        let rdata = self.right.as_ref().unwrap().node(rnode);
        let (rtext, rtail) = (rdata.text.clone(), rdata.tail.clone());
        let left = self.left.as_mut().unwrap();
        let left_xpath = xpath_of(left, lnode);

        if left.node(lnode).text != rtext {
            actions.push(EditAction::UpdateTextIn {
                node: left_xpath.clone(),
                text: rtext.clone(),
                old_text: left.node(lnode).text.clone(),
            });
            left.node_mut(lnode).text = rtext;
        }
        if left.node(lnode).tail != rtail {
            actions.push(EditAction::UpdateTextAfter {
                node: left_xpath,
                text: rtail.clone(),
                old_text: left.node(lnode).tail.clone(),
            });
            left.node_mut(lnode).tail = rtail;
        }
    }

    /// Where a right node belongs among the children of its parent's
    /// partner in the working tree.
    fn find_pos(&self, rnode: NodeId) -> usize {
        let right = self.right.as_ref().expect("trees set");
        let left = self.left.as_ref().expect("trees set");
        let rparent = right.parent(rnode).expect("find_pos is never asked about a root");
        let siblings = right.children(rparent);
        let own_index = right.index_of(rparent, rnode).expect("node is a child of its parent");

        // The last preceding sibling already in order, if any.
        let anchor = siblings[..own_index]
            .iter()
            .copied()
            .rev()
            .find(|s| self.inorder_right.contains(s));
        let Some(anchor) = anchor else {
            return 0;
        };

        // One past the anchor's partner, counting only children that are
        // in order or destined for deletion; matched but out-of-order
        // children do not occupy a slot yet.
        let anchor_match = self.r2l[&anchor];
        let node_match = self.r2l.get(&rnode).copied();
        let lparent = left.parent(anchor_match).expect("partner of a non-root is attached");

        let mut position = 0;
        for &child in left.children(lparent) {
            if Some(child) == node_match {
                continue;
            }
            if self.inorder_left.contains(&child) || !self.l2r.contains_key(&child) {
                position += 1;
            }
            if child == anchor_match {
                break;
            }
        }
        position
    }

    /// Mark the longest stable run of matched children as in order and
    /// move every remaining matched child into place.
    fn align_children(&mut self, lnode: NodeId, rnode: NodeId, actions: &mut Vec<EditAction>) {
        let (lchildren, rchildren) = {
            let left = self.left.as_ref().unwrap();
            let right = self.right.as_ref().unwrap();
            let lchildren: Vec<NodeId> = left
                .children(lnode)
                .iter()
                .copied()
                .filter(|c| {
                    self.l2r
                        .get(c)
                        .is_some_and(|r| right.parent(*r) == Some(rnode))
                })
                .collect();
            let rchildren: Vec<NodeId> = right
                .children(rnode)
                .iter()
                .copied()
                .filter(|c| {
                    self.r2l
                        .get(c)
                        .is_some_and(|l| left.parent(*l) == Some(lnode))
                })
                .collect();
            (lchildren, rchildren)
        };
        if lchildren.is_empty() || rchildren.is_empty() {
            return;
        }

        let pairs = longest_common_subsequence(&lchildren, &rchildren, |l, r| {
            self.l2r.get(l) == Some(r)
        });
        for &(li, ri) in &pairs {
            self.inorder_left.insert(lchildren[li]);
            self.inorder_right.insert(rchildren[ri]);
        }

        for lchild in lchildren {
            if self.inorder_left.contains(&lchild) {
                continue;
            }
            let rchild = self.l2r[&lchild];
            let position = self.find_pos(rchild);
            let rtarget = self.right.as_ref().unwrap().parent(rchild).expect("aligned child has a parent");
            let ltarget = self.r2l[&rtarget];

            let left = self.left.as_mut().unwrap();
            actions.push(EditAction::MoveNode {
                node: xpath_of(left, lchild),
                target: xpath_of(left, ltarget),
                position,
            });
            left.detach(lchild);
            left.insert(ltarget, position, lchild);
            self.inorder_left.insert(lchild);
            self.inorder_right.insert(rchild);
        }
    }
}

/// The fingerprint of a node: its tag, its direct text chunks in document
/// order, then each `name:value` attribute pair in sorted order with
/// namespace URIs stripped from the names, whitespace-collapsed.
fn fingerprint(
    doc: &Document,
    node: NodeId,
    ignored_attrs: &[String],
    cache: &mut HashMap<NodeId, String>,
) -> String {
    if let Some(cached) = cache.get(&node) {
        return cached.clone();
    }
    let data = doc.node(node);
    let mut parts: Vec<String> = Vec::new();
    if data.kind == NodeKind::Element {
        parts.push(data.tag.clone());
    }
    if let Some(text) = &data.text {
        parts.push(text.clone());
    }
    for child in doc.children(node) {
        if let Some(tail) = &doc.node(*child).tail {
            parts.push(tail.clone());
        }
    }
    for (name, value) in &data.attrs {
        if ignored_attrs.contains(name) {
            continue;
        }
        let local = split_clark(name).map(|(_, local)| local).unwrap_or(name);
        parts.push(format!("{local}:{value}"));
    }
    let result = cleanup_whitespace(parts.join(" ").trim());
    cache.insert(node, result.clone());
    result
}

fn considered_attrs(
    doc: &Document,
    node: NodeId,
    ignored: &[String],
) -> BTreeMap<String, String> {
    doc.node(node)
        .attrs
        .iter()
        .filter(|(name, _)| !ignored.contains(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}
