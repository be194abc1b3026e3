use std::collections::{BTreeMap, HashMap};

use crate::format::DIFF_NS;
use crate::tree::{breadth_first, Document, Fragment, NodeId};

/// First code point of the private-use block the placeholders are drawn
/// from. Allocation is sequential, so the same processing order yields the
/// same characters on both sides of a diff.
pub const PLACEHOLDER_START: u32 = 0xE000;

/// Whether a placeholder stands for an opening tag, a closing tag, or a
/// whole self-contained subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagType {
    Open,
    Close,
    Single,
}

/// What one placeholder character stands for.
#[derive(Debug, Clone)]
pub struct PlaceholderEntry {
    pub fragment: Fragment,
    pub ttype: TagType,
    /// For an opening placeholder, the character that closes it.
    pub close_ph: Option<char>,
}

/// A piece of a text string: either plain text or a single placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Placeholder(char),
}

/// The built-in wrapper elements for intra-text diff markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    Insert,
    Delete,
    Replace,
}

impl MarkerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerKind::Insert => "insert",
            MarkerKind::Delete => "delete",
            MarkerKind::Replace => "replace",
        }
    }
}

/// Replaces sub-elements of text-bearing elements with private-use
/// characters, and back.
///
/// Within a *text tag*, every child element becomes part of the parent's
/// text stream: a *formatting tag* contributes an open marker, its own
/// (recursively processed) text, and a close marker; any other child
/// collapses into one character standing for the whole subtree. Text can
/// then be diffed as a plain string, and the reverse walk re-materializes
/// the elements in place.
///
/// The mapping is stable by construction: a placeholder is keyed on the
/// serialized form of the element it replaces (tail excluded), so the same
/// markup in both trees maps to the same character.
pub struct PlaceholderMaker {
    text_tags: Vec<String>,
    formatting_tags: Vec<String>,
    placeholder2tag: HashMap<char, PlaceholderEntry>,
    tag2placeholder: HashMap<(String, TagType, Option<char>), char>,
    last_code: u32,
    diff_tags: HashMap<MarkerKind, (char, char)>,
}

impl PlaceholderMaker {
    pub fn new(text_tags: Vec<String>, formatting_tags: Vec<String>) -> Self {
        let mut maker = Self {
            text_tags,
            formatting_tags,
            placeholder2tag: HashMap::new(),
            tag2placeholder: HashMap::new(),
            last_code: PLACEHOLDER_START,
            diff_tags: HashMap::new(),
        };
        for kind in [MarkerKind::Insert, MarkerKind::Delete, MarkerKind::Replace] {
            let element = Fragment::element(format!("{{{DIFF_NS}}}{}", kind.as_str()));
            let close = maker.get_placeholder(element.clone(), TagType::Close, None);
            let open = maker.get_placeholder(element, TagType::Open, Some(close));
            maker.diff_tags.insert(kind, (open, close));
        }
        maker
    }

    /// The placeholder character for a fragment, allocating one the first
    /// time a `(serialized form, type, close partner)` combination shows up.
    pub fn get_placeholder(
        &mut self,
        fragment: Fragment,
        ttype: TagType,
        close_ph: Option<char>,
    ) -> char {
        let key = (fragment.to_string(), ttype, close_ph);
        if let Some(ph) = self.tag2placeholder.get(&key) {
            return *ph;
        }
        self.last_code += 1;
        let ph = char::from_u32(self.last_code).expect("private-use code point");
        self.placeholder2tag.insert(
            ph,
            PlaceholderEntry {
                fragment,
                ttype,
                close_ph,
            },
        );
        self.tag2placeholder.insert(key, ph);
        ph
    }

    pub fn is_placeholder(&self, ch: char) -> bool {
        self.placeholder2tag.contains_key(&ch)
    }

    pub fn entry(&self, ch: char) -> Option<&PlaceholderEntry> {
        self.placeholder2tag.get(&ch)
    }

    pub fn is_formatting(&self, tag: &str) -> bool {
        self.formatting_tags.iter().any(|t| t == tag)
    }

    /// Install placeholders under every attached text-tag element.
    pub fn do_tree(&mut self, doc: &mut Document) {
        if self.text_tags.is_empty() {
            return;
        }
        let candidates: Vec<NodeId> = breadth_first(doc, doc.root())
            .filter(|id| self.text_tags.contains(&doc.node(*id).tag))
            .collect();
        for id in candidates {
            // A text tag nested inside another one has already collapsed
            // into a single placeholder by the time we reach it.
            if doc.is_attached(id) {
                self.do_element(doc, id);
            }
        }
    }

    /// Fold every child of `element` into its text stream.
    pub fn do_element(&mut self, doc: &mut Document, element: NodeId) {
        let children: Vec<NodeId> = doc.children(element).to_vec();
        for child in children {
            let tail = doc.node_mut(child).tail.take().unwrap_or_default();

            let addition = if self.is_formatting(&doc.node(child).tag) {
                // Let the inside text participate in the diff: recurse,
                // pull the text out, and bracket it with an open/close
                // pair keyed on the emptied element.
                self.do_element(doc, child);
                let text = doc.node_mut(child).text.take().unwrap_or_default();
                let fragment = Fragment::of(doc, child);
                let close = self.get_placeholder(fragment.clone(), TagType::Close, None);
                let open = self.get_placeholder(fragment, TagType::Open, Some(close));
                format!("{open}{text}{close}{tail}")
            } else {
                // The whole subtree is one immutable unit.
                let fragment = Fragment::of(doc, child);
                let single = self.get_placeholder(fragment, TagType::Single, None);
                format!("{single}{tail}")
            };

            let slot = &mut doc.node_mut(element).text;
            match slot {
                Some(text) => text.push_str(&addition),
                None => *slot = Some(addition),
            }
            doc.detach(child);
        }
    }

    /// Split a string into plain-text and placeholder segments.
    pub fn split_string(&self, text: &str) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut current = String::new();
        for ch in text.chars() {
            if self.is_placeholder(ch) {
                if !current.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut current)));
                }
                segments.push(Segment::Placeholder(ch));
            } else {
                current.push(ch);
            }
        }
        if !current.is_empty() {
            segments.push(Segment::Text(current));
        }
        segments
    }

    /// Reverse [`Self::do_tree`]: re-materialize every placeholder in the
    /// texts and tails below `root`.
    pub fn undo_tree(&self, doc: &mut Document) {
        let root = doc.root();
        self.undo_element(doc, root);
    }

    fn undo_element(&self, doc: &mut Document, node: NodeId) {
        if self.placeholder2tag.is_empty() {
            return;
        }

        if let Some(text) = doc.node(node).text.clone() {
            let (content, found) = self.undo_string(&text);
            if found {
                doc.node_mut(node).text = content.text;
                for (index, fragment) in content.children.iter().enumerate() {
                    let child = fragment.materialize(doc);
                    doc.insert(node, index, child);
                }
            }
        }

        let children: Vec<NodeId> = doc.children(node).to_vec();
        for child in children {
            self.undo_element(doc, child);
        }

        if let Some(tail) = doc.node(node).tail.clone() {
            let (content, found) = self.undo_string(&tail);
            if found {
                doc.node_mut(node).tail = content.text;
                let parent = doc.parent(node).expect("a node with a tail has a parent");
                let base = doc.index_of(parent, node).expect("attached child") + 1;
                for (index, fragment) in content.children.iter().enumerate() {
                    let child = fragment.materialize(doc);
                    doc.insert(parent, base + index, child);
                    self.undo_element(doc, child);
                }
            }
        }
    }

    /// Expand the placeholders of one string into leading text plus a list
    /// of fragments carrying their tails. Text between an open/close pair
    /// becomes the fragment's text, nested placeholders included; they are
    /// expanded when the fragment is processed in turn.
    fn undo_string(&self, text: &str) -> (UndoContent, bool) {
        let mut segments: std::collections::VecDeque<Segment> =
            self.split_string(text).into();
        let mut content = UndoContent {
            text: None,
            children: Vec::new(),
        };
        let mut found = false;

        while let Some(segment) = segments.pop_front() {
            match segment {
                Segment::Placeholder(ch) => {
                    found = true;
                    let entry = self.placeholder2tag[&ch].clone();
                    let mut fragment = entry.fragment;
                    if entry.ttype == TagType::Open {
                        let close = entry.close_ph.expect("open placeholders have a close partner");
                        let mut inner = String::new();
                        loop {
                            match segments.pop_front() {
                                Some(Segment::Placeholder(c)) if c == close => break,
                                Some(Segment::Placeholder(c)) => inner.push(c),
                                Some(Segment::Text(t)) => inner.push_str(&t),
                                None => break,
                            }
                        }
                        fragment.text = (!inner.is_empty()).then_some(inner);
                        fragment.tail = None;
                    }
                    content.children.push(fragment);
                }
                Segment::Text(t) => match content.children.last_mut() {
                    Some(last) => match &mut last.tail {
                        Some(tail) => tail.push_str(&t),
                        None => last.tail = Some(t),
                    },
                    None => match &mut content.text {
                        Some(text) => text.push_str(&t),
                        None => content.text = Some(t),
                    },
                },
            }
        }
        (content, found)
    }

    /// Re-key a placeholder to a copy of its element marked with a diff
    /// action attribute. Close placeholders pass through: the action lives
    /// on the opening tag.
    pub fn mark_diff(
        &mut self,
        ph: char,
        action: &str,
        attributes: &BTreeMap<String, String>,
    ) -> char {
        let entry = self.placeholder2tag[&ph].clone();
        if entry.ttype == TagType::Close {
            return ph;
        }
        let mut fragment = entry.fragment;
        let action = if self.is_formatting(&fragment.tag) {
            format!("{action}-formatting")
        } else {
            action.to_string()
        };
        fragment
            .attrs
            .insert(format!("{{{DIFF_NS}}}{action}"), String::new());
        for (name, value) in attributes {
            fragment.attrs.insert(name.clone(), value.clone());
        }
        self.get_placeholder(fragment, entry.ttype, entry.close_ph)
    }

    /// Wrap plain text in one of the built-in marker pairs.
    pub fn wrap_diff(
        &mut self,
        text: &str,
        kind: MarkerKind,
        attributes: &BTreeMap<String, String>,
    ) -> String {
        let (mut open, close) = self.diff_tags[&kind];
        if !attributes.is_empty() {
            let entry = self.placeholder2tag[&open].clone();
            let mut fragment = entry.fragment;
            for (name, value) in attributes {
                fragment.attrs.insert(name.clone(), value.clone());
            }
            open = self.get_placeholder(fragment, entry.ttype, entry.close_ph);
        }
        format!("{open}{text}{close}")
    }
}

struct UndoContent {
    text: Option<String>,
    children: Vec<Fragment>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::writer::write;

    fn maker() -> PlaceholderMaker {
        PlaceholderMaker::new(
            vec!["para".to_string()],
            vec!["b".to_string(), "i".to_string()],
        )
    }

    #[test]
    fn single_children_collapse_to_one_character() {
        let mut doc = parse(b"<doc><para>before<ref id=\"1\"/>after</para></doc>").unwrap();
        let mut codec = maker();
        codec.do_tree(&mut doc);

        let para = doc.children(doc.root())[0];
        assert!(doc.children(para).is_empty());
        let text = doc.node(para).text.clone().unwrap();
        let placeholders: Vec<char> = text.chars().filter(|c| codec.is_placeholder(*c)).collect();
        assert_eq!(placeholders.len(), 1);
        assert_eq!(text.chars().count(), "beforeafter".chars().count() + 1);
    }

    #[test]
    fn formatting_children_become_open_close_pairs() {
        let mut doc = parse(b"<doc><para>a<b>bold</b>c</para></doc>").unwrap();
        let mut codec = maker();
        codec.do_tree(&mut doc);

        let para = doc.children(doc.root())[0];
        let text = doc.node(para).text.clone().unwrap();
        let placeholders: Vec<char> = text.chars().filter(|c| codec.is_placeholder(*c)).collect();
        assert_eq!(placeholders.len(), 2);
        // The bold text itself stays diffable between the markers.
        assert!(text.contains("bold"));
    }

    #[test]
    fn same_markup_maps_to_same_characters_across_trees() {
        let mut left = parse(b"<doc><para>x<b>hi</b></para></doc>").unwrap();
        let mut right = parse(b"<doc><para>y<b>ho</b>z</para></doc>").unwrap();
        let mut codec = maker();
        codec.do_tree(&mut left);
        codec.do_tree(&mut right);

        let text_of = |doc: &Document| {
            let para = doc.children(doc.root())[0];
            doc.node(para).text.clone().unwrap()
        };
        let lphs: Vec<char> = text_of(&left)
            .chars()
            .filter(|c| codec.is_placeholder(*c))
            .collect();
        let rphs: Vec<char> = text_of(&right)
            .chars()
            .filter(|c| codec.is_placeholder(*c))
            .collect();
        assert_eq!(lphs, rphs);
    }

    #[test]
    fn lookalike_fragments_get_distinct_placeholders() {
        let mut codec = maker();
        let mut textual = Fragment::element("ref");
        textual.text = Some("<y/>".to_string());
        let mut structural = Fragment::element("ref");
        structural.children.push(Fragment::element("y"));

        let a = codec.get_placeholder(textual, TagType::Single, None);
        let b = codec.get_placeholder(structural, TagType::Single, None);
        assert_ne!(a, b);
    }

    #[test]
    fn escaped_text_and_real_markup_survive_one_shared_codec() {
        // Both documents go through the same codec; the <ref> holding the
        // literal text "<y/>" must not collapse into the placeholder of
        // the <ref> holding an actual <y/> child.
        let markup_source = b"<doc><para>x<ref><y/></ref></para></doc>";
        let text_source = b"<doc><para>x<ref>&lt;y/&gt;</ref></para></doc>";
        let markup_original = parse(markup_source).unwrap();
        let text_original = parse(text_source).unwrap();

        let mut markup_doc = parse(markup_source).unwrap();
        let mut text_doc = parse(text_source).unwrap();
        let mut codec = maker();
        codec.do_tree(&mut markup_doc);
        codec.do_tree(&mut text_doc);
        codec.undo_tree(&mut markup_doc);
        codec.undo_tree(&mut text_doc);

        assert!(markup_doc.tree_eq(&markup_original));
        assert!(text_doc.tree_eq(&text_original));
    }

    #[test]
    fn text_tags_nested_in_text_tags_collapse_as_single_units() {
        let source = b"<doc><para>a<note>n<b>bb</b></note>c</para></doc>";
        let original = parse(source).unwrap();
        let mut doc = parse(source).unwrap();
        let mut codec = PlaceholderMaker::new(
            vec!["para".to_string(), "note".to_string()],
            vec!["b".to_string()],
        );
        codec.do_tree(&mut doc);

        // The outer text tag swallows the inner one whole: the detached
        // <note> is skipped by do_tree and its markup stays intact inside
        // one placeholder.
        let para = doc.children(doc.root())[0];
        assert!(doc.children(para).is_empty());
        let text = doc.node(para).text.clone().unwrap();
        let placeholders = text.chars().filter(|c| codec.is_placeholder(*c)).count();
        assert_eq!(placeholders, 1);

        codec.undo_tree(&mut doc);
        assert!(doc.tree_eq(&original));
    }

    #[test]
    fn undo_after_do_restores_the_tree() {
        let source = b"<doc><para>a<b>x<i>y</i></b>mid<ref id=\"7\">keep</ref>end</para><para>plain</para></doc>";
        let original = parse(source).unwrap();
        let mut doc = parse(source).unwrap();
        let mut codec = maker();
        codec.do_tree(&mut doc);
        codec.undo_tree(&mut doc);
        assert!(doc.tree_eq(&original));
        assert_eq!(write(&doc).unwrap(), write(&original).unwrap());
    }

    #[test]
    fn wrap_diff_round_trips_through_undo() {
        let mut doc = parse(b"<doc><para>payload</para></doc>").unwrap();
        let mut codec = maker();
        let wrapped = codec.wrap_diff("payload", MarkerKind::Insert, &BTreeMap::new());
        let para = doc.children(doc.root())[0];
        doc.node_mut(para).text = Some(wrapped);
        codec.undo_tree(&mut doc);

        let child = doc.children(para)[0];
        assert_eq!(doc.node(child).tag, format!("{{{DIFF_NS}}}insert"));
        assert_eq!(doc.node(child).text.as_deref(), Some("payload"));
    }
}
