use std::collections::BTreeMap;

use thiserror::Error;

use crate::tree::{Document, NodeId, NodeKind, XML_NS};

/// Errors raised while resolving an xpath against a tree.
#[derive(Debug, Error)]
pub enum XPathError {
    #[error("xpath {xpath} not found at {context}")]
    NotFound { xpath: String, context: String },
    #[error("multiple nodes found for xpath {xpath} at {context}")]
    Ambiguous { xpath: String, context: String },
    #[error("malformed xpath step '{0}'")]
    Malformed(String),
    #[error("unknown namespace prefix '{0}'")]
    UnknownPrefix(String),
}

#[derive(Debug, Clone, PartialEq)]
enum StepTest {
    /// Match elements by Clark-notation tag.
    Tag(String),
    /// Match any element.
    Wildcard,
    /// Match comment nodes.
    Comment,
}

/// Canonical positional path from the document root to `node`.
///
/// Follows the convention of the rest of this crate: a step carries a
/// 1-based index whenever its node has same-test siblings, the final step
/// always carries one. Elements in a namespace use `prefix:local` when a
/// prefix is registered and a wildcard step for the default namespace.
pub fn xpath_of(doc: &Document, node: NodeId) -> String {
    let mut steps = Vec::new();
    let mut current = node;
    loop {
        let parent = doc.parent(current);
        let (step, test) = step_and_test(doc, current);
        let matching = match parent {
            Some(p) => doc
                .children(p)
                .iter()
                .filter(|c| matches_test(doc, **c, &test))
                .count(),
            None => 1,
        };
        steps.push(if matching > 1 {
            let position = parent
                .map(|p| {
                    doc.children(p)
                        .iter()
                        .take_while(|c| **c != current)
                        .filter(|c| matches_test(doc, **c, &test))
                        .count()
                        + 1
                })
                .unwrap_or(1);
            format!("{step}[{position}]")
        } else {
            step
        });
        match parent {
            Some(p) => current = p,
            None => break,
        }
    }
    steps.reverse();
    let mut xpath = format!("/{}", steps.join("/"));
    if !xpath.ends_with(']') {
        // The path is unique without a count on the last step, but we
        // always want one so positions survive later edits.
        xpath.push_str("[1]");
    }
    xpath
}

/// Render the step for `node` together with the sibling test it implies.
/// A namespaced tag whose URI has no usable prefix becomes a wildcard
/// step, so its test widens to "any element" accordingly.
fn step_and_test(doc: &Document, node: NodeId) -> (String, StepTest) {
    let data = doc.node(node);
    match data.kind {
        NodeKind::Comment => ("comment()".to_string(), StepTest::Comment),
        NodeKind::Element => match split_clark(&data.tag) {
            Some((uri, local)) => match prefix_for(doc, uri) {
                Some(prefix) => (
                    format!("{prefix}:{local}"),
                    StepTest::Tag(data.tag.clone()),
                ),
                None => ("*".to_string(), StepTest::Wildcard),
            },
            None => (data.tag.clone(), StepTest::Tag(data.tag.clone())),
        },
    }
}

fn matches_test(doc: &Document, node: NodeId, test: &StepTest) -> bool {
    let data = doc.node(node);
    match test {
        StepTest::Comment => data.kind == NodeKind::Comment,
        StepTest::Wildcard => data.kind == NodeKind::Element,
        StepTest::Tag(tag) => data.kind == NodeKind::Element && &data.tag == tag,
    }
}

/// Split a Clark-notation name into `(uri, local)`.
pub fn split_clark(tag: &str) -> Option<(&str, &str)> {
    let rest = tag.strip_prefix('{')?;
    let end = rest.find('}')?;
    Some((&rest[..end], &rest[end + 1..]))
}

/// Find a usable prefix for a URI: a registered non-empty prefix, or `xml`
/// for the reserved namespace. A URI bound only to the default namespace
/// has no usable prefix and renders as a wildcard step.
fn prefix_for<'a>(doc: &'a Document, uri: &str) -> Option<&'a str> {
    if uri == XML_NS {
        return Some("xml");
    }
    doc.prefixes
        .iter()
        .find(|(prefix, u)| !prefix.is_empty() && u.as_str() == uri)
        .map(|(prefix, _)| prefix.as_str())
}

/// Resolve an xpath produced by [`xpath_of`] to exactly one node.
///
/// `nsmap` supplies prefix bindings for prefixed steps (the resolver also
/// consults the document's own registry). When `skip_marked` is given,
/// nodes carrying that attribute are invisible to both matching and
/// counting, which is how the annotated-XML formatter keeps deleted nodes
/// in the tree without disturbing later positional lookups.
pub fn resolve(
    doc: &Document,
    xpath: &str,
    nsmap: &BTreeMap<String, String>,
    skip_marked: Option<&str>,
) -> Result<NodeId, XPathError> {
    let path = xpath.strip_prefix('/').ok_or_else(|| XPathError::Malformed(xpath.to_string()))?;

    let mut current: Option<NodeId> = None;
    for raw_step in path.split('/') {
        let (test, index) = parse_step(doc, raw_step, nsmap)?;
        let candidates: Vec<NodeId> = match current {
            None => [doc.root()]
                .into_iter()
                .filter(|n| matches_test(doc, *n, &test) && !hidden(doc, *n, skip_marked))
                .collect(),
            Some(node) => doc
                .children(node)
                .iter()
                .copied()
                .filter(|n| matches_test(doc, *n, &test) && !hidden(doc, *n, skip_marked))
                .collect(),
        };
        let context = match current {
            Some(node) => xpath_of(doc, node),
            None => "/".to_string(),
        };
        let chosen = match index {
            Some(position) => candidates.get(position - 1).copied().ok_or_else(|| {
                XPathError::NotFound {
                    xpath: raw_step.to_string(),
                    context,
                }
            })?,
            None => {
                if candidates.len() > 1 {
                    return Err(XPathError::Ambiguous {
                        xpath: raw_step.to_string(),
                        context,
                    });
                }
                candidates.first().copied().ok_or_else(|| XPathError::NotFound {
                    xpath: raw_step.to_string(),
                    context,
                })?
            }
        };
        current = Some(chosen);
    }
    current.ok_or_else(|| XPathError::Malformed(xpath.to_string()))
}

fn hidden(doc: &Document, node: NodeId, skip_marked: Option<&str>) -> bool {
    match skip_marked {
        Some(attr) => doc.node(node).attrs.contains_key(attr),
        None => false,
    }
}

fn parse_step(
    doc: &Document,
    raw: &str,
    nsmap: &BTreeMap<String, String>,
) -> Result<(StepTest, Option<usize>), XPathError> {
    if raw.is_empty() {
        return Err(XPathError::Malformed(raw.to_string()));
    }
    let (name, index) = match raw.strip_suffix(']') {
        Some(rest) => {
            let open = rest
                .rfind('[')
                .ok_or_else(|| XPathError::Malformed(raw.to_string()))?;
            let index: usize = rest[open + 1..]
                .parse()
                .map_err(|_| XPathError::Malformed(raw.to_string()))?;
            if index == 0 {
                return Err(XPathError::Malformed(raw.to_string()));
            }
            (&rest[..open], Some(index))
        }
        None => (raw, None),
    };

    let test = if name == "comment()" {
        StepTest::Comment
    } else if name == "*" {
        StepTest::Wildcard
    } else if let Some((prefix, local)) = name.split_once(':') {
        let uri = nsmap
            .get(prefix)
            .map(String::as_str)
            .or_else(|| doc.prefixes.get(prefix).map(String::as_str))
            .or_else(|| (prefix == "xml").then_some(XML_NS))
            .ok_or_else(|| XPathError::UnknownPrefix(prefix.to_string()))?;
        StepTest::Tag(format!("{{{uri}}}{local}"))
    } else {
        StepTest::Tag(name.to_string())
    };
    Ok((test, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Document;

    fn sample() -> Document {
        // <document><story><section/><section/></story><note/></document>
        let mut doc = Document::new("document");
        let story = doc.create_element("story");
        let s1 = doc.create_element("section");
        let s2 = doc.create_element("section");
        let note = doc.create_element("note");
        let root = doc.root();
        doc.append(root, story);
        doc.append(story, s1);
        doc.append(story, s2);
        doc.append(root, note);
        doc
    }

    #[test]
    fn paths_index_only_ambiguous_steps_and_the_last() {
        let doc = sample();
        let root = doc.root();
        let story = doc.children(root)[0];
        let s2 = doc.children(story)[1];
        let note = doc.children(root)[1];

        assert_eq!(xpath_of(&doc, root), "/document[1]");
        assert_eq!(xpath_of(&doc, story), "/document/story[1]");
        assert_eq!(xpath_of(&doc, s2), "/document/story/section[2]");
        assert_eq!(xpath_of(&doc, note), "/document/note[1]");
    }

    #[test]
    fn resolve_round_trips_generated_paths() {
        let doc = sample();
        let empty = BTreeMap::new();
        for id in crate::tree::post_order(&doc, doc.root()) {
            let path = xpath_of(&doc, id);
            assert_eq!(resolve(&doc, &path, &empty, None).unwrap(), id);
        }
    }

    #[test]
    fn unindexed_step_must_be_unique() {
        let doc = sample();
        let empty = BTreeMap::new();
        let err = resolve(&doc, "/document/story/section", &empty, None).unwrap_err();
        assert!(matches!(err, XPathError::Ambiguous { .. }));
        assert!(resolve(&doc, "/document/story", &empty, None).is_ok());
    }

    #[test]
    fn comment_steps_count_comments_only() {
        let mut doc = Document::new("doc");
        let c = doc.create_comment(" hi ");
        let body = doc.create_element("body");
        let root = doc.root();
        doc.append(root, c);
        doc.append(root, body);

        assert_eq!(xpath_of(&doc, c), "/doc/comment()[1]");
        assert_eq!(xpath_of(&doc, body), "/doc/body[1]");
        let empty = BTreeMap::new();
        assert_eq!(resolve(&doc, "/doc/comment()[1]", &empty, None).unwrap(), c);
    }

    #[test]
    fn skip_marked_nodes_are_invisible_to_positions() {
        let mut doc = sample();
        let root = doc.root();
        let story = doc.children(root)[0];
        let s1 = doc.children(story)[0];
        let s2 = doc.children(story)[1];
        doc.node_mut(s1)
            .attrs
            .insert("{urn:diff}delete".to_string(), String::new());

        let empty = BTreeMap::new();
        let found = resolve(
            &doc,
            "/document/story/section[1]",
            &empty,
            Some("{urn:diff}delete"),
        )
        .unwrap();
        assert_eq!(found, s2);
    }

    #[test]
    fn namespaced_paths_use_registered_prefixes() {
        let mut doc = Document::new("{urn:x}root");
        doc.prefixes.insert("x".to_string(), "urn:x".to_string());
        let child = doc.create_element("{urn:x}item");
        let root = doc.root();
        doc.append(root, child);

        assert_eq!(xpath_of(&doc, child), "/x:root/x:item[1]");
        let empty = BTreeMap::new();
        assert_eq!(resolve(&doc, "/x:root/x:item[1]", &empty, None).unwrap(), child);
    }

    #[test]
    fn default_namespace_renders_as_wildcard() {
        let mut doc = Document::new("{urn:d}root");
        doc.prefixes.insert(String::new(), "urn:d".to_string());
        let a = doc.create_element("{urn:d}a");
        let b = doc.create_element("{urn:d}b");
        let root = doc.root();
        doc.append(root, a);
        doc.append(root, b);

        assert_eq!(xpath_of(&doc, b), "/*/*[2]");
        let empty = BTreeMap::new();
        assert_eq!(resolve(&doc, "/*/*[2]", &empty, None).unwrap(), b);
    }
}
