use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;

use crate::tree::{Document, NodeId, NodeKind, XML_NS};
use crate::xpath::split_clark;

/// Errors that can occur while writing a [`Document`] as XML.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Failed to serialize XML bytes.
    #[error("failed to write XML: {0}")]
    Xml(#[from] quick_xml::Error),
    /// Serialized bytes were not valid UTF-8.
    #[error("serialized XML was not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    /// Failed to write the output file.
    #[error("failed to write XML file: {0}")]
    Io(#[from] std::io::Error),
}

/// Serialize a [`Document`] compactly.
pub fn write(doc: &Document) -> Result<String, WriteError> {
    write_with(doc, &BTreeMap::new(), false)
}

/// Serialize a [`Document`] with two-space indentation.
pub fn write_pretty(doc: &Document) -> Result<String, WriteError> {
    write_with(doc, &BTreeMap::new(), true)
}

/// Serialize a [`Document`] and write it to `path`.
pub fn write_file(doc: &Document, path: &Path) -> Result<(), WriteError> {
    let xml = write(doc)?;
    fs::write(path, xml)?;
    Ok(())
}

/// Serialize with extra prefix -> uri bindings (a formatter's reserved
/// namespace, for instance) layered over the document's own.
///
/// All namespace declarations are emitted on the root element: the
/// document's root map, the extra bindings, and generated `ns0`, `ns1`, …
/// prefixes for any URI in use that has no binding.
pub fn write_with(
    doc: &Document,
    extra: &BTreeMap<String, String>,
    pretty: bool,
) -> Result<String, WriteError> {
    let names = Namespaces::for_document(doc, extra);
    let mut writer = if pretty {
        Writer::new_with_indent(Vec::new(), b' ', 2)
    } else {
        Writer::new(Vec::new())
    };
    write_node(&mut writer, doc, doc.root(), &names, true)?;
    let mut out = String::from_utf8(writer.into_inner())?;

    // Tails of the root are not representable; everything else is emitted
    // by write_node. Trailing newline for the pretty form.
    if pretty && !out.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

struct Namespaces {
    /// uri -> preferred prefix; the empty prefix is the default namespace.
    by_uri: BTreeMap<String, String>,
    /// uri -> non-empty prefix, for attributes (which never take the
    /// default namespace).
    prefixed_by_uri: BTreeMap<String, String>,
    /// Declarations to emit on the root, prefix -> uri.
    declarations: BTreeMap<String, String>,
}

impl Namespaces {
    fn for_document(doc: &Document, extra: &BTreeMap<String, String>) -> Self {
        let mut names = Self {
            by_uri: BTreeMap::new(),
            prefixed_by_uri: BTreeMap::new(),
            declarations: BTreeMap::new(),
        };

        for source in [&doc.nsmap, extra, &doc.prefixes] {
            for (prefix, uri) in source {
                names.bind(prefix, uri);
            }
        }

        // Generate prefixes for any used URI still without a binding, and
        // non-empty prefixes for attribute URIs bound only as the default.
        let mut element_uris = BTreeSet::new();
        let mut attr_uris = BTreeSet::new();
        collect_uris(doc, doc.root(), &mut element_uris, &mut attr_uris);
        let mut counter = 0;
        for uri in element_uris.iter().chain(&attr_uris) {
            if uri == XML_NS || names.by_uri.contains_key(uri) {
                continue;
            }
            let prefix = generate_prefix(&names.declarations, &mut counter);
            names.bind(&prefix, uri);
        }
        for uri in &attr_uris {
            if uri != XML_NS && !names.prefixed_by_uri.contains_key(uri) {
                let prefix = generate_prefix(&names.declarations, &mut counter);
                names.bind(&prefix, uri);
            }
        }
        names
    }

    fn bind(&mut self, prefix: &str, uri: &str) {
        if uri == XML_NS {
            return;
        }
        if self.declarations.contains_key(prefix)
            && self.declarations.get(prefix).map(String::as_str) != Some(uri)
        {
            // Prefix already taken by another URI; skip the clash.
            return;
        }
        self.declarations.insert(prefix.to_string(), uri.to_string());
        self.by_uri
            .entry(uri.to_string())
            .or_insert_with(|| prefix.to_string());
        if !prefix.is_empty() {
            self.prefixed_by_uri
                .entry(uri.to_string())
                .or_insert_with(|| prefix.to_string());
        }
    }

    /// Render a Clark-notation name.
    fn qualify(&self, clark: &str, is_element: bool) -> String {
        let Some((uri, local)) = split_clark(clark) else {
            return clark.to_string();
        };
        if uri == XML_NS {
            return format!("xml:{local}");
        }
        let prefix = if is_element {
            self.by_uri.get(uri)
        } else {
            self.prefixed_by_uri.get(uri)
        };
        match prefix.map(String::as_str) {
            Some("") | None => local.to_string(),
            Some(prefix) => format!("{prefix}:{local}"),
        }
    }
}

fn generate_prefix(declarations: &BTreeMap<String, String>, counter: &mut usize) -> String {
    loop {
        let candidate = format!("ns{counter}");
        *counter += 1;
        if !declarations.contains_key(&candidate) {
            return candidate;
        }
    }
}

fn collect_uris(
    doc: &Document,
    node: NodeId,
    element_uris: &mut BTreeSet<String>,
    attr_uris: &mut BTreeSet<String>,
) {
    let data = doc.node(node);
    if let Some((uri, _)) = split_clark(&data.tag) {
        element_uris.insert(uri.to_string());
    }
    for name in data.attrs.keys() {
        if let Some((uri, _)) = split_clark(name) {
            attr_uris.insert(uri.to_string());
        }
    }
    for child in doc.children(node) {
        collect_uris(doc, *child, element_uris, attr_uris);
    }
}

fn write_node(
    writer: &mut Writer<Vec<u8>>,
    doc: &Document,
    node: NodeId,
    names: &Namespaces,
    is_root: bool,
) -> Result<(), quick_xml::Error> {
    let data = doc.node(node);

    if data.kind == NodeKind::Comment {
        // Comment content goes out verbatim; text escaping rules do not
        // apply inside comments.
        writer.write_event(Event::Comment(BytesText::from_escaped(
            data.text.as_deref().unwrap_or(""),
        )))?;
        if let Some(tail) = &data.tail {
            writer.write_event(Event::Text(BytesText::new(tail)))?;
        }
        return Ok(());
    }

    let name = names.qualify(&data.tag, true);
    let mut start = BytesStart::new(name.as_str());

    if is_root {
        for (prefix, uri) in &names.declarations {
            if prefix.is_empty() {
                start.push_attribute(("xmlns", uri.as_str()));
            } else {
                start.push_attribute((format!("xmlns:{prefix}").as_str(), uri.as_str()));
            }
        }
    }
    for (key, value) in &data.attrs {
        start.push_attribute((names.qualify(key, false).as_str(), value.as_str()));
    }

    if doc.children(node).is_empty() && data.text.is_none() {
        writer.write_event(Event::Empty(start))?;
    } else {
        writer.write_event(Event::Start(start))?;
        if let Some(text) = &data.text {
            writer.write_event(Event::Text(BytesText::new(text)))?;
        }
        for child in doc.children(node) {
            write_node(writer, doc, *child, names, false)?;
        }
        writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
    }

    if !is_root {
        if let Some(tail) = &data.tail {
            writer.write_event(Event::Text(BytesText::new(tail)))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn compact_output_round_trips_text_and_tails() {
        let xml = b"<root><node attr=\"v\">text</node>tail<other/></root>";
        let doc = parse(xml).unwrap();
        let out = write(&doc).unwrap();
        assert_eq!(out, String::from_utf8_lossy(xml));
    }

    #[test]
    fn namespaced_names_render_with_prefixes() {
        let xml = b"<root xmlns:a=\"urn:a\"><a:item a:k=\"1\"/></root>";
        let doc = parse(xml).unwrap();
        let out = write(&doc).unwrap();
        assert_eq!(out, String::from_utf8_lossy(xml));
    }

    #[test]
    fn extra_bindings_are_declared_on_the_root() {
        let doc = parse(b"<root><x/></root>").unwrap();
        let mut extra = BTreeMap::new();
        extra.insert("diff".to_string(), "urn:diff".to_string());
        let out = write_with(&doc, &extra, false).unwrap();
        assert!(out.starts_with("<root xmlns:diff=\"urn:diff\">"));
    }

    #[test]
    fn unbound_uris_get_generated_prefixes() {
        let mut doc = parse(b"<root/>").unwrap();
        let child = doc.create_element("{urn:new}child");
        let root = doc.root();
        doc.append(root, child);
        let out = write(&doc).unwrap();
        assert_eq!(out, "<root xmlns:ns0=\"urn:new\"><ns0:child/></root>");
    }

    #[test]
    fn comments_and_default_namespace_survive() {
        let xml = b"<root xmlns=\"urn:d\"><!-- note --><item/></root>";
        let doc = parse(xml).unwrap();
        let out = write(&doc).unwrap();
        assert_eq!(out, String::from_utf8_lossy(xml));
    }
}
