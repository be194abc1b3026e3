use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;
use thiserror::Error;

use crate::tree::{Document, NodeId, XML_NS};

/// Errors that can occur while parsing XML into a [`Document`].
#[derive(Debug, Error)]
pub enum ParseError {
    /// Input XML could not be decoded or tokenized.
    #[error("failed to parse XML: {0}")]
    Xml(#[from] quick_xml::Error),
    /// Input bytes were not valid UTF-8 for tag/attribute/text extraction.
    #[error("invalid UTF-8 while parsing XML: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    /// Failed to decode a text entity.
    #[error("failed to decode XML text: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),
    /// Failed to read the input file.
    #[error("failed to read XML file: {0}")]
    Io(#[from] std::io::Error),
    /// Structural issue in the XML document.
    #[error("malformed XML: {0}")]
    Malformed(String),
}

/// Parse-time options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Drop text chunks that consist purely of whitespace. This is the
    /// inter-tag half of whitespace normalization; the in-text half is a
    /// formatter concern.
    pub remove_blank_text: bool,
}

/// Parse XML bytes into a [`Document`] with default options.
pub fn parse(xml: &[u8]) -> Result<Document, ParseError> {
    parse_with_options(xml, ParseOptions::default())
}

/// Parse an XML file into a [`Document`] with default options.
pub fn parse_file(path: &Path) -> Result<Document, ParseError> {
    let bytes = fs::read(path)?;
    parse(&bytes)
}

/// Parse XML bytes into a [`Document`].
///
/// Element and attribute names are resolved to Clark notation
/// (`{uri}local`) using the declarations in scope; `xmlns` attributes
/// become namespace-map entries rather than regular attributes. Comments
/// below the root are kept as nodes; document-level comments are dropped.
pub fn parse_with_options(xml: &[u8], options: ParseOptions) -> Result<Document, ParseError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut builder = TreeBuilder::new(options);

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => builder.open(&e, &reader, false)?,
            Event::Empty(e) => builder.open(&e, &reader, true)?,
            Event::End(_) => builder.close()?,
            Event::Text(e) => {
                let text = e.unescape()?.into_owned();
                builder.text(text);
            }
            Event::CData(e) => {
                let text = std::str::from_utf8(e.as_ref())?.to_string();
                builder.text(text);
            }
            Event::Comment(e) => {
                let text = e.unescape()?.into_owned();
                builder.comment(text);
            }
            Event::Eof => break,
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
        buf.clear();
    }

    builder.finish()
}

struct TreeBuilder {
    options: ParseOptions,
    doc: Option<Document>,
    /// Open elements, innermost last.
    stack: Vec<NodeId>,
    /// One namespace scope per open element, innermost last; each scope is
    /// the full prefix -> uri map in effect there.
    scopes: Vec<BTreeMap<String, String>>,
    finished_root: bool,
}

impl TreeBuilder {
    fn new(options: ParseOptions) -> Self {
        Self {
            options,
            doc: None,
            stack: Vec::new(),
            scopes: Vec::new(),
            finished_root: false,
        }
    }

    fn open(
        &mut self,
        e: &BytesStart<'_>,
        reader: &Reader<&[u8]>,
        empty: bool,
    ) -> Result<(), ParseError> {
        let mut scope = self.scopes.last().cloned().unwrap_or_default();
        let mut declared = Vec::new();
        let mut attrs = Vec::new();

        for attr in e.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = qname_str(attr.key)?;
            let value = attr.decode_and_unescape_value(reader.decoder())?.into_owned();
            if key == "xmlns" {
                declared.push((String::new(), value.clone()));
                scope.insert(String::new(), value);
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                declared.push((prefix.to_string(), value.clone()));
                scope.insert(prefix.to_string(), value);
            } else {
                attrs.push((key.to_string(), value));
            }
        }

        let tag = resolve_name(qname_str(e.name())?, &scope, true)?;

        let parent = self.stack.last().copied();
        let node = if self.doc.is_none() {
            if self.finished_root {
                return Err(ParseError::Malformed(
                    "multiple top-level elements found".to_string(),
                ));
            }
            let mut doc = Document::new(tag);
            for (prefix, uri) in &declared {
                doc.nsmap.insert(prefix.clone(), uri.clone());
            }
            let root = doc.root();
            self.doc = Some(doc);
            root
        } else if let Some(parent) = parent {
            let doc = self.doc.as_mut().expect("document exists");
            let node = doc.create_element(tag);
            doc.append(parent, node);
            node
        } else {
            return Err(ParseError::Malformed(
                "multiple top-level elements found".to_string(),
            ));
        };

        let doc = self.doc.as_mut().expect("document exists after open");
        for (prefix, uri) in declared {
            doc.prefixes.entry(prefix).or_insert(uri);
        }
        for (key, value) in attrs {
            let name = resolve_name(key.as_str(), &scope, false)?;
            doc.node_mut(node).attrs.insert(name, value);
        }

        if empty {
            if self.stack.is_empty() {
                self.finished_root = true;
            }
        } else {
            self.stack.push(node);
            self.scopes.push(scope);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), ParseError> {
        if self.stack.pop().is_none() {
            return Err(ParseError::Malformed(
                "encountered closing tag without open tag".to_string(),
            ));
        }
        self.scopes.pop();
        if self.stack.is_empty() {
            self.finished_root = true;
        }
        Ok(())
    }

    fn text(&mut self, chunk: String) {
        if self.options.remove_blank_text && chunk.trim().is_empty() {
            return;
        }
        let Some(current) = self.stack.last().copied() else {
            return;
        };
        let doc = self.doc.as_mut().expect("open element implies document");
        // Text after a child is that child's tail; text before any child
        // belongs to the element itself.
        let slot = match doc.children(current).last().copied() {
            Some(last) => &mut doc.node_mut(last).tail,
            None => &mut doc.node_mut(current).text,
        };
        match slot {
            Some(existing) => existing.push_str(&chunk),
            None => *slot = Some(chunk),
        }
    }

    fn comment(&mut self, text: String) {
        // Document-level comments are not part of the tree model.
        let Some(current) = self.stack.last().copied() else {
            return;
        };
        let doc = self.doc.as_mut().expect("open element implies document");
        let node = doc.create_comment(text);
        doc.append(current, node);
    }

    fn finish(self) -> Result<Document, ParseError> {
        if !self.stack.is_empty() {
            return Err(ParseError::Malformed(
                "unclosed element(s) at end of document".to_string(),
            ));
        }
        self.doc
            .ok_or_else(|| ParseError::Malformed("no root element found".to_string()))
    }
}

fn qname_str(name: QName<'_>) -> Result<&str, ParseError> {
    Ok(std::str::from_utf8(name.into_inner())?)
}

/// Resolve a possibly-prefixed name to Clark notation. The default
/// namespace applies to elements only, never to attributes.
fn resolve_name(
    name: &str,
    scope: &BTreeMap<String, String>,
    is_element: bool,
) -> Result<String, ParseError> {
    match name.split_once(':') {
        Some(("xml", local)) => Ok(format!("{{{XML_NS}}}{local}")),
        Some((prefix, local)) => match scope.get(prefix) {
            Some(uri) => Ok(format!("{{{uri}}}{local}")),
            None => Err(ParseError::Malformed(format!(
                "undeclared namespace prefix '{prefix}'"
            ))),
        },
        None => match scope.get("") {
            Some(uri) if is_element => Ok(format!("{{{uri}}}{name}")),
            _ => Ok(name.to_string()),
        },
    }
}
