use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::actions::EditAction;
use crate::diff::{DiffError, DiffOptions, Differ};
use crate::format::{FormatError, Formatter};
use crate::parser::{parse_with_options, ParseError, ParseOptions};
use crate::patch::{patch, PatchError};
use crate::script::{parse_diff, ScriptError};
use crate::tree::Document;
use crate::writer::{write, WriteError};

/// Any failure of the high-level entry points.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error(transparent)]
    Diff(#[from] DiffError),
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Diff two parsed documents into an edit script.
pub fn diff_documents(
    left: &Document,
    right: &Document,
    options: DiffOptions,
) -> Result<Vec<EditAction>, DiffError> {
    let mut differ = Differ::new(options)?;
    differ.set_trees(left, right);
    differ.diff()
}

/// Diff two documents and render the script with `formatter`.
///
/// The formatter gets to preprocess both trees before the differ runs and
/// then renders against the preprocessed left tree, so the trees are taken
/// by value.
pub fn diff_and_format(
    mut left: Document,
    mut right: Document,
    options: DiffOptions,
    formatter: &mut dyn Formatter,
) -> Result<String, Error> {
    formatter.prepare(&mut left, &mut right);
    let actions = diff_documents(&left, &right, options)?;
    Ok(formatter.format(&actions, &left)?)
}

/// Diff two XML strings into an edit script.
pub fn diff_texts(
    left: &str,
    right: &str,
    options: DiffOptions,
) -> Result<Vec<EditAction>, Error> {
    let parse_options = ParseOptions {
        remove_blank_text: true,
    };
    let left = parse_with_options(left.as_bytes(), parse_options)?;
    let right = parse_with_options(right.as_bytes(), parse_options)?;
    Ok(diff_documents(&left, &right, options)?)
}

/// Diff two XML strings and render the script with `formatter`, parsing
/// with the whitespace policy the formatter asks for.
pub fn diff_texts_with(
    left: &str,
    right: &str,
    options: DiffOptions,
    formatter: &mut dyn Formatter,
) -> Result<String, Error> {
    let parse_options = ParseOptions {
        remove_blank_text: formatter.normalize().tags(),
    };
    let left = parse_with_options(left.as_bytes(), parse_options)?;
    let right = parse_with_options(right.as_bytes(), parse_options)?;
    diff_and_format(left, right, options, formatter)
}

/// Diff two XML files and render the script with `formatter`.
pub fn diff_files_with(
    left: &Path,
    right: &Path,
    options: DiffOptions,
    formatter: &mut dyn Formatter,
) -> Result<String, Error> {
    let left = read(left)?;
    let right = read(right)?;
    diff_texts_with(&left, &right, options, formatter)
}

/// Apply a parsed edit script to a document.
pub fn patch_document(actions: &[EditAction], tree: &Document) -> Result<Document, PatchError> {
    patch(actions, tree)
}

/// Apply a textual edit script to an XML string, returning the patched
/// serialization.
pub fn patch_text(script: &str, xml: &str) -> Result<String, Error> {
    let actions = parse_diff(script)?;
    let tree = crate::parser::parse(xml.as_bytes())?;
    let patched = patch(&actions, &tree)?;
    Ok(write(&patched)?)
}

/// Apply an edit-script file to an XML file, returning the patched
/// serialization.
pub fn patch_file(script_path: &Path, xml_path: &Path) -> Result<String, Error> {
    let script = read(script_path)?;
    let xml = read(xml_path)?;
    patch_text(&script, &xml)
}

fn read(path: &Path) -> Result<String, Error> {
    fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })
}
