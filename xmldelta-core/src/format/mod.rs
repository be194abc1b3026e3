//! Renderings of an edit script: annotated XML, compact text, legacy text.

mod diff;
mod legacy;
mod xml;

use thiserror::Error;

use crate::actions::EditAction;
use crate::tree::Document;
use crate::writer::WriteError;
use crate::xpath::XPathError;

pub use diff::DiffFormatter;
pub use legacy::LegacyFormatter;
pub use xml::XmlFormatter;

/// The reserved namespace the annotated-XML rendering stamps its markers
/// in. Any URI works as long as producer and consumer agree.
pub const DIFF_NS: &str = "https://xmldelta.dev/ns/diff";
pub const DIFF_PREFIX: &str = "diff";

/// The Clark-notation name of a `diff:*` marker attribute or element.
pub(crate) fn diff_name(name: &str) -> String {
    format!("{{{DIFF_NS}}}{name}")
}

/// Whitespace normalization policy.
///
/// The `Tags` half (dropping purely inter-tag whitespace) is applied at
/// parse time by whoever parses the inputs; the `Text` half (collapsing
/// whitespace inside text tags) is applied by the annotated-XML formatter
/// when it diffs text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Normalize {
    /// Preserve all whitespace.
    None,
    /// Drop ignorable whitespace between tags.
    #[default]
    Tags,
    /// Collapse whitespace inside text tags.
    Text,
    /// Both of the above.
    Both,
}

impl Normalize {
    pub fn tags(self) -> bool {
        matches!(self, Normalize::Tags | Normalize::Both)
    }

    pub fn text(self) -> bool {
        matches!(self, Normalize::Text | Normalize::Both)
    }
}

/// Errors raised while rendering an edit script.
#[derive(Debug, Error)]
pub enum FormatError {
    /// An xpath did not resolve to exactly one node of the tree being
    /// annotated.
    #[error("cannot format {action}: {source}")]
    Resolve {
        action: String,
        #[source]
        source: XPathError,
    },
    /// An action refers to an attribute the annotated tree does not have.
    #[error("cannot format {action}: attribute '{name}' is absent")]
    MissingAttribute { action: String, name: String },
    /// The rendering has no representation for this action.
    #[error("cannot format {action}: unsupported by this formatter")]
    Unsupported { action: String },
    /// Serializing the annotated tree failed.
    #[error(transparent)]
    Write(#[from] WriteError),
}

impl FormatError {
    pub(crate) fn resolve(action: &EditAction, source: XPathError) -> Self {
        FormatError::Resolve {
            action: format!("{action:?}"),
            source,
        }
    }
}

/// Common contract of the three renderings.
pub trait Formatter {
    /// The whitespace policy the caller should honor when parsing the
    /// inputs this formatter will see.
    fn normalize(&self) -> Normalize;

    /// Hook run on both trees before diffing. The annotated-XML formatter
    /// strips comments and installs placeholders here; the text renderings
    /// leave the trees alone.
    fn prepare(&mut self, left: &mut Document, right: &mut Document) {
        let _ = (left, right);
    }

    /// Render the action stream. `left` is the left tree as it was after
    /// [`Formatter::prepare`], untouched by the differ.
    fn format(&mut self, actions: &[EditAction], left: &Document) -> Result<String, FormatError>;
}
