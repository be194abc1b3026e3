//! Structural XML diffing and patching.
//!
//! The differ matches the nodes of two trees, then emits an *edit script*:
//! the ordered sequence of insert/delete/rename/move/update actions that
//! turns the left tree into the right one. The patcher replays a script,
//! the formatters render one (annotated XML, compact text, or the legacy
//! text shape), and the script parser reads the compact form back in.

pub mod actions;
pub mod api;
pub mod diff;
pub mod format;
pub mod parser;
pub mod patch;
pub mod placeholder;
pub mod ratio;
pub mod script;
pub mod textdiff;
pub mod tree;
pub mod utils;
pub mod writer;
pub mod xpath;

pub use actions::EditAction;
pub use api::{
    diff_and_format, diff_documents, diff_files_with, diff_texts, diff_texts_with, patch_document,
    patch_file, patch_text, Error,
};
pub use diff::{DiffError, DiffOptions, Differ, Match, UniqueAttr};
pub use format::{
    DiffFormatter, FormatError, Formatter, LegacyFormatter, Normalize, XmlFormatter, DIFF_NS,
    DIFF_PREFIX,
};
pub use parser::{parse, parse_file, parse_with_options, ParseError, ParseOptions};
pub use patch::{patch, PatchError};
pub use placeholder::PlaceholderMaker;
pub use ratio::RatioMode;
pub use script::{parse_diff, ScriptError};
pub use tree::{Document, NodeId};
pub use writer::{write, write_file, write_pretty, WriteError};
