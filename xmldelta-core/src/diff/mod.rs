//! Tree-to-tree matching and edit-script generation.

mod engine;

pub use engine::{DiffError, DiffOptions, Differ, Match, UniqueAttr};
