use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use xmldelta_core::RatioMode;

#[derive(Parser, Debug)]
#[command(name = "xmldelta")]
#[command(about = "Diff and patch XML documents with structural edit scripts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Create a diff for two XML files.
    Diff(DiffArgs),
    /// Patch an XML file with a diff.
    Patch(PatchArgs),
}

#[derive(Parser, Debug)]
pub struct DiffArgs {
    /// The first input file.
    pub file1: PathBuf,
    /// The second input file.
    pub file2: PathBuf,
    /// Output rendering.
    #[arg(short, long, value_enum, default_value_t = FormatterKind::Diff)]
    pub formatter: FormatterKind,
    /// Do not strip ignorable whitespace.
    #[arg(short = 'w', long)]
    pub keep_whitespace: bool,
    /// Try to make XML output more readable.
    #[arg(short, long)]
    pub pretty_print: bool,
    /// How similar nodes must be to match, above 0 and up to 1.
    #[arg(short = 'F', value_parser = parse_threshold)]
    pub threshold: Option<f64>,
    /// Comma-separated attributes that uniquely identify a node. Can be
    /// empty. Per-element entries use the format {NS}element@attr.
    #[arg(long, default_value = "{http://www.w3.org/XML/1998/namespace}id")]
    pub unique_attributes: String,
    /// Node comparison optimization.
    #[arg(long, value_enum, default_value_t = RatioModeArg::Fast)]
    pub ratio_mode: RatioModeArg,
    /// A faster, less optimal match run.
    #[arg(long, conflicts_with = "best_match")]
    pub fast_match: bool,
    /// A slower, more thorough match run.
    #[arg(long)]
    pub best_match: bool,
    /// Comma-separated attributes ignored when comparing nodes.
    #[arg(long)]
    pub ignored_attributes: Option<String>,
    /// Exit with code 1 if the documents differ, printing nothing.
    #[arg(long)]
    pub check: bool,
}

#[derive(Parser, Debug)]
pub struct PatchArgs {
    /// An edit-script file produced by the diff command.
    pub patchfile: PathBuf,
    /// The XML file to patch.
    pub xmlfile: PathBuf,
    /// Text encoding of the patch file.
    #[arg(long)]
    pub diff_encoding: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum FormatterKind {
    /// Compact edit-script records.
    Diff,
    /// The left document annotated with change markers.
    Xml,
    /// The edit-script shape of the old tool, for interoperability.
    Old,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum RatioModeArg {
    Fast,
    Accurate,
    Faster,
}

impl From<RatioModeArg> for RatioMode {
    fn from(value: RatioModeArg) -> Self {
        match value {
            RatioModeArg::Fast => RatioMode::Fast,
            RatioModeArg::Accurate => RatioMode::Accurate,
            RatioModeArg::Faster => RatioMode::Faster,
        }
    }
}

fn parse_threshold(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("'{raw}' is not a number"))?;
    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err("F must be above 0 and no higher than 1".to_string())
    }
}
