use std::fs;
use std::process;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use encoding_rs::Encoding;
use xmldelta_core::{
    diff_documents, parse_diff, parse_with_options, patch, write, DiffFormatter, DiffOptions,
    Formatter, LegacyFormatter, Normalize, ParseOptions, UniqueAttr, XmlFormatter,
};

mod cli;

use cli::{Cli, Command, DiffArgs, FormatterKind, PatchArgs};

fn main() {
    let cli = Cli::parse();

    let outcome = match cli.command {
        Command::Diff(args) => run_diff(args),
        Command::Patch(args) => run_patch(args),
    };
    match outcome {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            process::exit(1);
        }
    }
}

fn run_diff(args: DiffArgs) -> Result<i32> {
    let unique_attrs = match UniqueAttr::parse_list(&args.unique_attributes) {
        Ok(unique_attrs) => unique_attrs,
        Err(err) => {
            // Configuration problems share the exit code of argument errors.
            eprintln!("error: {err}");
            return Ok(2);
        }
    };

    let normalize = if args.keep_whitespace {
        Normalize::None
    } else {
        Normalize::Both
    };
    let mut formatter: Box<dyn Formatter> = match args.formatter {
        FormatterKind::Diff => Box::new(DiffFormatter::new(normalize)),
        FormatterKind::Xml => Box::new(XmlFormatter::new(normalize, args.pretty_print)),
        FormatterKind::Old => Box::new(LegacyFormatter::new(normalize)),
    };

    let options = DiffOptions {
        f: args.threshold.unwrap_or(0.5),
        unique_attrs,
        ratio_mode: args.ratio_mode.into(),
        fast_match: args.fast_match,
        best_match: args.best_match,
        ignored_attrs: args
            .ignored_attributes
            .as_deref()
            .unwrap_or("")
            .split(',')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    };

    let parse_options = ParseOptions {
        remove_blank_text: formatter.normalize().tags(),
    };
    let read = |path: &std::path::Path| -> Result<xmldelta_core::Document> {
        let bytes =
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        parse_with_options(&bytes, parse_options)
            .with_context(|| format!("failed to parse {}", path.display()))
    };
    let mut left = read(&args.file1)?;
    let mut right = read(&args.file2)?;

    formatter.prepare(&mut left, &mut right);
    let actions = diff_documents(&left, &right, options)?;

    if args.check {
        return Ok(if actions.is_empty() { 0 } else { 1 });
    }

    println!("{}", formatter.format(&actions, &left)?);
    Ok(0)
}

fn run_patch(args: PatchArgs) -> Result<i32> {
    let bytes = fs::read(&args.patchfile)
        .with_context(|| format!("failed to read {}", args.patchfile.display()))?;
    let script = decode(&bytes, args.diff_encoding.as_deref())?;
    let actions = parse_diff(&script)
        .with_context(|| format!("failed to parse {}", args.patchfile.display()))?;

    let xml = fs::read(&args.xmlfile)
        .with_context(|| format!("failed to read {}", args.xmlfile.display()))?;
    let tree = xmldelta_core::parse(&xml)
        .with_context(|| format!("failed to parse {}", args.xmlfile.display()))?;

    let patched = patch(&actions, &tree)?;
    println!("{}", write(&patched)?);
    Ok(0)
}

fn decode(bytes: &[u8], label: Option<&str>) -> Result<String> {
    let Some(label) = label else {
        return Ok(String::from_utf8(bytes.to_vec()).context("patch file is not valid UTF-8")?);
    };
    let encoding = Encoding::for_label(label.as_bytes())
        .ok_or_else(|| anyhow!("unknown diff encoding '{label}'"))?;
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        bail!("patch file is not valid {label}");
    }
    Ok(text.into_owned())
}
