use std::path::PathBuf;

use pretty_assertions::assert_eq;
use xmldelta_core::{
    diff_documents, parse_diff, parse_file, patch, DiffFormatter, DiffOptions, EditAction,
    Formatter, Normalize,
};

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

/// One action of every kind, with text values that stress the quoting.
fn one_of_each() -> Vec<EditAction> {
    vec![
        EditAction::DeleteNode {
            node: "/r/a[1]".to_string(),
        },
        EditAction::InsertNode {
            target: "/r[1]".to_string(),
            tag: "{urn:x}tag".to_string(),
            position: 3,
        },
        EditAction::RenameNode {
            node: "/r/a[1]".to_string(),
            tag: "b".to_string(),
        },
        EditAction::MoveNode {
            node: "/r/a[1]".to_string(),
            target: "/r/b[2]".to_string(),
            position: 0,
        },
        EditAction::UpdateTextIn {
            node: "/r/a[1]".to_string(),
            text: Some("commas, \"quotes\" and ünïcode…".to_string()),
            old_text: None,
        },
        EditAction::UpdateTextAfter {
            node: "/r/a[1]".to_string(),
            text: None,
            old_text: Some("was here".to_string()),
        },
        EditAction::UpdateAttrib {
            node: "/r/a[1]".to_string(),
            name: "k".to_string(),
            value: "v, with a comma".to_string(),
        },
        EditAction::DeleteAttrib {
            node: "/r/a[1]".to_string(),
            name: "k".to_string(),
        },
        EditAction::InsertAttrib {
            node: "/r/a[1]".to_string(),
            name: "k".to_string(),
            value: String::new(),
        },
        EditAction::RenameAttrib {
            node: "/r/a[1]".to_string(),
            old_name: "k".to_string(),
            new_name: "k2".to_string(),
        },
        EditAction::InsertComment {
            target: "/r[1]".to_string(),
            position: 1,
            text: " note ".to_string(),
        },
        EditAction::InsertNamespace {
            prefix: "s".to_string(),
            uri: "urn:s".to_string(),
        },
        EditAction::DeleteNamespace {
            prefix: "s".to_string(),
        },
    ]
}

#[test]
fn every_action_survives_the_textual_round_trip() {
    let actions = one_of_each();
    let doc = xmldelta_core::parse(b"<r/>").expect("parse");
    let text = DiffFormatter::new(Normalize::Tags)
        .format(&actions, &doc)
        .expect("format");
    assert_eq!(parse_diff(&text).expect("parse back"), actions);
}

#[test]
fn scenario_a_rendering_parses_back_exactly() {
    let left = parse_file(&fixture("fixtures/scn_a_left.xml")).expect("left parse");
    let right = parse_file(&fixture("fixtures/scn_a_right.xml")).expect("right parse");
    let actions = diff_documents(&left, &right, DiffOptions::default()).expect("diff");

    let text = DiffFormatter::new(Normalize::Both)
        .format(&actions, &left)
        .expect("format");
    assert!(text.contains("[update-text-after, /root/node[1], \"Also a tail!\", \"And a tail!\"]"));

    let reparsed = parse_diff(&text).expect("parse back");
    assert_eq!(reparsed, actions);
}

#[test]
fn reparsed_scripts_patch_identically() {
    let left = parse_file(&fixture("fixtures/scn_b_left.xml")).expect("left parse");
    let right = parse_file(&fixture("fixtures/scn_b_right.xml")).expect("right parse");
    let actions = diff_documents(&left, &right, DiffOptions::default()).expect("diff");

    let text = DiffFormatter::new(Normalize::Both)
        .format(&actions, &left)
        .expect("format");
    let reparsed = parse_diff(&text).expect("parse back");

    let direct = patch(&actions, &left).expect("patch direct");
    let via_text = patch(&reparsed, &left).expect("patch reparsed");
    assert!(direct.tree_eq(&via_text));
    assert!(via_text.tree_eq(&right));
}
