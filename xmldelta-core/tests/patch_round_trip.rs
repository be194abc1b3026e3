use std::path::PathBuf;

use xmldelta_core::{
    diff_documents, parse, parse_file, patch, DiffOptions, Document,
};

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

/// Diff then patch, asserting the patched left tree equals the right tree.
fn assert_round_trip(left: &Document, right: &Document) {
    let actions = diff_documents(left, right, DiffOptions::default()).expect("diff");
    let patched = patch(&actions, left).expect("patch");
    assert!(
        patched.tree_eq(right),
        "patched tree does not equal the right tree\nactions: {actions:#?}"
    );
}

fn assert_round_trip_bytes(left: &[u8], right: &[u8]) {
    let left = parse(left).expect("left parse");
    let right = parse(right).expect("right parse");
    assert_round_trip(&left, &right);
}

#[test]
fn patching_an_empty_script_is_identity() {
    let doc = parse(b"<root><a>x</a><a>y</a></root>").expect("parse");
    let patched = patch(&[], &doc).expect("patch");
    assert!(patched.tree_eq(&doc));
}

#[test]
fn attribute_and_text_changes_round_trip() {
    let left = parse_file(&fixture("fixtures/scn_a_left.xml")).expect("left parse");
    let right = parse_file(&fixture("fixtures/scn_a_right.xml")).expect("right parse");
    assert_round_trip(&left, &right);
}

#[test]
fn structural_split_round_trips() {
    let left = parse_file(&fixture("fixtures/scn_b_left.xml")).expect("left parse");
    let right = parse_file(&fixture("fixtures/scn_b_right.xml")).expect("right parse");
    assert_round_trip(&left, &right);
}

#[test]
fn reordering_round_trips() {
    assert_round_trip_bytes(
        b"<root><n><p>1</p><p>2</p><p>3</p></n><n><p>4</p></n></root>",
        b"<root><n><p>2</p><p>4</p></n><n><p>1</p><p>3</p></n></root>",
    );
}

#[test]
fn comments_and_tails_round_trip() {
    assert_round_trip_bytes(
        b"<doc><body>Something</body></doc>",
        b"<doc><!-- New comment! --><body>Something else</body>with a tail</doc>",
    );
}

#[test]
fn renames_and_deep_inserts_round_trip() {
    assert_round_trip_bytes(
        b"<doc><chapter><title>One</title></chapter></doc>",
        b"<doc><section><title>One</title><para>Intro</para><para>More</para></section></doc>",
    );
}

#[test]
fn namespace_changes_round_trip() {
    assert_round_trip_bytes(
        b"<doc xmlns:app=\"someuri\"><app:item k=\"1\"/></doc>",
        b"<doc xmlns:app=\"someuri\" xmlns:s=\"urn:space\"><app:item k=\"2\"/><s:extra/></doc>",
    );
}

#[test]
fn whole_subtree_replacement_round_trips() {
    assert_round_trip_bytes(
        b"<r><old><x>1</x><y>2</y></old></r>",
        b"<r><brand new=\"yes\"><z>3</z></brand></r>",
    );
}

#[test]
fn every_xpath_resolves_when_the_patcher_reaches_it() {
    // patch() resolves each xpath strictly (exactly one node) against the
    // evolving copy, so a successful patch of a busy script is itself the
    // xpath-validity check.
    let left = parse(
        b"<root><keep>a</keep><shuffle><i>1</i><i>2</i><i>3</i></shuffle><drop>bye</drop></root>",
    )
    .expect("left parse");
    let right = parse(
        b"<root><shuffle><i>3</i><i>1</i></shuffle><keep>a!</keep><fresh attr=\"v\">hi</fresh></root>",
    )
    .expect("right parse");
    assert_round_trip(&left, &right);
}
