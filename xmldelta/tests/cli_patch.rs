use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn xmldelta() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("xmldelta"))
}

#[test]
fn diff_then_patch_reproduces_the_right_document() {
    let dir = tempdir().expect("tempdir");
    let patch_path = dir.path().join("changes.diff");

    let diff_output = xmldelta()
        .arg("diff")
        .arg(fixture("fixtures/scn_b_left.xml"))
        .arg(fixture("fixtures/scn_b_right.xml"))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    fs::write(&patch_path, diff_output).expect("write patch file");

    let patched = xmldelta()
        .arg("patch")
        .arg(&patch_path)
        .arg(fixture("fixtures/scn_b_left.xml"))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let expected = fs::read(fixture("fixtures/scn_b_right.xml")).expect("read right");
    assert_eq!(
        String::from_utf8(patched).expect("utf-8 output").trim_end(),
        String::from_utf8(expected).expect("utf-8 fixture").trim_end()
    );
}

#[test]
fn patch_accepts_an_alternative_encoding() {
    let dir = tempdir().expect("tempdir");
    let patch_path = dir.path().join("latin1.diff");
    let xml_path = dir.path().join("doc.xml");

    fs::write(&xml_path, "<doc><p>plain</p></doc>").expect("write xml");
    // "café" in latin-1: the 0xE9 byte is not valid UTF-8.
    let mut script = b"[update-text, /doc/p[1], \"caf".to_vec();
    script.push(0xE9);
    script.extend_from_slice(b"\", \"plain\"]");
    fs::write(&patch_path, script).expect("write patch");

    xmldelta()
        .arg("patch")
        .arg(&patch_path)
        .arg(&xml_path)
        .args(["--diff-encoding", "latin1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<p>caf\u{e9}</p>"));

    // Without the encoding hint the same file is rejected.
    xmldelta()
        .arg("patch")
        .arg(&patch_path)
        .arg(&xml_path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("UTF-8"));
}

#[test]
fn precondition_violations_surface_as_errors() {
    let dir = tempdir().expect("tempdir");
    let patch_path = dir.path().join("bad.diff");
    let xml_path = dir.path().join("doc.xml");

    fs::write(&xml_path, "<doc a=\"1\"/>").expect("write xml");
    fs::write(&patch_path, "[insert-attribute, /doc[1], a, \"2\"]").expect("write patch");

    xmldelta()
        .arg("patch")
        .arg(&patch_path)
        .arg(&xml_path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn unknown_verbs_in_a_patch_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let patch_path = dir.path().join("bad.diff");
    let xml_path = dir.path().join("doc.xml");

    fs::write(&xml_path, "<doc/>").expect("write xml");
    fs::write(&patch_path, "[explode, /doc[1]]").expect("write patch");

    xmldelta()
        .arg("patch")
        .arg(&patch_path)
        .arg(&xml_path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("explode"));
}
