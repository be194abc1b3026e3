use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn xmldelta() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("xmldelta"))
}

#[test]
fn diff_prints_compact_records_by_default() {
    xmldelta()
        .arg("diff")
        .arg(fixture("fixtures/scn_a_left.xml"))
        .arg(fixture("fixtures/scn_a_right.xml"))
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "[update-attribute, /root/node[1], attr2, \"uhhuh\"]",
        ))
        .stdout(predicate::str::contains(
            "[rename-attribute, /root/node[1], attr1, attr4]",
        ))
        .stdout(predicate::str::contains(
            "[update-text, /root/node[1], \"The new text\", \"The contained text\"]",
        ));
}

#[test]
fn diff_xml_formatter_annotates_the_left_tree() {
    xmldelta()
        .arg("diff")
        .arg(fixture("fixtures/scn_a_left.xml"))
        .arg(fixture("fixtures/scn_a_right.xml"))
        .args(["--formatter", "xml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("xmlns:diff="))
        .stdout(predicate::str::contains("diff:rename-attr=\"attr1:attr4\""))
        .stdout(predicate::str::contains("diff:update-attr=\"attr2:ohno\""));
}

#[test]
fn diff_old_formatter_uses_legacy_verbs() {
    xmldelta()
        .arg("diff")
        .arg(fixture("fixtures/scn_a_left.xml"))
        .arg(fixture("fixtures/scn_a_right.xml"))
        .args(["--formatter", "old"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "[update, /root/node[1]/@attr2, \"uhhuh\"]",
        ))
        .stdout(predicate::str::contains("[remove, /root/node[1]/@attr1]"))
        .stdout(predicate::str::contains("<@attr4>\nohyeah\n</@attr4>"))
        .stdout(predicate::str::contains(
            "[update, /root/node[1]/text()[2], \"Also a tail!\"]",
        ));
}

#[test]
fn check_reports_differences_through_the_exit_code() {
    xmldelta()
        .arg("diff")
        .arg(fixture("fixtures/scn_a_left.xml"))
        .arg(fixture("fixtures/scn_a_right.xml"))
        .arg("--check")
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty());

    xmldelta()
        .arg("diff")
        .arg(fixture("fixtures/scn_a_left.xml"))
        .arg(fixture("fixtures/scn_a_left.xml"))
        .arg("--check")
        .assert()
        .code(0);
}

#[test]
fn identical_files_produce_an_empty_diff() {
    xmldelta()
        .arg("diff")
        .arg(fixture("fixtures/scn_b_left.xml"))
        .arg(fixture("fixtures/scn_b_left.xml"))
        .assert()
        .success()
        .stdout("\n");
}

#[test]
fn out_of_range_threshold_is_an_argument_error() {
    for bad in ["0", "1.5", "-0.2", "abc"] {
        xmldelta()
            .arg("diff")
            .arg(fixture("fixtures/scn_a_left.xml"))
            .arg(fixture("fixtures/scn_a_right.xml"))
            .args(["-F", bad])
            .assert()
            .code(2);
    }
}

#[test]
fn conflicting_match_modes_are_an_argument_error() {
    xmldelta()
        .arg("diff")
        .arg(fixture("fixtures/scn_a_left.xml"))
        .arg(fixture("fixtures/scn_a_right.xml"))
        .args(["--fast-match", "--best-match"])
        .assert()
        .code(2);
}

#[test]
fn malformed_unique_attributes_are_a_configuration_error() {
    xmldelta()
        .arg("diff")
        .arg(fixture("fixtures/scn_a_left.xml"))
        .arg(fixture("fixtures/scn_a_right.xml"))
        .args(["--unique-attributes", "@broken"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unique attribute"));
}

#[test]
fn unknown_ratio_mode_is_an_argument_error() {
    xmldelta()
        .arg("diff")
        .arg(fixture("fixtures/scn_a_left.xml"))
        .arg(fixture("fixtures/scn_a_right.xml"))
        .args(["--ratio-mode", "warp"])
        .assert()
        .code(2);
}

#[test]
fn missing_input_is_a_runtime_error() {
    xmldelta()
        .arg("diff")
        .arg(fixture("fixtures/scn_a_left.xml"))
        .arg(fixture("fixtures/no_such_file.xml"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to read"));
}
