use amibag_core::bagit::encode_filename;
use amibag_core::fixity::{hash_reader, Algorithm};
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::collections::BTreeSet;
use std::io::Cursor;
use std::path::Path;
use tempfile::TempDir;

const PM_MOV: &str = "data/PreservationMasters/myd_263524_v01_pm.mov";
const SC_MP4: &str = "data/ServiceCopies/myd_263524_v01_sc.mp4";

fn media_json(reference: &str, format: &str) -> Vec<u8> {
    let (stem, ext) = reference.rsplit_once('.').unwrap();
    serde_json::json!({
        "asset": {"referenceFilename": reference},
        "technical": {"filename": stem, "extension": ext, "fileFormat": format}
    })
    .to_string()
    .into_bytes()
}

fn write(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// A well-formed JSON video bag inside `parent/name`.
fn make_bag_in(parent: &Path, name: &str) -> std::path::PathBuf {
    let root = parent.join(name);
    let payload: Vec<(&str, Vec<u8>)> = vec![
        (PM_MOV, b"preservation master".to_vec()),
        (
            "data/PreservationMasters/myd_263524_v01_pm.json",
            media_json("myd_263524_v01_pm.mov", "QuickTime"),
        ),
        (SC_MP4, b"service copy".to_vec()),
        (
            "data/ServiceCopies/myd_263524_v01_sc.json",
            media_json("myd_263524_v01_sc.mp4", "MPEG-4"),
        ),
        ("data/Images/myd_263524_v01_01.jpeg", b"jpeg".to_vec()),
    ];

    write(&root, "bagit.txt", b"BagIt-Version: 0.97\nTag-File-Character-Encoding: UTF-8\n");
    let algs: BTreeSet<Algorithm> = [Algorithm::Md5].into_iter().collect();
    let mut manifest = String::new();
    let mut bytes = 0;
    let mut sorted = payload.clone();
    sorted.sort();
    for (rel, content) in &sorted {
        write(&root, rel, content);
        bytes += content.len();
        let digests = hash_reader(Cursor::new(content), &algs).unwrap();
        manifest.push_str(&format!("{}  {}\n", digests[&Algorithm::Md5], encode_filename(rel)));
    }
    write(&root, "manifest-md5.txt", manifest.as_bytes());
    write(
        &root,
        "bag-info.txt",
        format!("Payload-Oxum: {}.{}\n", bytes, payload.len()).as_bytes(),
    );
    root
}

fn amibag() -> Command {
    let mut cmd = Command::cargo_bin("amibag").unwrap();
    cmd.env_remove("RUST_LOG").env_remove("AMIBAG_CONFIG");
    cmd
}

#[test]
fn classify_prints_type_and_subtype() {
    let tmp = TempDir::new().unwrap();
    let bag = make_bag_in(tmp.path(), "bag");

    amibag()
        .args(["classify"])
        .arg(&bag)
        .assert()
        .success()
        .stdout(predicate::str::contains("json video"));
}

#[test]
fn classify_non_bag_exits_with_load_error() {
    let tmp = TempDir::new().unwrap();

    amibag()
        .args(["classify"])
        .arg(tmp.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not a bag"));
}

#[test]
fn validate_well_formed_bag_exits_zero() {
    let tmp = TempDir::new().unwrap();
    let bag = make_bag_in(tmp.path(), "bag");

    amibag()
        .args(["validate", "--slow"])
        .arg(&bag)
        .assert()
        .success()
        .stderr(predicate::str::contains(": VALID"));
}

#[test]
fn validate_untracked_file_exits_one_with_json_findings() {
    let tmp = TempDir::new().unwrap();
    let bag = make_bag_in(tmp.path(), "bag");
    write(&bag, "data/PreservationMasters/.DS_Store", b"junk");

    let output = amibag()
        .args(["--quiet", "validate", "--format", "json"])
        .arg(&bag)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let reports: Value = serde_json::from_slice(&output.stdout).unwrap();
    let findings = reports[0]["findings"].as_array().unwrap();
    assert!(findings.iter().any(|f| f["check_id"] == "AMI-E001"));
}

#[test]
fn validate_directory_scans_child_bags() {
    let tmp = TempDir::new().unwrap();
    make_bag_in(tmp.path(), "one");
    make_bag_in(tmp.path(), "two");
    std::fs::create_dir(tmp.path().join("empty")).unwrap();

    let output = amibag()
        .args(["--quiet", "validate", "--format", "json", "--directory"])
        .arg(tmp.path())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));

    let reports: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(reports.as_array().unwrap().len(), 2);
}

#[test]
fn validate_without_bags_is_an_argument_error() {
    amibag()
        .args(["validate"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no bags to validate"));
}

#[test]
fn repair_add_files_updates_manifest_and_provenance() {
    let tmp = TempDir::new().unwrap();
    let bag = make_bag_in(tmp.path(), "bag");
    write(&bag, "data/PreservationMasters/myd_263524_v02_pm.mov", b"second");

    amibag()
        .args(["repair", "--add-files", "--agent", "Jane Doe"])
        .arg(&bag)
        .assert()
        .success();

    let manifest = std::fs::read_to_string(bag.join("manifest-md5.txt")).unwrap();
    assert!(manifest.contains("data/PreservationMasters/myd_263524_v02_pm.mov"));
    let events: Value =
        serde_json::from_str(&std::fs::read_to_string(bag.join("premis-events.json")).unwrap()).unwrap();
    assert!(events
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["Event-Human-Agent"] == "Jane Doe"));
}

#[test]
fn repair_dry_run_leaves_bag_untouched() {
    let tmp = TempDir::new().unwrap();
    let bag = make_bag_in(tmp.path(), "bag");
    write(&bag, "data/ServiceCopies/.DS_Store", b"junk");
    let manifest_before = std::fs::read_to_string(bag.join("manifest-md5.txt")).unwrap();

    let output = amibag()
        .args(["--quiet", "repair", "--delete-files", "--dry-run", "--format", "json"])
        .arg(&bag)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));

    let reports: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(reports[0]["deleted"][0], "data/ServiceCopies/.DS_Store");
    assert!(bag.join("data/ServiceCopies/.DS_Store").exists());
    assert!(!bag.join("premis-events.json").exists());
    assert_eq!(
        std::fs::read_to_string(bag.join("manifest-md5.txt")).unwrap(),
        manifest_before
    );
}

#[test]
fn repair_without_action_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let bag = make_bag_in(tmp.path(), "bag");

    amibag()
        .args(["repair"])
        .arg(&bag)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("nothing to do"));
}
