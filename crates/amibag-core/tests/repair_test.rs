mod common;

use amibag_core::bagit::BagHandle;
use amibag_core::fixity::{hash_file, Algorithm};
use amibag_core::premis::{event_type, PremisLog, OUTCOME_PASS, PREMIS_EVENTS_JSON};
use amibag_core::repair::cleanup::rules_from_config;
use amibag_core::repair::{CleanupRule, RepairEngine, RepairStep, StepStatus};
use amibag_core::default_config;
use common::*;

const X_MOV: &str = "data/PreservationMasters/x.mov";

fn engine(bag: &TestBag) -> RepairEngine {
    RepairEngine::open(bag.root()).unwrap()
}

#[test]
fn test_add_untracked_file() {
    let bag = make_bag(&json_video_payload(), &[Algorithm::Md5, Algorithm::Sha256]);
    bag.write(X_MOV, b"brand new media");

    let report = engine(&bag).add_payload_files_not_in_manifest().unwrap();
    assert_eq!(report.added, vec![X_MOV.to_string()]);
    assert!(report.is_complete(), "{:?}", report.steps);

    let reopened = BagHandle::open(bag.root()).unwrap();
    let expected = hash_file(&bag.path(X_MOV), reopened.algorithms()).unwrap();
    assert_eq!(reopened.manifests().get(X_MOV), Some(&expected));
    assert!(reopened.is_valid(false));

    let log = PremisLog::load(bag.root()).unwrap();
    let mentioning: Vec<_> = log.events().iter().filter(|e| e.detail.contains("x.mov")).collect();
    assert_eq!(mentioning.len(), 1);
    assert_eq!(mentioning[0].event_type, event_type::MESSAGE_DIGEST_CALCULATION);
    assert_eq!(mentioning[0].outcome, OUTCOME_PASS);
}

#[test]
fn test_add_file_with_encoded_name() {
    let bag = make_json_video_bag();
    let odd = "data/._.SYSTEMFILE.db\r";
    bag.write(odd, "♡".as_bytes());

    engine(&bag).add_payload_files_not_in_manifest().unwrap();
    assert!(bag.read("manifest-md5.txt").contains("data/._.SYSTEMFILE.db%0D"));
    let reopened = BagHandle::open(bag.root()).unwrap();
    assert!(reopened.manifests().contains(odd));
    assert!(reopened.is_valid(false));
}

#[test]
fn test_manifest_rewrite_keeps_backup() {
    let bag = make_json_video_bag();
    let before = bag.read("manifest-md5.txt");
    bag.write(X_MOV, b"new");

    engine(&bag).add_payload_files_not_in_manifest().unwrap();

    let backups = bag.files_matching("manifest-md5-", ".txt.old");
    assert_eq!(backups.len(), 1);
    assert_eq!(bag.read(&backups[0]), before);
    assert_ne!(bag.read("manifest-md5.txt"), before);

    // Manifest events name the manifest, never payload files.
    let log = PremisLog::load(bag.root()).unwrap();
    let rewrite: Vec<_> = log
        .events()
        .iter()
        .filter(|e| e.detail.contains("manifest-md5.txt"))
        .collect();
    assert_eq!(rewrite.len(), 1);
    assert!(!rewrite[0].detail.contains("x.mov"));
}

#[test]
fn test_manifest_round_trip_through_disk() {
    let bag = make_bag(&json_video_payload(), &[Algorithm::Sha1, Algorithm::Sha512]);
    bag.write(X_MOV, b"new");
    let mut engine = engine(&bag);
    engine.add_payload_files_not_in_manifest().unwrap();
    let in_memory = engine.bag().manifests().entries().clone();

    let reopened = BagHandle::open(bag.root()).unwrap();
    assert_eq!(reopened.manifests().entries(), &in_memory);
}

#[test]
fn test_update_hashes_is_idempotent() {
    let bag = make_json_video_bag();
    bag.write(PM_MOV, b"re-encoded preservation master");

    let mut engine = engine(&bag);
    let first = engine.update_hashes(None).unwrap();
    assert_eq!(first.updated, vec![PM_MOV.to_string()]);
    assert_eq!(first.events_recorded, 1);
    assert!(BagHandle::open(bag.root()).unwrap().is_valid(false));

    let manifest = bag.read("manifest-md5.txt");
    let events = PremisLog::load(bag.root()).unwrap().len();

    let second = engine.update_hashes(None).unwrap();
    assert!(second.updated.is_empty());
    assert_eq!(second.events_recorded, 0);
    assert!(second.steps.is_empty());
    assert_eq!(bag.read("manifest-md5.txt"), manifest);
    assert_eq!(PremisLog::load(bag.root()).unwrap().len(), events);
    assert_eq!(bag.files_matching("manifest-md5-", ".txt.old").len(), 1);
}

#[test]
fn test_update_hashes_respects_filename_pattern() {
    let bag = make_json_video_bag();
    bag.write(PM_MOV, b"changed media");
    bag.write(PM_JSON, b"{\"changed\": true}");

    let report = engine(&bag).update_hashes(Some(r"\.json$")).unwrap();
    assert_eq!(report.updated, vec![PM_JSON.to_string()]);

    let reopened = BagHandle::open(bag.root()).unwrap();
    assert!(!reopened.is_valid(false));
    assert!(reopened.is_valid(true));
}

#[test]
fn test_update_hashes_rejects_bad_pattern() {
    let bag = make_json_video_bag();
    assert!(engine(&bag).update_hashes(Some("(")).is_err());
}

#[test]
fn test_delete_untracked_system_files() {
    let bag = make_json_video_bag();
    bag.write("data/Thumbs.db", b"thumbs");
    bag.write("data/PreservationMasters/.DS_Store", b"ds");
    bag.write("data/PreservationMasters/keep.mov", b"keep");

    let rules = rules_from_config(&default_config().unwrap()).unwrap();
    let report = engine(&bag).delete_payload_files_not_in_manifest(&rules).unwrap();

    assert_eq!(report.deleted.len(), 2);
    assert_eq!(report.retained, vec!["data/PreservationMasters/keep.mov".to_string()]);
    assert!(!bag.path("data/Thumbs.db").exists());
    assert!(bag.path("data/PreservationMasters/keep.mov").exists());

    // keep.mov is still on disk, so the recorded Oxum went stale.
    assert_eq!(
        report.step(RepairStep::BagInfo).unwrap().outcome,
        Ok(StepStatus::Written)
    );
    assert!(BagHandle::open(bag.root()).unwrap().check_oxum());

    let log = PremisLog::load(bag.root()).unwrap();
    assert!(log
        .events()
        .iter()
        .any(|e| e.event_type == event_type::DELETION && e.detail.contains("Thumbs.db")));
}

#[test]
fn test_delete_with_empty_rules_removes_every_untracked_file() {
    let bag = make_json_video_bag();
    bag.write("data/._.SYSTEMFILE.db\r", "♡".as_bytes());
    bag.write("data/PreservationMasters/stray.mov", b"stray");

    let report = engine(&bag).delete_payload_files_not_in_manifest(&[]).unwrap();
    assert_eq!(report.deleted.len(), 2);
    assert!(BagHandle::open(bag.root()).unwrap().is_valid(false));
}

#[test]
fn test_uncaptured_files_are_left_alone() {
    let bag = make_json_video_bag();
    bag.write("data/._.SYSTEMFILE.db\r", "♡".as_bytes());
    let rules = vec![CleanupRule::new("Thumbs.db", r"[Tt]humbs\.db$", false).unwrap()];

    let report = engine(&bag).delete_payload_files_not_in_manifest(&rules).unwrap();
    assert!(report.deleted.is_empty());
    assert_eq!(report.retained, vec!["data/._.SYSTEMFILE.db\r".to_string()]);

    let reopened = BagHandle::open(bag.root()).unwrap();
    assert_eq!(
        reopened.payload_files_not_in_manifest().unwrap(),
        vec!["data/._.SYSTEMFILE.db\r".to_string()]
    );
    assert!(!reopened.is_valid(false));
}

#[test]
fn test_stale_oxum_is_rewritten() {
    let bag = make_json_video_bag();
    let info = bag.read("bag-info.txt").replace(
        bag.read("bag-info.txt")
            .lines()
            .find(|l| l.starts_with("Payload-Oxum"))
            .unwrap(),
        "Payload-Oxum: 0.0",
    );
    bag.write("bag-info.txt", info.as_bytes());
    assert!(!BagHandle::open(bag.root()).unwrap().check_oxum());

    let mut engine = engine(&bag);
    let steps = engine.write_bag_updates();
    assert_eq!(steps[0].step, RepairStep::BagInfo);
    assert_eq!(steps[0].outcome, Ok(StepStatus::Written));

    let reopened = BagHandle::open(bag.root()).unwrap();
    assert!(reopened.check_oxum());
    assert!(reopened.is_valid(false));
    let before_key = reopened
        .info()
        .iter()
        .find(|(k, _)| k.starts_with("Payload-Oxum-Before-"))
        .map(|(_, v)| v.to_string());
    assert_eq!(before_key.as_deref(), Some("0.0"));
    assert!(reopened.info().get("Most-Recent-Update-Date").is_some());
}

#[test]
fn test_delete_manifest_entries_for_missing_files() {
    let bag = make_json_video_bag();
    std::fs::remove_file(bag.path(IMAGE)).unwrap();

    let report = engine(&bag).delete_manifest_entries_not_in_payload().unwrap();
    assert_eq!(report.removed_entries, vec![IMAGE.to_string()]);
    let reopened = BagHandle::open(bag.root()).unwrap();
    assert!(!reopened.manifests().contains(IMAGE));
    assert!(reopened.is_valid(false));
}

#[test]
fn test_dry_run_writes_nothing() {
    let bag = make_json_video_bag();
    bag.write(X_MOV, b"new");
    bag.write("data/Thumbs.db", b"thumbs");
    let manifest = bag.read("manifest-md5.txt");
    let info = bag.read("bag-info.txt");

    let mut engine = engine(&bag).with_dry_run(true);
    let rules = rules_from_config(&default_config().unwrap()).unwrap();
    let deleted = engine.delete_payload_files_not_in_manifest(&rules).unwrap();
    assert_eq!(deleted.deleted, vec!["data/Thumbs.db".to_string()]);
    let added = engine.add_payload_files_not_in_manifest().unwrap();
    assert!(added.dry_run);
    assert!(added.steps.is_empty());

    assert!(bag.path("data/Thumbs.db").exists());
    assert_eq!(bag.read("manifest-md5.txt"), manifest);
    assert_eq!(bag.read("bag-info.txt"), info);
    assert!(!bag.path(PREMIS_EVENTS_JSON).exists());
    assert!(bag.files_matching("manifest-md5-", ".txt.old").is_empty());
}

#[test]
fn test_premis_events_record_agents() {
    let bag = make_json_video_bag();

    let mut engine = engine(&bag).with_repairer(Some("Smokey Yunick".into()));
    engine.add_premis_event("Repair Metadata", "Just looking around", OUTCOME_PASS, "tests", None);
    engine.add_premis_event(
        "Repair Metadata",
        "Looking again",
        OUTCOME_PASS,
        "tests",
        Some("Yogi Bear"),
    );
    engine.write_bag_updates();

    let log = PremisLog::load(bag.root()).unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log.events()[0].human_agent.as_deref(), Some("Smokey Yunick"));
    assert_eq!(log.events()[1].human_agent.as_deref(), Some("Yogi Bear"));

    // Prior events survive later repairs.
    bag.write(X_MOV, b"new");
    RepairEngine::open(bag.root())
        .unwrap()
        .add_payload_files_not_in_manifest()
        .unwrap();
    let log = PremisLog::load(bag.root()).unwrap();
    assert!(log.len() > 2);
    assert_eq!(log.events()[0].detail, "Just looking around");
}

#[test]
fn test_update_message_is_recorded_in_baginfo() {
    let bag = make_json_video_bag();
    let mut engine = engine(&bag);
    engine.update_baginfo("Replaced service copy");
    engine.write_bag_updates();

    let info = bag.read("bag-info.txt");
    assert!(info.contains("Update-Message-"));
    assert!(info.contains("Replaced service copy"));
    assert!(info.contains("Most-Recent-Update-Date"));
}

#[test]
fn test_tag_manifest_covers_tag_files() {
    let bag = make_json_video_bag();
    bag.write(X_MOV, b"new");
    engine(&bag).add_payload_files_not_in_manifest().unwrap();

    let tagmanifest = bag.read("tagmanifest-md5.txt");
    assert!(tagmanifest.contains("  bagit.txt\n"));
    assert!(tagmanifest.contains("  bag-info.txt\n"));
    assert!(tagmanifest.contains("  manifest-md5.txt\n"));
    assert!(tagmanifest.contains(&format!("  {}\n", PREMIS_EVENTS_JSON)));
    assert!(!tagmanifest.contains("data/"));
    assert!(!tagmanifest.contains("tagmanifest-"));
}

#[test]
fn test_prior_events_are_never_rewritten() {
    let bag = make_json_video_bag();
    let existing = r#"[
  {
    "Event-Date-Time": "2019-05-01T12:00:00.123456",
    "Event-Type": "message digest calculation",
    "Event-Detail-Information": "Bagged by hand",
    "Event-Outcome": "Pass",
    "Event-Software-Agent": "bagit.py"
  },
  {
    "Event-Date-Time": "2019-05-01T12:00:00-04:00",
    "Event-Type": "deletion",
    "Event-Detail-Information": "Deleted data/Thumbs.db",
    "Event-Outcome": "Pass",
    "Event-Software-Agent": "ami-tools"
  }
]"#;
    bag.write(PREMIS_EVENTS_JSON, existing.as_bytes());
    bag.write(X_MOV, b"new");

    let report = engine(&bag).add_payload_files_not_in_manifest().unwrap();
    assert!(report.is_complete(), "{:?}", report.steps);

    let written: Vec<serde_json::Value> = serde_json::from_str(&bag.read(PREMIS_EVENTS_JSON)).unwrap();
    let before: Vec<serde_json::Value> = serde_json::from_str(existing).unwrap();
    assert!(written.len() > 2);
    assert_eq!(written[..2], before[..]);
    assert_eq!(written[1]["Event-Date-Time"], "2019-05-01T12:00:00-04:00");
}

#[test]
fn test_failed_step_does_not_stop_later_steps() {
    let bag = make_json_video_bag();
    bag.write(X_MOV, b"new");
    let mut engine = engine(&bag);
    std::fs::create_dir(bag.path(PREMIS_EVENTS_JSON)).unwrap();

    let report = engine.add_payload_files_not_in_manifest().unwrap();
    assert!(!report.is_complete());
    assert_eq!(
        report.step(RepairStep::Manifests).unwrap().outcome,
        Ok(StepStatus::Written)
    );
    assert!(report.step(RepairStep::Provenance).unwrap().outcome.is_err());
    assert_eq!(
        report.step(RepairStep::TagManifests).unwrap().outcome,
        Ok(StepStatus::Written)
    );
    assert!(bag.read("manifest-md5.txt").contains(X_MOV));
}

#[cfg(unix)]
#[test]
fn test_manifest_is_kept_when_backup_fails() {
    let bag = make_json_video_bag();
    let before = bag.read("manifest-md5.txt");
    bag.write(X_MOV, b"new");

    // Dangling links on every backup name the commit could pick; copying
    // through one fails because its target directory does not exist.
    let now = chrono::Local::now();
    for offset in -2..=60 {
        let stamp = (now + chrono::Duration::seconds(offset)).format("%Y%m%dT%H%M%S");
        std::os::unix::fs::symlink(
            bag.path("missing/backup"),
            bag.path(&format!("manifest-md5-{}.txt.old", stamp)),
        )
        .unwrap();
    }

    let report = engine(&bag).add_payload_files_not_in_manifest().unwrap();
    let manifests = report.step(RepairStep::Manifests).unwrap();
    assert!(manifests.outcome.as_ref().unwrap_err().contains("unable to back up manifest-md5.txt"));
    assert_eq!(bag.read("manifest-md5.txt"), before);
    assert_eq!(
        report.step(RepairStep::Provenance).unwrap().outcome,
        Ok(StepStatus::Written)
    );
    assert_eq!(
        report.step(RepairStep::TagManifests).unwrap().outcome,
        Ok(StepStatus::Written)
    );
}
