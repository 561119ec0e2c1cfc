//! Repair engine: brings manifests and bag-info back in line with the
//! payload and records every change in the provenance log.
//!
//! Each entry point mutates the in-memory state, then runs the commit
//! sequence ([`RepairEngine::write_bag_updates`]):
//!
//! 1. bag-info (Payload-Oxum, update message)
//! 2. payload manifests, backed up first, only when changed
//! 3. `premis-events.json`
//! 4. tag manifests
//!
//! Steps are independent; a failing step is reported and the rest still run.

pub mod cleanup;
pub mod report;

pub use cleanup::CleanupRule;
pub use report::{FileFailure, RepairReport, RepairStep, StepReport, StepStatus};

use crate::bagit::baginfo::{MOST_RECENT_UPDATE_DATE, PAYLOAD_OXUM};
use crate::bagit::manifest::write_tagmanifest;
use crate::bagit::{BagError, BagHandle, BAG_INFO_TXT};
use crate::fixity::hash_file;
use crate::premis::{event_type, PremisError, PremisLog, ProvenanceEvent, OUTCOME_PASS};
use regex::Regex;
use std::path::Path;
use thiserror::Error;

/// Software agent recorded on events the engine writes.
pub const SOFTWARE_AGENT: &str = concat!("amibag-core ", env!("CARGO_PKG_VERSION"));

/// Failures that stop an entry point before anything is committed.
#[derive(Debug, Error)]
pub enum RepairError {
    #[error(transparent)]
    Bag(#[from] BagError),

    #[error(transparent)]
    Premis(#[from] PremisError),

    #[error("unable to list payload of {bag}: {source}")]
    Payload {
        bag: String,
        source: std::io::Error,
    },

    #[error("invalid filename pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },
}

fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

fn backup_stamp() -> String {
    chrono::Local::now().format("%Y%m%dT%H%M%S").to_string()
}

pub struct RepairEngine {
    bag: BagHandle,
    premis: PremisLog,
    dry_run: bool,
    repairer: Option<String>,
    update_message: Option<String>,
}

impl RepairEngine {
    /// Take ownership of a loaded bag and read its provenance log.
    pub fn new(bag: BagHandle) -> Result<Self, RepairError> {
        let premis = PremisLog::load(bag.root())?;
        Ok(Self {
            bag,
            premis,
            dry_run: false,
            repairer: None,
            update_message: None,
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepairError> {
        Self::new(BagHandle::open(path)?)
    }

    /// In dry-run mode nothing on disk is modified.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Default human agent for recorded events.
    pub fn with_repairer(mut self, repairer: Option<String>) -> Self {
        self.repairer = repairer;
        self
    }

    pub fn bag(&self) -> &BagHandle {
        &self.bag
    }

    pub fn premis(&self) -> &PremisLog {
        &self.premis
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn new_report(&self) -> RepairReport {
        RepairReport::new(self.bag.root().display().to_string(), self.dry_run)
    }

    fn payload_error(&self, source: std::io::Error) -> RepairError {
        RepairError::Payload {
            bag: self.bag.root().display().to_string(),
            source,
        }
    }

    fn record(&mut self, event_type: &str, detail: String) {
        let event = ProvenanceEvent::new(event_type, detail, OUTCOME_PASS, SOFTWARE_AGENT)
            .with_human_agent(self.repairer.clone());
        self.premis.append(event);
    }

    /// Append a provenance event; it is written by the next commit.
    /// `human_agent` falls back to the engine's repairer.
    pub fn add_premis_event(
        &mut self,
        event_type: &str,
        detail: &str,
        outcome: &str,
        software_agent: &str,
        human_agent: Option<&str>,
    ) {
        let human = human_agent
            .map(String::from)
            .or_else(|| self.repairer.clone());
        let event = ProvenanceEvent::new(event_type, detail, outcome, software_agent).with_human_agent(human);
        self.premis.append(event);
    }

    /// Record `Update-Message-<date>` in bag-info during the next commit.
    pub fn update_baginfo(&mut self, message: impl Into<String>) {
        self.update_message = Some(message.into());
    }

    /// Hash every payload file missing from the manifests and add it.
    pub fn add_payload_files_not_in_manifest(&mut self) -> Result<RepairReport, RepairError> {
        let mut report = self.new_report();
        let untracked = self
            .bag
            .payload_files_not_in_manifest()
            .map_err(|e| self.payload_error(e))?;
        if untracked.is_empty() {
            tracing::info!(bag = %self.bag.root().display(), "no untracked payload files");
            return Ok(report);
        }

        tracing::info!(
            bag = %self.bag.root().display(),
            files = %untracked.join(", "),
            "adding files to manifests"
        );
        let algorithms = self.bag.algorithms().clone();
        for path in untracked {
            match hash_file(&self.bag.root().join(&path), &algorithms) {
                Ok(digests) => {
                    self.bag.manifests.insert(path.clone(), digests);
                    report.added.push(path);
                }
                Err(e) => {
                    tracing::error!(file = %path, error = %e, "unable to hash payload file");
                    report.failed.push(FileFailure {
                        path,
                        error: e.to_string(),
                    });
                }
            }
        }

        if !report.added.is_empty() {
            self.record(
                event_type::MESSAGE_DIGEST_CALCULATION,
                format!("Added files to manifests: {}", report.added.join(", ")),
            );
            report.events_recorded += 1;
            report.steps = self.write_bag_updates();
        }
        Ok(report)
    }

    /// Recompute digests of manifest entries (optionally only paths matching
    /// `filename_pattern`) and store those that changed. A second call with
    /// no payload change writes nothing.
    pub fn update_hashes(&mut self, filename_pattern: Option<&str>) -> Result<RepairReport, RepairError> {
        let pattern = filename_pattern
            .map(|p| {
                Regex::new(p).map_err(|source| RepairError::Pattern {
                    pattern: p.to_string(),
                    source,
                })
            })
            .transpose()?;

        let mut report = self.new_report();
        let algorithms = self.bag.algorithms().clone();
        let candidates: Vec<String> = self
            .bag
            .payload_entries()
            .map(|(path, _)| path.to_string())
            .filter(|path| pattern.as_ref().is_none_or(|re| re.is_match(path)))
            .collect();

        for path in candidates {
            let file = self.bag.root().join(&path);
            if !file.is_file() {
                continue;
            }
            match hash_file(&file, &algorithms) {
                Ok(digests) => {
                    if self.bag.manifests.insert(path.clone(), digests) {
                        tracing::info!(file = %path, "digest changed");
                        report.updated.push(path);
                    }
                }
                Err(e) => {
                    tracing::error!(file = %path, error = %e, "unable to hash payload file");
                    report.failed.push(FileFailure {
                        path,
                        error: e.to_string(),
                    });
                }
            }
        }

        if report.updated.is_empty() {
            tracing::info!(bag = %self.bag.root().display(), "all digests are current");
            return Ok(report);
        }

        self.record(
            event_type::MESSAGE_DIGEST_CALCULATION,
            format!("Updated digests for: {}", report.updated.join(", ")),
        );
        report.events_recorded += 1;
        report.steps = self.write_bag_updates();
        Ok(report)
    }

    /// Delete untracked payload files selected by `rules` (all of them when
    /// `rules` is empty). Files no rule selects are left and reported.
    pub fn delete_payload_files_not_in_manifest(
        &mut self,
        rules: &[CleanupRule],
    ) -> Result<RepairReport, RepairError> {
        let mut report = self.new_report();
        let untracked = self
            .bag
            .payload_files_not_in_manifest()
            .map_err(|e| self.payload_error(e))?;
        let (to_delete, retained) = cleanup::partition(&untracked, rules);

        if !retained.is_empty() {
            tracing::warn!(
                files = %retained.join(", "),
                "untracked files in payload directory do not match deletion rules"
            );
        }
        report.retained = retained;

        for path in to_delete {
            if self.dry_run {
                tracing::info!(file = %path, "dry run: would delete");
                report.deleted.push(path);
                continue;
            }
            tracing::warn!(file = %path, "deleting untracked payload file");
            match std::fs::remove_file(self.bag.root().join(&path)) {
                Ok(()) => report.deleted.push(path),
                Err(e) => {
                    tracing::error!(file = %path, error = %e, "unable to delete");
                    report.failed.push(FileFailure {
                        path,
                        error: e.to_string(),
                    });
                }
            }
        }

        if report.deleted.is_empty() {
            return Ok(report);
        }

        self.record(
            event_type::DELETION,
            format!("Deleted untracked payload files: {}", report.deleted.join(", ")),
        );
        report.events_recorded += 1;
        report.steps = self.write_bag_updates();
        Ok(report)
    }

    /// Drop manifest entries whose payload file no longer exists.
    pub fn delete_manifest_entries_not_in_payload(&mut self) -> Result<RepairReport, RepairError> {
        let mut report = self.new_report();
        let missing = self
            .bag
            .manifest_entries_not_in_payload()
            .map_err(|e| self.payload_error(e))?;
        for path in missing {
            if self.bag.manifests.remove(&path) {
                report.removed_entries.push(path);
            }
        }
        if report.removed_entries.is_empty() {
            return Ok(report);
        }

        self.record(
            event_type::DELETION,
            format!(
                "Removed manifest entries for missing payload files: {}",
                report.removed_entries.join(", ")
            ),
        );
        report.events_recorded += 1;
        report.steps = self.write_bag_updates();
        Ok(report)
    }

    /// Commit in-memory state to disk. Skipped entirely in dry-run mode.
    pub fn write_bag_updates(&mut self) -> Vec<StepReport> {
        if self.dry_run {
            tracing::info!(bag = %self.bag.root().display(), "dry run: not writing bag updates");
            return Vec::new();
        }
        vec![
            self.write_baginfo(),
            self.write_manifests(),
            self.write_premis(),
            self.write_tagmanifests(),
        ]
    }

    fn write_baginfo(&mut self) -> StepReport {
        let step = RepairStep::BagInfo;
        let actual = match self.bag.compute_oxum() {
            Ok(oxum) => oxum,
            Err(e) => return StepReport::failed(step, format!("unable to compute Payload-Oxum: {}", e)),
        };
        let today = today();
        let mut changed = false;

        if self.bag.info.oxum() != Some(Ok(actual)) {
            let before = self.bag.info.get(PAYLOAD_OXUM).map(String::from);
            if let Some(before) = &before {
                self.bag
                    .info
                    .set(format!("{}-Before-{}", PAYLOAD_OXUM, today), before.clone());
            }
            self.bag.info.set(MOST_RECENT_UPDATE_DATE, today.clone());
            self.bag.info.set(PAYLOAD_OXUM, actual.to_string());
            self.record(
                event_type::METADATA_MODIFICATION,
                format!(
                    "Payload-Oxum updated from {} to {}",
                    before.as_deref().unwrap_or("(none)"),
                    actual
                ),
            );
            changed = true;
        }

        if let Some(message) = self.update_message.take() {
            self.bag.info.set(format!("Update-Message-{}", today), message);
            self.bag.info.set(MOST_RECENT_UPDATE_DATE, today);
            changed = true;
        }

        if !changed {
            return StepReport::ok(step, StepStatus::Unchanged);
        }
        match self.bag.info.write(&self.bag.root().join(BAG_INFO_TXT)) {
            Ok(()) => StepReport::ok(step, StepStatus::Written),
            Err(e) => StepReport::failed(step, format!("unable to write {}: {}", BAG_INFO_TXT, e)),
        }
    }

    fn write_manifests(&mut self) -> StepReport {
        let step = RepairStep::Manifests;
        if !self.bag.manifests.is_dirty() {
            return StepReport::ok(step, StepStatus::Unchanged);
        }

        let root = self.bag.root().to_path_buf();
        let stamp = backup_stamp();
        let mut errors = Vec::new();
        let algorithms = self.bag.algorithms().clone();

        for alg in algorithms {
            let manifest = alg.manifest_filename();
            let backup = if root.join(&manifest).is_file() {
                match self.bag.manifests.backup(&root, alg, &stamp) {
                    Ok(path) => Some(path),
                    Err(e) => {
                        // Never overwrite a manifest that could not be backed up.
                        errors.push(format!("unable to back up {}: {}", manifest, e));
                        continue;
                    }
                }
            } else {
                None
            };
            match self.bag.manifests.write(&root, alg) {
                Ok(_) => {
                    let detail = match backup.as_deref().and_then(Path::file_name) {
                        Some(name) => format!(
                            "Rewrote {}; previous version kept as {}",
                            manifest,
                            name.to_string_lossy()
                        ),
                        None => format!("Wrote {}", manifest),
                    };
                    self.record(event_type::METADATA_MODIFICATION, detail);
                }
                Err(e) => errors.push(format!("unable to write {}: {}", manifest, e)),
            }
        }

        if errors.is_empty() {
            self.bag.manifests.mark_clean();
            StepReport::ok(step, StepStatus::Written)
        } else {
            StepReport::failed(step, errors.join("; "))
        }
    }

    fn write_premis(&mut self) -> StepReport {
        let step = RepairStep::Provenance;
        if self.premis.pending().is_empty() {
            return StepReport::ok(step, StepStatus::Unchanged);
        }
        match self.premis.save(self.bag.root()) {
            Ok(_) => StepReport::ok(step, StepStatus::Written),
            Err(e) => StepReport::failed(step, e.to_string()),
        }
    }

    fn write_tagmanifests(&mut self) -> StepReport {
        let step = RepairStep::TagManifests;
        let mut errors = Vec::new();
        for alg in self.bag.algorithms() {
            if let Err(e) = write_tagmanifest(self.bag.root(), *alg) {
                errors.push(format!("unable to write {}: {}", alg.tagmanifest_filename(), e));
            }
        }
        if errors.is_empty() {
            StepReport::ok(step, StepStatus::Written)
        } else {
            StepReport::failed(step, errors.join("; "))
        }
    }
}
