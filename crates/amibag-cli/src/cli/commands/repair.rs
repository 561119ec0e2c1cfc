use crate::cli::args::{OutputFormat, RepairArgs};
use crate::exit_codes::{worst, EXIT_LOAD_ERROR, EXIT_PARTIAL_REPAIR, EXIT_SUCCESS};
use amibag_core::repair::cleanup::rules_from_config;
use amibag_core::repair::{CleanupRule, RepairEngine, RepairReport};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum BagOutcome {
    Report(RepairReport),
    Error { bag: String, error: String },
}

pub fn run(args: RepairArgs) -> Result<i32> {
    if !args.has_action() {
        bail!(
            "nothing to do: pass --add-files, --delete-files, --delete-manifest-entries, --update-hashes or --message"
        );
    }
    let rules = if args.delete_files {
        let config = super::load(&args.config)?;
        rules_from_config(&config).context("invalid cleanup rule in config")?
    } else {
        Vec::new()
    };

    let mut outcomes = Vec::with_capacity(args.bags.len());
    for path in &args.bags {
        let outcome = match repair_bag(path, &args, &rules) {
            Ok(report) => BagOutcome::Report(report),
            Err(e) => {
                tracing::error!(bag = %path.display(), error = %format!("{e:#}"), "repair aborted");
                BagOutcome::Error {
                    bag: path.display().to_string(),
                    error: format!("{e:#}"),
                }
            }
        };
        outcomes.push(outcome);
    }

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcomes)?),
        OutputFormat::Text => print_text(&outcomes),
    }

    Ok(worst(outcomes.iter().map(|o| match o {
        BagOutcome::Report(r) if r.is_complete() => EXIT_SUCCESS,
        BagOutcome::Report(_) => EXIT_PARTIAL_REPAIR,
        BagOutcome::Error { .. } => EXIT_LOAD_ERROR,
    })))
}

fn repair_bag(path: &Path, args: &RepairArgs, rules: &[CleanupRule]) -> Result<RepairReport> {
    let mut engine = RepairEngine::open(path)?
        .with_dry_run(args.dry_run)
        .with_repairer(args.agent.clone());
    if let Some(message) = &args.message {
        engine.update_baginfo(message.clone());
    }

    let mut report = RepairReport::new(path.display().to_string(), args.dry_run);
    if args.delete_files {
        report.merge(engine.delete_payload_files_not_in_manifest(rules)?);
    }
    if args.delete_manifest_entries {
        report.merge(engine.delete_manifest_entries_not_in_payload()?);
    }
    if args.add_files {
        report.merge(engine.add_payload_files_not_in_manifest()?);
    }
    if let Some(pattern) = &args.update_hashes {
        report.merge(engine.update_hashes(Some(pattern.as_str()))?);
    }
    // A message on its own still needs a commit.
    if args.message.is_some() && report.steps.is_empty() {
        report.steps = engine.write_bag_updates();
    }
    Ok(report)
}

fn print_text(outcomes: &[BagOutcome]) {
    for outcome in outcomes {
        match outcome {
            BagOutcome::Report(report) => {
                let prefix = if report.dry_run { "(dry run) " } else { "" };
                eprintln!("{}{}", prefix, report.bag);
                for (label, files) in [
                    ("added", &report.added),
                    ("updated", &report.updated),
                    ("deleted", &report.deleted),
                    ("retained", &report.retained),
                    ("removed entry", &report.removed_entries),
                ] {
                    for file in files {
                        eprintln!("  {label}: {file}");
                    }
                }
                for failure in &report.failed {
                    eprintln!("  failed: {} ({})", failure.path, failure.error);
                }
                for step in &report.steps {
                    match &step.outcome {
                        Ok(status) => eprintln!("  {}: {:?}", step.step, status),
                        Err(e) => eprintln!("  {}: FAILED ({})", step.step, e),
                    }
                }
                if !report.changed_anything() && report.steps.is_empty() {
                    eprintln!("  nothing changed");
                }
            }
            BagOutcome::Error { bag, error } => eprintln!("{bag}: NOT REPAIRED ({error})"),
        }
    }
}
