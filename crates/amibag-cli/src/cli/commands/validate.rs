use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::exit_codes::{worst, EXIT_INVALID, EXIT_LOAD_ERROR, EXIT_SUCCESS};
use amibag_core::{AmiBag, MediaInspector, MediainfoCli, ValidateOptions, ValidationReport};
use anyhow::{bail, Result};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum BagOutcome {
    Report(ValidationReport),
    LoadError { bag: String, error: String },
}

pub fn run(args: ValidateArgs) -> Result<i32> {
    let bags = super::collect_bags(&args.bags, &args.directory)?;
    if bags.is_empty() {
        bail!("no bags to validate: pass bag paths or --directory");
    }
    let config = super::load(&args.config)?;

    let mediainfo = MediainfoCli::default();
    let inspector: Option<&dyn MediaInspector> = if args.metadata && mediainfo.is_available() {
        Some(&mediainfo)
    } else {
        if args.metadata {
            tracing::warn!("mediainfo not found; technical metadata will not be compared");
        }
        None
    };
    let options = ValidateOptions {
        fast: !args.slow,
        metadata: args.metadata,
        spreadsheet_reader: None,
        inspector,
    };

    let mut outcomes = Vec::with_capacity(bags.len());
    for path in &bags {
        tracing::info!(bag = %path.display(), "validating");
        match AmiBag::open(path, &config) {
            Ok(ami) => outcomes.push(BagOutcome::Report(ami.validate(&options))),
            Err(e) => {
                tracing::error!(bag = %path.display(), error = %e, "unable to load bag");
                outcomes.push(BagOutcome::LoadError {
                    bag: path.display().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcomes)?),
        OutputFormat::Text => print_text(&outcomes),
    }

    Ok(worst(outcomes.iter().map(exit_code)))
}

fn exit_code(outcome: &BagOutcome) -> i32 {
    match outcome {
        BagOutcome::Report(r) if r.is_valid() => EXIT_SUCCESS,
        BagOutcome::Report(_) => EXIT_INVALID,
        BagOutcome::LoadError { .. } => EXIT_LOAD_ERROR,
    }
}

fn print_text(outcomes: &[BagOutcome]) {
    let mut invalid = Vec::new();
    for outcome in outcomes {
        match outcome {
            BagOutcome::Report(report) => {
                let verdict = if report.is_valid() { "VALID" } else { "INVALID" };
                eprintln!(
                    "{}: {} ({} {})",
                    report.bag, verdict, report.bag_type, report.subtype
                );
                for f in &report.findings {
                    eprintln!("  [{}] {} {}", f.severity, f.check_id, f.message);
                }
                if !report.is_valid() {
                    invalid.push(report.bag.as_str());
                }
            }
            BagOutcome::LoadError { bag, error } => {
                eprintln!("{bag}: NOT LOADED ({error})");
                invalid.push(bag.as_str());
            }
        }
    }

    eprintln!();
    eprintln!(
        "Summary: {} bag(s), {} valid, {} not valid",
        outcomes.len(),
        outcomes.len() - invalid.len(),
        invalid.len()
    );
    for bag in invalid {
        eprintln!("  {bag}");
    }
}
