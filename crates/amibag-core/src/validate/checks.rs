use super::{Finding, Severity, ValidateOptions};
use crate::amibag::AmiBag;
use crate::classify::{determine_type, BagType};
use crate::metadata::{compare_technical, JsonMetadataReader, MetadataReader, REQUIRED_JSON_FIELDS};
use crate::payload::{PayloadFile, Role};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

lazy_static! {
    /// Word characters, a dot and an extension; anything else is an illegal filename.
    static ref LEGAL_FILENAME_RE: Regex = Regex::new(r"^[\w\-]+(\.\w+)+$").unwrap();
}

pub const BASE_FIXITY: &str = "AMI-E001";
pub const FILENAME_PATTERN: &str = "AMI-W001";
pub const SIMPLE_FILENAME: &str = "AMI-E002";
pub const DIRECTORY_DEPTH: &str = "AMI-W002";
pub const ROLE_LOCATION: &str = "AMI-E003";
pub const ROLE_CORRESPONDENCE: &str = "AMI-E004";
pub const TYPE_DETERMINED: &str = "AMI-W003";
pub const SUBTYPE_DETERMINED: &str = "AMI-W004";
pub const DIRECTORY_STRUCTURE: &str = "AMI-E005";
pub const METADATA_CONCORDANCE: &str = "AMI-E006";
pub const METADATA_CONTENT: &str = "AMI-E007";
pub const METADATA_TECHNICAL: &str = "AMI-W005";

/// Check definition for the validation registry.
pub struct CheckDefinition {
    pub id: &'static str,
    pub default_severity: Severity,
    pub description: &'static str,
    /// Runs only when deep metadata validation is requested.
    pub metadata_only: bool,
    pub check: fn(&CheckContext<'_>) -> Vec<Finding>,
}

/// Context passed to checks.
pub struct CheckContext<'a> {
    pub bag: &'a AmiBag,
    pub options: &'a ValidateOptions<'a>,
}

/// Static check registry, in execution order.
pub static CHECKS: &[CheckDefinition] = &[
    CheckDefinition {
        id: BASE_FIXITY,
        default_severity: Severity::Error,
        description: "Bag is complete, Payload-Oxum matches and (slow mode) every digest matches",
        metadata_only: false,
        check: check_base_fixity,
    },
    CheckDefinition {
        id: FILENAME_PATTERN,
        default_severity: Severity::Warning,
        description: "Filenames are legal; files in role directories follow the naming grammar",
        metadata_only: false,
        check: check_filename_pattern,
    },
    CheckDefinition {
        id: SIMPLE_FILENAME,
        default_severity: Severity::Error,
        description: "Media filenames carry no composite/part code",
        metadata_only: false,
        check: check_simple_filenames,
    },
    CheckDefinition {
        id: DIRECTORY_DEPTH,
        default_severity: Severity::Warning,
        description: "Payload directories are at most one level below data/",
        metadata_only: false,
        check: check_directory_depth,
    },
    CheckDefinition {
        id: ROLE_LOCATION,
        default_severity: Severity::Error,
        description: "Media files live in the directory configured for their role",
        metadata_only: false,
        check: check_role_location,
    },
    CheckDefinition {
        id: ROLE_CORRESPONDENCE,
        default_severity: Severity::Error,
        description: "Every derivative role has the same base names as the preservation masters",
        metadata_only: false,
        check: check_role_correspondence,
    },
    CheckDefinition {
        id: TYPE_DETERMINED,
        default_severity: Severity::Warning,
        description: "Bag type can be determined",
        metadata_only: false,
        check: check_type_determined,
    },
    CheckDefinition {
        id: SUBTYPE_DETERMINED,
        default_severity: Severity::Warning,
        description: "Bag matches a subtype profile",
        metadata_only: false,
        check: check_subtype_determined,
    },
    CheckDefinition {
        id: DIRECTORY_STRUCTURE,
        default_severity: Severity::Error,
        description: "Payload directories are allowed for the bag type",
        metadata_only: false,
        check: check_directory_structure,
    },
    CheckDefinition {
        id: METADATA_CONCORDANCE,
        default_severity: Severity::Error,
        description: "Every media file has a JSON metadata file and vice versa",
        metadata_only: false,
        check: check_metadata_concordance,
    },
    CheckDefinition {
        id: METADATA_CONTENT,
        default_severity: Severity::Error,
        description: "Metadata records are readable, complete and reference payload media",
        metadata_only: true,
        check: check_metadata_content,
    },
    CheckDefinition {
        id: METADATA_TECHNICAL,
        default_severity: Severity::Warning,
        description: "Recorded technical metadata agrees with the media files",
        metadata_only: true,
        check: check_metadata_technical,
    },
];

/// Look up a check by id.
pub fn get_check(id: &str) -> Option<&'static CheckDefinition> {
    CHECKS.iter().find(|c| c.id == id)
}

fn check_base_fixity(ctx: &CheckContext<'_>) -> Vec<Finding> {
    match ctx.bag.bag().validate(ctx.options.fast) {
        Ok(()) => Vec::new(),
        Err(e) => e
            .details
            .into_iter()
            .map(|detail| Finding::new(BASE_FIXITY, Severity::Error, detail))
            .collect(),
    }
}

fn role_directories(bag: &AmiBag) -> BTreeSet<&str> {
    bag.config()
        .role_directories
        .values()
        .map(String::as_str)
        .collect()
}

fn check_filename_pattern(ctx: &CheckContext<'_>) -> Vec<Finding> {
    let role_dirs = role_directories(ctx.bag);
    let mut illegal = Vec::new();
    let mut ungrammatical = Vec::new();

    for file in &ctx.bag.index().files {
        if !LEGAL_FILENAME_RE.is_match(&file.filename) {
            illegal.push(file.path.clone());
        } else if role_dirs.contains(file.directory.as_str())
            && ctx.bag.config().is_media_ext(&file.extension)
            && !file.matches_grammar()
        {
            ungrammatical.push(file.path.clone());
        }
    }

    let mut findings = Vec::new();
    if !illegal.is_empty() {
        findings.push(Finding::with_paths(
            FILENAME_PATTERN,
            Severity::Warning,
            format!("Illegal characters in {} filename(s)", illegal.len()),
            illegal,
        ));
    }
    if !ungrammatical.is_empty() {
        findings.push(Finding::with_paths(
            FILENAME_PATTERN,
            Severity::Warning,
            format!(
                "{} media filename(s) do not follow <project>_<object-id>_<codes>_<role>.<ext>",
                ungrammatical.len()
            ),
            ungrammatical,
        ));
    }
    findings
}

fn check_simple_filenames(ctx: &CheckContext<'_>) -> Vec<Finding> {
    let codes = &ctx.bag.config().composite_codes;
    if codes.is_empty() {
        return Vec::new();
    }
    let media: BTreeSet<&str> = ctx.bag.media_filepaths().iter().map(String::as_str).collect();
    let composite: Vec<String> = ctx
        .bag
        .index()
        .files
        .iter()
        .filter(|f| media.contains(f.path.as_str()) && f.is_composite(codes))
        .map(|f| f.path.clone())
        .collect();

    if composite.is_empty() {
        return Vec::new();
    }
    vec![Finding::with_paths(
        SIMPLE_FILENAME,
        Severity::Error,
        format!(
            "Media filenames carry a composite/part code ({}); composite objects are not supported",
            codes.join(", ")
        ),
        composite,
    )]
}

fn check_directory_depth(ctx: &CheckContext<'_>) -> Vec<Finding> {
    let nested: Vec<String> = ctx
        .bag
        .index()
        .dirs
        .iter()
        .filter(|dir| dir.contains('/'))
        .cloned()
        .collect();
    if nested.is_empty() {
        return Vec::new();
    }
    vec![Finding::with_paths(
        DIRECTORY_DEPTH,
        Severity::Warning,
        "Too many levels of directories in data/",
        nested.iter().map(|d| format!("data/{}", d)).collect(),
    )]
}

fn check_role_location(ctx: &CheckContext<'_>) -> Vec<Finding> {
    let config = ctx.bag.config();
    let mut findings = Vec::new();
    for role in Role::ALL {
        let Some(expected) = config.directory_for(role) else {
            continue;
        };
        // Sidecars carry role codes too.
        let misplaced: Vec<String> = ctx
            .bag
            .index()
            .files
            .iter()
            .filter(|f| f.role == Some(role) && f.directory != expected)
            .map(|f| f.path.clone())
            .collect();
        if !misplaced.is_empty() {
            findings.push(Finding::with_paths(
                ROLE_LOCATION,
                Severity::Error,
                format!("{} files must be in data/{}", role, expected),
                misplaced,
            ));
        }
    }
    findings
}

fn check_role_correspondence(ctx: &CheckContext<'_>) -> Vec<Finding> {
    let index = ctx.bag.index();
    let pm = index.base_names(Role::Pm);
    let mut findings = Vec::new();

    for role in [Role::Mz, Role::Em, Role::Sc] {
        let derived = index.base_names(role);
        if derived.is_empty() || derived == pm {
            continue;
        }
        let missing: Vec<&str> = pm.difference(&derived).map(String::as_str).collect();
        let extra: Vec<&str> = derived.difference(&pm).map(String::as_str).collect();
        let mut message = format!("{} and pm files do not correspond", role);
        if !missing.is_empty() {
            message.push_str(&format!("; no {} for: {}", role, missing.join(", ")));
        }
        if !extra.is_empty() {
            message.push_str(&format!("; no pm for: {}", extra.join(", ")));
        }
        let paths = index
            .media_for(role)
            .filter(|f| !pm.contains(&f.base_name))
            .map(|f| f.path.clone())
            .collect();
        findings.push(Finding::with_paths(
            ROLE_CORRESPONDENCE,
            Severity::Error,
            message,
            paths,
        ));
    }
    findings
}

fn check_type_determined(ctx: &CheckContext<'_>) -> Vec<Finding> {
    let index = ctx.bag.index();
    match determine_type(&index.dirs, &index.exts) {
        Some(_) => Vec::new(),
        None => vec![Finding::new(
            TYPE_DETERMINED,
            Severity::Warning,
            "Bag is not an Excel bag or JSON bag",
        )],
    }
}

fn check_subtype_determined(ctx: &CheckContext<'_>) -> Vec<Finding> {
    if !ctx.bag.classification().is_unknown() {
        return Vec::new();
    }
    let index = ctx.bag.index();
    vec![Finding::new(
        SUBTYPE_DETERMINED,
        Severity::Warning,
        format!(
            "Bag does not match an existing profile for {} bags. Extensions found: {:?}. Directories found: {:?}",
            ctx.bag.bag_type(),
            index.exts,
            index.dirs
        ),
    )]
}

fn check_directory_structure(ctx: &CheckContext<'_>) -> Vec<Finding> {
    let bag_type = ctx.bag.bag_type();
    let allowed = ctx.bag.config().profiles.allowed_dirs(bag_type);
    let unexpected: Vec<String> = ctx
        .bag
        .index()
        .dirs
        .iter()
        .filter(|dir| !allowed.contains(*dir))
        .map(|dir| format!("data/{}", dir))
        .collect();
    if unexpected.is_empty() {
        return Vec::new();
    }
    let severity = match bag_type {
        BagType::ExcelJson => Severity::Warning,
        BagType::Excel | BagType::Json => Severity::Error,
    };
    vec![Finding::with_paths(
        DIRECTORY_STRUCTURE,
        severity,
        format!(
            "{} bags may only have the following directories: {}",
            bag_type,
            allowed.iter().cloned().collect::<Vec<_>>().join(", ")
        ),
        unexpected,
    )]
}

fn json_files<'a>(bag: &'a AmiBag) -> impl Iterator<Item = &'a PayloadFile> {
    bag.index()
        .files
        .iter()
        .filter(move |f| bag.config().json_extensions.contains(&f.extension))
}

fn media_files<'a>(bag: &'a AmiBag) -> impl Iterator<Item = &'a PayloadFile> {
    bag.index()
        .files
        .iter()
        .filter(move |f| bag.config().is_media_ext(&f.extension))
}

fn check_metadata_concordance(ctx: &CheckContext<'_>) -> Vec<Finding> {
    if !ctx.bag.bag_type().has_json() {
        return Vec::new();
    }
    let json: BTreeSet<&str> = json_files(ctx.bag).map(|f| f.stem.as_str()).collect();
    let media: BTreeSet<&str> = media_files(ctx.bag).map(|f| f.stem.as_str()).collect();

    let mut findings = Vec::new();
    let without_json: Vec<String> = media_files(ctx.bag)
        .filter(|f| !json.contains(f.stem.as_str()))
        .map(|f| f.path.clone())
        .collect();
    if !without_json.is_empty() {
        findings.push(Finding::with_paths(
            METADATA_CONCORDANCE,
            Severity::Error,
            "Media files without JSON metadata",
            without_json,
        ));
    }
    let without_media: Vec<String> = json_files(ctx.bag)
        .filter(|f| !media.contains(f.stem.as_str()))
        .map(|f| f.path.clone())
        .collect();
    if !without_media.is_empty() {
        findings.push(Finding::with_paths(
            METADATA_CONCORDANCE,
            Severity::Error,
            "JSON metadata files without a media file",
            without_media,
        ));
    }
    findings
}

fn media_filenames(bag: &AmiBag) -> BTreeSet<&str> {
    media_files(bag).map(|f| f.filename.as_str()).collect()
}

fn check_metadata_content(ctx: &CheckContext<'_>) -> Vec<Finding> {
    let bag = ctx.bag;
    let root = bag.root();
    let media = media_filenames(bag);
    let mut findings = Vec::new();

    let spreadsheets: Vec<&str> = bag.spreadsheet_filepaths().collect();
    if !spreadsheets.is_empty() {
        match ctx.options.spreadsheet_reader {
            None => tracing::warn!(
                bag = %root.display(),
                spreadsheets = spreadsheets.len(),
                "no spreadsheet reader configured; spreadsheet metadata not checked"
            ),
            Some(reader) => {
                for path in spreadsheets {
                    findings.extend(check_records(reader, root, path, &media, &[]));
                }
            }
        }
    }

    if bag.bag_type().has_json() {
        let reader = JsonMetadataReader;
        for file in json_files(bag) {
            findings.extend(check_records(&reader, root, &file.path, &media, REQUIRED_JSON_FIELDS));
        }
    }
    findings
}

fn check_records(
    reader: &dyn MetadataReader,
    root: &std::path::Path,
    path: &str,
    media: &BTreeSet<&str>,
    required: &[&str],
) -> Vec<Finding> {
    let records = match reader.read_records(&root.join(path)) {
        Ok(records) => records,
        Err(e) => {
            return vec![Finding::with_paths(
                METADATA_CONTENT,
                Severity::Error,
                format!("Metadata file is unreadable: {}", e),
                vec![path.to_string()],
            )]
        }
    };

    let mut findings = Vec::new();
    for record in records {
        let missing = record.missing_fields(required);
        if !missing.is_empty() {
            findings.push(Finding::with_paths(
                METADATA_CONTENT,
                Severity::Error,
                format!("Metadata record is missing fields: {}", missing.join(", ")),
                vec![path.to_string()],
            ));
        }
        match record.reference_filename.as_deref() {
            Some(reference) if !media.contains(reference) => findings.push(Finding::with_paths(
                METADATA_CONTENT,
                Severity::Error,
                format!("Metadata references {} which is not a payload media file", reference),
                vec![path.to_string()],
            )),
            Some(reference) => {
                if let Some(technical) = record.technical_filename() {
                    if technical != reference {
                        findings.push(Finding::with_paths(
                            METADATA_CONTENT,
                            Severity::Error,
                            format!(
                                "Technical filename {} does not match reference filename {}",
                                technical, reference
                            ),
                            vec![path.to_string()],
                        ));
                    }
                }
            }
            None if required.is_empty() => findings.push(Finding::with_paths(
                METADATA_CONTENT,
                Severity::Error,
                "Metadata record does not reference a media file",
                vec![path.to_string()],
            )),
            // Reported as a missing required field above.
            None => {}
        }
    }
    findings
}

fn check_metadata_technical(ctx: &CheckContext<'_>) -> Vec<Finding> {
    let bag = ctx.bag;
    if !bag.bag_type().has_json() {
        return Vec::new();
    }
    let Some(inspector) = ctx.options.inspector else {
        tracing::warn!(
            bag = %bag.root().display(),
            "no media inspector configured; technical metadata not compared"
        );
        return Vec::new();
    };

    let reader = JsonMetadataReader;
    let media = media_filenames(bag);
    let mut findings = Vec::new();

    for file in json_files(bag) {
        // Unreadable files are reported by the content check.
        let Ok(records) = reader.read_records(&bag.root().join(&file.path)) else {
            continue;
        };
        for record in records {
            let Some(reference) = record.reference_filename.as_deref() else {
                continue;
            };
            if !media.contains(reference) {
                continue;
            }
            let media_path = if file.directory.is_empty() {
                format!("data/{}", reference)
            } else {
                format!("data/{}/{}", file.directory, reference)
            };
            match inspector.inspect(&bag.root().join(&media_path)) {
                Ok(info) => {
                    for mismatch in compare_technical(&record, &info) {
                        findings.push(Finding::with_paths(
                            METADATA_TECHNICAL,
                            Severity::Warning,
                            format!(
                                "{} is {} in metadata but {} in the media file",
                                mismatch.field, mismatch.recorded, mismatch.inspected
                            ),
                            vec![file.path.clone(), media_path.clone()],
                        ));
                    }
                }
                Err(e) => findings.push(Finding::with_paths(
                    METADATA_TECHNICAL,
                    Severity::Warning,
                    format!("Could not inspect media file: {}", e),
                    vec![media_path.clone()],
                )),
            }
        }
    }
    findings
}
