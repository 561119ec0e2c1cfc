//! Validation pipeline: runs every registered check against a loaded
//! [`AmiBag`] and collects findings. Nothing here writes to the bag.

pub mod checks;

use crate::amibag::AmiBag;
use crate::metadata::{MediaInspector, MetadataReader};
use checks::{CheckContext, CHECKS};
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Finding {
    pub check_id: String,
    pub severity: Severity,
    pub message: String,
    /// Offending bag-relative paths, if any.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
    pub fingerprint: String,
}

impl Finding {
    pub fn new(check_id: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self::with_paths(check_id, severity, message, Vec::new())
    }

    pub fn with_paths(
        check_id: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        paths: Vec<String>,
    ) -> Self {
        let check_id = check_id.into();
        let message = message.into();

        // Stable across runs: sha256(check_id + paths or message)
        let location_key = if paths.is_empty() {
            message.clone()
        } else {
            paths.join("\n")
        };
        let fingerprint = format!(
            "sha256:{}",
            hex::encode(Sha256::digest(format!("{}:{}", check_id, location_key).as_bytes()))
        );

        Self {
            check_id,
            severity,
            message,
            paths,
            fingerprint,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ValidationSummary {
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub bag: String,
    pub bag_type: String,
    pub subtype: String,
    pub findings: Vec<Finding>,
    pub summary: ValidationSummary,
}

impl ValidationReport {
    pub fn has_error(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Error)
    }

    pub fn has_warning(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Warning)
    }

    /// Neither a warning nor an error was found.
    pub fn is_valid(&self) -> bool {
        !self.has_error() && !self.has_warning()
    }

    pub fn findings_for<'a>(&'a self, check_id: &'a str) -> impl Iterator<Item = &'a Finding> {
        self.findings.iter().filter(move |f| f.check_id == check_id)
    }
}

/// Options for one validation run.
#[derive(Clone, Copy, Default)]
pub struct ValidateOptions<'a> {
    /// Skip digest recomputation in the base check.
    pub fast: bool,
    /// Run the deep metadata checks.
    pub metadata: bool,
    /// Reader for spreadsheet metadata; spreadsheets are reported unchecked without one.
    pub spreadsheet_reader: Option<&'a dyn MetadataReader>,
    /// Inspector for technical values; comparisons are skipped without one.
    pub inspector: Option<&'a dyn MediaInspector>,
}

impl<'a> ValidateOptions<'a> {
    pub fn fast() -> Self {
        Self {
            fast: true,
            ..Default::default()
        }
    }
}

/// Run every check. Checks never short-circuit each other.
pub fn run_checks(bag: &AmiBag, options: &ValidateOptions<'_>) -> ValidationReport {
    let ctx = CheckContext { bag, options };
    let mut findings = Vec::new();

    for check in CHECKS {
        if check.metadata_only && !options.metadata {
            continue;
        }
        let found = (check.check)(&ctx);
        tracing::debug!(
            check = check.id,
            severity = %check.default_severity,
            description = check.description,
            findings = found.len(),
            "ran check"
        );
        findings.extend(found);
    }

    for finding in &findings {
        match finding.severity {
            Severity::Error => tracing::error!(
                bag = %bag.root().display(),
                check = %finding.check_id,
                "{}",
                finding.message
            ),
            Severity::Warning => tracing::warn!(
                bag = %bag.root().display(),
                check = %finding.check_id,
                "{}",
                finding.message
            ),
        }
    }

    let errors = findings.iter().filter(|f| f.is_error()).count();
    let summary = ValidationSummary {
        total: findings.len(),
        errors,
        warnings: findings.len() - errors,
    };

    ValidationReport {
        bag: bag.root().display().to_string(),
        bag_type: bag.bag_type().to_string(),
        subtype: bag.subtype().to_string(),
        findings,
        summary,
    }
}

impl AmiBag {
    pub fn validate(&self, options: &ValidateOptions<'_>) -> ValidationReport {
        run_checks(self, options)
    }

    /// `true` iff no check reported a warning or an error.
    pub fn validate_amibag(&self, options: &ValidateOptions<'_>) -> bool {
        let report = self.validate(options);
        if report.is_valid() {
            tracing::info!(bag = %self.root().display(), "valid AMI bag");
        }
        report.is_valid()
    }
}
