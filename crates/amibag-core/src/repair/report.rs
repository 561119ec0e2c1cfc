use serde::Serialize;

/// Steps of the commit sequence, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepairStep {
    BagInfo,
    Manifests,
    Provenance,
    TagManifests,
}

impl std::fmt::Display for RepairStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepairStep::BagInfo => write!(f, "bag-info"),
            RepairStep::Manifests => write!(f, "manifests"),
            RepairStep::Provenance => write!(f, "provenance"),
            RepairStep::TagManifests => write!(f, "tag-manifests"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Written,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: RepairStep,
    pub outcome: Result<StepStatus, String>,
}

impl StepReport {
    pub fn ok(step: RepairStep, status: StepStatus) -> Self {
        Self {
            step,
            outcome: Ok(status),
        }
    }

    pub fn failed(step: RepairStep, message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(step = %step, error = %message, "repair step failed");
        Self {
            step,
            outcome: Err(message),
        }
    }
}

/// A payload file a repair could not process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: String,
    pub error: String,
}

/// What one repair entry point did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub bag: String,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub updated: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deleted: Vec<String>,
    /// Untracked files no cleanup rule captured.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub retained: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removed_entries: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<FileFailure>,
    pub events_recorded: usize,
    /// Empty when nothing was committed.
    pub steps: Vec<StepReport>,
}

impl RepairReport {
    pub fn new(bag: impl Into<String>, dry_run: bool) -> Self {
        Self {
            bag: bag.into(),
            dry_run,
            ..Default::default()
        }
    }

    /// Every file was processed and every commit step succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.steps.iter().all(|s| s.outcome.is_ok())
    }

    pub fn changed_anything(&self) -> bool {
        !(self.added.is_empty()
            && self.updated.is_empty()
            && self.deleted.is_empty()
            && self.removed_entries.is_empty())
    }

    pub fn step(&self, step: RepairStep) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.step == step)
    }

    /// Fold another report on the same bag into this one.
    pub fn merge(&mut self, other: RepairReport) {
        self.added.extend(other.added);
        self.updated.extend(other.updated);
        self.deleted.extend(other.deleted);
        self.retained.extend(other.retained);
        self.removed_entries.extend(other.removed_entries);
        self.failed.extend(other.failed);
        self.events_recorded += other.events_recorded;
        self.steps.extend(other.steps);
    }
}
