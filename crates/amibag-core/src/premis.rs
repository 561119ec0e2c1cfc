//! Append-only PREMIS provenance log stored beside the bag as
//! `premis-events.json`.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const PREMIS_EVENTS_JSON: &str = "premis-events.json";

/// Event types the repair engine records.
pub mod event_type {
    pub const MESSAGE_DIGEST_CALCULATION: &str = "message digest calculation";
    pub const DELETION: &str = "deletion";
    pub const METADATA_MODIFICATION: &str = "metadata modification";
}

pub const OUTCOME_PASS: &str = "Pass";
pub const OUTCOME_FAIL: &str = "Fail";

#[derive(Debug, Error)]
pub enum PremisError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One provenance record. Never edited once written.
///
/// Fields are plain strings so events written by other tools load whatever
/// their timestamp format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceEvent {
    #[serde(rename = "Event-Date-Time", default)]
    pub date_time: String,
    #[serde(rename = "Event-Type", default)]
    pub event_type: String,
    #[serde(rename = "Event-Detail-Information", default)]
    pub detail: String,
    #[serde(rename = "Event-Outcome", default)]
    pub outcome: String,
    #[serde(rename = "Event-Software-Agent", default)]
    pub software_agent: String,
    #[serde(rename = "Event-Human-Agent", default, skip_serializing_if = "Option::is_none")]
    pub human_agent: Option<String>,
}

impl ProvenanceEvent {
    pub fn new(
        event_type: impl Into<String>,
        detail: impl Into<String>,
        outcome: impl Into<String>,
        software_agent: impl Into<String>,
    ) -> Self {
        Self {
            date_time: Utc::now().to_rfc3339_opts(SecondsFormat::AutoSi, true),
            event_type: event_type.into(),
            detail: detail.into(),
            outcome: outcome.into(),
            software_agent: software_agent.into(),
            human_agent: None,
        }
    }

    pub fn with_human_agent(mut self, agent: Option<String>) -> Self {
        self.human_agent = agent;
        self
    }
}

/// Events loaded from disk plus everything appended since.
///
/// Records already on disk are kept as the JSON they were read as and written
/// back unchanged; only pending events are serialized from their typed form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PremisLog {
    recorded: Vec<Value>,
    events: Vec<ProvenanceEvent>,
}

impl PremisLog {
    /// Load `premis-events.json` from the bag root; a missing file is an empty log.
    pub fn load(root: &Path) -> Result<Self, PremisError> {
        let path = root.join(PREMIS_EVENTS_JSON);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(PremisError::Read { path, source }),
        };
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let recorded: Vec<Value> =
            serde_json::from_str(&content).map_err(|source| PremisError::Parse { path, source })?;
        let events = recorded
            .iter()
            .map(|raw| ProvenanceEvent::deserialize(raw).unwrap_or_default())
            .collect();
        Ok(Self { recorded, events })
    }

    pub fn append(&mut self, event: ProvenanceEvent) {
        tracing::debug!(
            event_type = %event.event_type,
            outcome = %event.outcome,
            "recorded provenance event"
        );
        self.events.push(event);
    }

    pub fn events(&self) -> &[ProvenanceEvent] {
        &self.events
    }

    /// Events appended since the log was loaded or last saved.
    pub fn pending(&self) -> &[ProvenanceEvent] {
        &self.events[self.recorded.len()..]
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Write the whole log as a pretty-printed JSON array.
    pub fn save(&mut self, root: &Path) -> Result<PathBuf, PremisError> {
        let path = root.join(PREMIS_EVENTS_JSON);
        let parse_err = |source| PremisError::Parse {
            path: path.clone(),
            source,
        };
        let mut all = self.recorded.clone();
        for event in self.pending() {
            all.push(serde_json::to_value(event).map_err(parse_err)?);
        }
        let mut json = serde_json::to_string_pretty(&all).map_err(parse_err)?;
        json.push('\n');
        std::fs::write(&path, json).map_err(|source| PremisError::Write {
            path: path.clone(),
            source,
        })?;
        self.recorded = all;
        Ok(path)
    }
}
