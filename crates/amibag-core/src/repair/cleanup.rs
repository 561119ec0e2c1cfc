//! Rules deciding which untracked payload files may be deleted.

use crate::config::{AmiConfig, CleanupRuleDef};
use regex::Regex;

#[derive(Debug, Clone)]
pub struct CleanupRule {
    pub name: String,
    pub regex: Regex,
    /// Expected outcome of the regex search; a file is deleted when the
    /// actual outcome differs.
    pub matches: bool,
}

impl CleanupRule {
    pub fn new(name: impl Into<String>, pattern: &str, matches: bool) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            regex: Regex::new(pattern)?,
            matches,
        })
    }

    pub fn from_def(def: &CleanupRuleDef) -> Result<Self, regex::Error> {
        Self::new(def.name.clone(), &def.regex, def.matches)
    }

    pub fn selects(&self, path: &str) -> bool {
        self.regex.is_match(path) != self.matches
    }
}

/// Rules from configuration. Patterns were checked when the config loaded.
pub fn rules_from_config(config: &AmiConfig) -> Result<Vec<CleanupRule>, regex::Error> {
    config.cleanup_rules.iter().map(CleanupRule::from_def).collect()
}

/// Split untracked files into `(delete, keep)`. With no rules every file is deleted.
pub fn partition(files: &[String], rules: &[CleanupRule]) -> (Vec<String>, Vec<String>) {
    if rules.is_empty() {
        return (files.to_vec(), Vec::new());
    }
    files
        .iter()
        .cloned()
        .partition(|path| rules.iter().any(|rule| rule.selects(path)))
}
