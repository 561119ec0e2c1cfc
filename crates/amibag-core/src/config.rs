//! Engine configuration: profile tables, role directories, media extensions
//! and cleanup rules.
//!
//! Configuration is data, loaded from YAML. A reference is resolved as a file
//! path first, then as the name of a built-in configuration, so rule sets can
//! be swapped without rebuilding.

use crate::classify::BagType;
use crate::payload::Role;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Built-in configurations embedded at compile time.
///
/// Format: (name, yaml_content)
pub static BUILTIN_CONFIGS: &[(&str, &str)] = &[("default", include_str!("../profiles/default.yaml"))];

/// Name of the configuration used when none is given.
pub const DEFAULT_CONFIG: &str = "default";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration '{reference}' not found (built-in: {available})")]
    NotFound {
        reference: String,
        available: String,
    },

    #[error("failed to read configuration file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse configuration YAML: {message}")]
    Parse { message: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

/// One classification profile: the directories and extensions a bag of this
/// subtype may contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    pub name: String,
    pub dirs: BTreeSet<String>,
    pub exts: BTreeSet<String>,
}

impl Profile {
    /// Subset semantics: the bag may omit anything the profile allows.
    pub fn matches(&self, dirs: &BTreeSet<String>, exts: &BTreeSet<String>) -> bool {
        dirs.is_subset(&self.dirs) && exts.is_subset(&self.exts)
    }
}

/// Ordered profile lists keyed by bag type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileTables {
    #[serde(default)]
    pub excel: Vec<Profile>,
    #[serde(default)]
    pub json: Vec<Profile>,
    #[serde(rename = "excel-json", default)]
    pub excel_json: Vec<Profile>,
}

impl ProfileTables {
    pub fn for_type(&self, bag_type: BagType) -> &[Profile] {
        match bag_type {
            BagType::Excel => &self.excel,
            BagType::Json => &self.json,
            BagType::ExcelJson => &self.excel_json,
        }
    }

    /// Union of every directory the profiles of `bag_type` allow.
    pub fn allowed_dirs(&self, bag_type: BagType) -> BTreeSet<String> {
        self.for_type(bag_type)
            .iter()
            .flat_map(|p| p.dirs.iter().cloned())
            .collect()
    }
}

/// Cleanup rule as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CleanupRuleDef {
    pub name: String,
    pub regex: String,
    #[serde(rename = "match")]
    pub matches: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AmiConfig {
    pub name: String,
    pub version: u32,
    pub media_extensions: BTreeSet<String>,
    #[serde(default = "default_json_exts")]
    pub json_extensions: BTreeSet<String>,
    #[serde(default = "default_spreadsheet_exts")]
    pub spreadsheet_extensions: BTreeSet<String>,
    pub role_directories: BTreeMap<Role, String>,
    #[serde(default)]
    pub composite_codes: Vec<String>,
    pub profiles: ProfileTables,
    #[serde(default)]
    pub cleanup_rules: Vec<CleanupRuleDef>,
}

fn default_json_exts() -> BTreeSet<String> {
    [".json".to_string()].into_iter().collect()
}

fn default_spreadsheet_exts() -> BTreeSet<String> {
    [".xlsx".to_string()].into_iter().collect()
}

fn normalize_ext(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

fn normalize_exts(exts: &BTreeSet<String>) -> BTreeSet<String> {
    exts.iter().map(|e| normalize_ext(e)).collect()
}

impl AmiConfig {
    /// Normalize extensions and reject configurations the engine cannot use.
    fn validate(mut self) -> Result<Self, ConfigError> {
        if self.media_extensions.is_empty() {
            return Err(ConfigError::Invalid {
                message: "media_extensions must not be empty".into(),
            });
        }
        self.media_extensions = normalize_exts(&self.media_extensions);
        self.json_extensions = normalize_exts(&self.json_extensions);
        self.spreadsheet_extensions = normalize_exts(&self.spreadsheet_extensions);

        if !self.role_directories.contains_key(&Role::Pm) {
            return Err(ConfigError::Invalid {
                message: "role_directories must map the 'pm' role".into(),
            });
        }

        for code in &self.composite_codes {
            if code.len() != 1 || !"vfrspt".contains(code.as_str()) {
                return Err(ConfigError::Invalid {
                    message: format!(
                        "composite code '{}' is not one of v, f, r, s, p, t",
                        code
                    ),
                });
            }
        }

        for bag_type in BagType::ALL {
            let profiles = match bag_type {
                BagType::Excel => &mut self.profiles.excel,
                BagType::Json => &mut self.profiles.json,
                BagType::ExcelJson => &mut self.profiles.excel_json,
            };
            let mut names = BTreeSet::new();
            for profile in profiles.iter_mut() {
                if !names.insert(profile.name.clone()) {
                    return Err(ConfigError::Invalid {
                        message: format!(
                            "duplicate {} profile '{}'",
                            bag_type, profile.name
                        ),
                    });
                }
                profile.exts = normalize_exts(&profile.exts);
            }
        }

        for rule in &self.cleanup_rules {
            Regex::new(&rule.regex).map_err(|e| ConfigError::Invalid {
                message: format!("cleanup rule '{}': {}", rule.name, e),
            })?;
        }

        Ok(self)
    }

    pub fn is_media_ext(&self, ext: &str) -> bool {
        self.media_extensions.contains(ext)
    }

    pub fn directory_for(&self, role: Role) -> Option<&str> {
        self.role_directories.get(&role).map(String::as_str)
    }
}

/// Load configuration from a file path or a built-in name.
pub fn load_config(reference: &str) -> Result<AmiConfig, ConfigError> {
    let path = Path::new(reference);
    if path.is_file() {
        return load_config_from_file(path);
    }
    if let Some(content) = builtin_config(reference) {
        return load_config_from_str(content);
    }
    Err(ConfigError::NotFound {
        reference: reference.to_string(),
        available: BUILTIN_CONFIGS
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", "),
    })
}

/// The embedded `default` configuration.
pub fn default_config() -> Result<AmiConfig, ConfigError> {
    load_config_from_str(builtin_config(DEFAULT_CONFIG).unwrap_or_default())
}

fn builtin_config(name: &str) -> Option<&'static str> {
    BUILTIN_CONFIGS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, content)| *content)
}

pub fn load_config_from_file(path: &Path) -> Result<AmiConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<AmiConfig, ConfigError> {
    let config: AmiConfig = serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
        message: e.to_string(),
    })?;
    config.validate()
}
