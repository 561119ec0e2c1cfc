//! Bag classification: metadata type from the directory/extension signature,
//! subtype by ordered profile matching.

use crate::config::{AmiConfig, ProfileTables};
use crate::payload::{PayloadFile, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Subtype assigned when no profile matches.
pub const UNKNOWN_SUBTYPE: &str = "unknown";

const METADATA_DIR: &str = "Metadata";
const PRESERVATION_MASTERS_DIR: &str = "PreservationMasters";
const JSON_EXT: &str = ".json";

/// How a bag carries its descriptive metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BagType {
    #[serde(rename = "excel")]
    Excel,
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "excel-json")]
    ExcelJson,
}

impl BagType {
    pub const ALL: [BagType; 3] = [BagType::Excel, BagType::Json, BagType::ExcelJson];

    pub fn as_str(&self) -> &'static str {
        match self {
            BagType::Excel => "excel",
            BagType::Json => "json",
            BagType::ExcelJson => "excel-json",
        }
    }

    /// Bags whose metadata includes per-media JSON files.
    pub fn has_json(&self) -> bool {
        matches!(self, BagType::Json | BagType::ExcelJson)
    }
}

impl std::fmt::Display for BagType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("unable to determine bag type: no Metadata directory and no .json files")]
    NoType,

    #[error("bag does not have a PreservationMasters directory")]
    MissingPreservationMasters,

    #[error("bag does not contain any media files")]
    NoMediaFiles,

    #[error("bag does not contain a preservation master media file")]
    NoPreservationMaster,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub bag_type: BagType,
    pub subtype: String,
}

impl Classification {
    pub fn is_unknown(&self) -> bool {
        self.subtype == UNKNOWN_SUBTYPE
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.bag_type, self.subtype)
    }
}

/// Media paths grouped by filename role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleFiles {
    pub pm_filepaths: Vec<String>,
    pub em_filepaths: Vec<String>,
    pub sc_filepaths: Vec<String>,
    pub mz_filepaths: Vec<String>,
    pub ao_filepaths: Vec<String>,
}

impl RoleFiles {
    pub fn get(&self, role: Role) -> &[String] {
        match role {
            Role::Pm => &self.pm_filepaths,
            Role::Em => &self.em_filepaths,
            Role::Sc => &self.sc_filepaths,
            Role::Mz => &self.mz_filepaths,
            Role::Ao => &self.ao_filepaths,
        }
    }

    fn push(&mut self, role: Role, path: String) {
        match role {
            Role::Pm => self.pm_filepaths.push(path),
            Role::Em => self.em_filepaths.push(path),
            Role::Sc => self.sc_filepaths.push(path),
            Role::Mz => self.mz_filepaths.push(path),
            Role::Ao => self.ao_filepaths.push(path),
        }
    }
}

/// Everything the classifier derives from the declared payload paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadIndex {
    /// Parent directories relative to `data/`.
    pub dirs: BTreeSet<String>,
    /// Lowercase extensions, with dot.
    pub exts: BTreeSet<String>,
    pub files: Vec<PayloadFile>,
    pub media_filepaths: Vec<String>,
    pub metadata_filepaths: Vec<String>,
    pub roles: RoleFiles,
}

impl PayloadIndex {
    pub fn build<'a>(paths: impl IntoIterator<Item = &'a str>, config: &AmiConfig) -> Self {
        let mut index = PayloadIndex {
            dirs: BTreeSet::new(),
            exts: BTreeSet::new(),
            files: Vec::new(),
            media_filepaths: Vec::new(),
            metadata_filepaths: Vec::new(),
            roles: RoleFiles::default(),
        };

        for path in paths {
            let file = PayloadFile::parse(path);
            index.dirs.insert(file.directory.clone());
            index.exts.insert(file.extension.clone());

            if config.is_media_ext(&file.extension) {
                index.media_filepaths.push(file.path.clone());
                if let Some(role) = file.role {
                    index.roles.push(role, file.path.clone());
                }
            } else if config.json_extensions.contains(&file.extension)
                || config.spreadsheet_extensions.contains(&file.extension)
            {
                index.metadata_filepaths.push(file.path.clone());
            }
            index.files.push(file);
        }
        index
    }

    /// Media files of one role.
    pub fn media_for(&self, role: Role) -> impl Iterator<Item = &PayloadFile> {
        let paths: BTreeSet<&str> = self.roles.get(role).iter().map(String::as_str).collect();
        self.files
            .iter()
            .filter(move |f| paths.contains(f.path.as_str()))
    }

    pub fn base_names(&self, role: Role) -> BTreeSet<String> {
        self.media_for(role).map(|f| f.base_name.clone()).collect()
    }
}

/// Type from the directory and extension sets alone.
pub fn determine_type(dirs: &BTreeSet<String>, exts: &BTreeSet<String>) -> Option<BagType> {
    let mut bag_type = dirs.contains(METADATA_DIR).then_some(BagType::Excel);
    if exts.contains(JSON_EXT) {
        bag_type = match bag_type {
            Some(BagType::Excel) => Some(BagType::ExcelJson),
            _ => Some(BagType::Json),
        };
    }
    bag_type
}

/// Name of the last profile of `bag_type` that admits the signature, or
/// `unknown`.
pub fn determine_subtype(
    bag_type: BagType,
    dirs: &BTreeSet<String>,
    exts: &BTreeSet<String>,
    tables: &ProfileTables,
) -> String {
    let matched = tables
        .for_type(bag_type)
        .iter()
        .rev()
        .find(|profile| profile.matches(dirs, exts));

    match matched {
        Some(profile) => profile.name.clone(),
        None => {
            tracing::warn!(
                bag_type = %bag_type,
                dirs = ?dirs,
                exts = ?exts,
                "no subtype profile matches bag"
            );
            UNKNOWN_SUBTYPE.to_string()
        }
    }
}

/// Full classification with the fatal load checks.
pub fn classify(index: &PayloadIndex, config: &AmiConfig) -> Result<Classification, ClassifyError> {
    let bag_type = determine_type(&index.dirs, &index.exts).ok_or(ClassifyError::NoType)?;

    if !index.dirs.contains(PRESERVATION_MASTERS_DIR) {
        return Err(ClassifyError::MissingPreservationMasters);
    }
    if index.media_filepaths.is_empty() {
        return Err(ClassifyError::NoMediaFiles);
    }
    if index.roles.pm_filepaths.is_empty() {
        return Err(ClassifyError::NoPreservationMaster);
    }

    let subtype = determine_subtype(bag_type, &index.dirs, &index.exts, &config.profiles);
    Ok(Classification { bag_type, subtype })
}
