//! Payload file naming: role suffixes, base names and the filename grammar
//! `<project>_<object-id>_<version-and-part-codes>_<role>.<ext>`.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    /// Full filename grammar (lowercase, role suffix, any extension).
    static ref FILENAME_RE: Regex =
        Regex::new(r"^[a-z]{3}_[a-z\d\-\*_]+_([vfrspt]\d{2})+_(ao|pm|em|sc|mz)\.[a-z\d]+$").unwrap();
    /// One `<letter><two digits>` version/part code group.
    static ref CODES_RE: Regex = Regex::new(r"^([vfrspt]\d{2})+$").unwrap();
}

/// Preservation function encoded in a media filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Preservation master
    Pm,
    /// Edit master
    Em,
    /// Service copy
    Sc,
    /// Mezzanine
    Mz,
    /// Archival original
    Ao,
}

impl Role {
    pub const ALL: [Role; 5] = [Role::Pm, Role::Em, Role::Sc, Role::Mz, Role::Ao];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Pm => "pm",
            Role::Em => "em",
            Role::Sc => "sc",
            Role::Mz => "mz",
            Role::Ao => "ao",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "pm" => Some(Role::Pm),
            "em" => Some(Role::Em),
            "sc" => Some(Role::Sc),
            "mz" => Some(Role::Mz),
            "ao" => Some(Role::Ao),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payload path split into the parts the checks care about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadFile {
    /// Bag-relative path, `data/...`.
    pub path: String,
    /// Parent directory relative to `data/` (empty for files directly in `data/`).
    pub directory: String,
    pub filename: String,
    /// Filename without extension.
    pub stem: String,
    /// Lowercase extension including the dot, or empty.
    pub extension: String,
    pub role: Option<Role>,
    /// Stem without the `_<role>` suffix.
    pub base_name: String,
}

/// Split a filename like `os.path.splitext`: leading dots never start an extension.
fn split_ext(filename: &str) -> (&str, &str) {
    let leading = filename.len() - filename.trim_start_matches('.').len();
    match filename[leading..].rfind('.') {
        Some(idx) => filename.split_at(leading + idx),
        None => (filename, ""),
    }
}

impl PayloadFile {
    pub fn parse(path: &str) -> Self {
        let under_data = path.strip_prefix(crate::bagit::PAYLOAD_DIR_PREFIX).unwrap_or(path);
        let (directory, filename) = match under_data.rsplit_once('/') {
            Some((dir, name)) => (dir.to_string(), name.to_string()),
            None => (String::new(), under_data.to_string()),
        };
        let (stem, ext) = split_ext(&filename);
        let (role, base_name) = match stem.rsplit_once('_') {
            Some((base, code)) => match Role::from_code(code) {
                Some(role) => (Some(role), base.to_string()),
                None => (None, stem.to_string()),
            },
            None => (None, stem.to_string()),
        };

        Self {
            path: path.to_string(),
            directory,
            stem: stem.to_string(),
            extension: ext.to_lowercase(),
            filename,
            role,
            base_name,
        }
    }

    /// Filename follows `<project>_<object-id>_<codes>_<role>.<ext>`.
    pub fn matches_grammar(&self) -> bool {
        FILENAME_RE.is_match(&self.filename)
    }

    /// The version-and-part code token, e.g. `v01f01` in `myd_263524_v01f01_pm`.
    pub fn codes(&self) -> Option<&str> {
        self.role?;
        let token = self.base_name.rsplit('_').next()?;
        CODES_RE.is_match(token).then_some(token)
    }

    /// Code letters present in the filename, in order (`v01f02` -> `['v', 'f']`).
    pub fn code_letters(&self) -> Vec<char> {
        match self.codes() {
            Some(codes) => codes.chars().step_by(3).collect(),
            None => Vec::new(),
        }
    }

    /// Filename carries one of the composite/part codes (e.g. `p01`).
    pub fn is_composite(&self, composite_codes: &[String]) -> bool {
        self.code_letters()
            .iter()
            .any(|letter| composite_codes.iter().any(|c| c.starts_with(*letter)))
    }

    /// Number of directory levels below `data/`.
    pub fn depth(&self) -> usize {
        if self.directory.is_empty() {
            0
        } else {
            self.directory.split('/').count()
        }
    }
}
