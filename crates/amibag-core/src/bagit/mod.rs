//! Base BagIt layer: loading a bag from disk, enumerating its payload and
//! checking completeness, Payload-Oxum and fixity.
//!
//! Layout:
//!
//! ```text
//! <bag>/
//!   bagit.txt
//!   bag-info.txt              Payload-Oxum and free-form tags
//!   manifest-<alg>.txt        "<hexdigest>  data/<path>" per payload file
//!   tagmanifest-<alg>.txt     digests of the files above
//!   premis-events.json        provenance sidecar
//!   data/                     payload root
//! ```
//!
//! Paths are always composed from the bag root; the process working
//! directory is never changed.

pub mod baginfo;
pub mod manifest;

pub use baginfo::{BagInfo, Oxum};
pub use manifest::{Entries, ManifestStore};

use crate::fixity::{hash_file, Algorithm, Digests};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const BAGIT_TXT: &str = "bagit.txt";
pub const BAG_INFO_TXT: &str = "bag-info.txt";
pub const PAYLOAD_DIR: &str = "data";
pub const PAYLOAD_DIR_PREFIX: &str = "data/";

/// A bag that cannot be loaded at all.
#[derive(Debug, Error)]
pub enum BagError {
    #[error("{} is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    #[error("{} is not a bag: missing {}", path.display(), BAGIT_TXT)]
    MissingBagitTxt { path: PathBuf },

    #[error("{} has no manifest for a supported algorithm", path.display())]
    NoManifest { path: PathBuf },

    #[error("malformed manifest line {line} in {}", file.display())]
    MalformedManifest { file: PathBuf, line: usize },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A loaded bag that fails completeness, Oxum or fixity checks.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("bag validation failed: {}", details.join("; "))]
pub struct BagValidationError {
    pub details: Vec<String>,
}

/// Encode a payload path for a manifest line.
pub fn encode_filename(path: &str) -> String {
    path.replace('%', "%25")
        .replace('\n', "%0A")
        .replace('\r', "%0D")
}

/// Inverse of [`encode_filename`].
pub fn decode_filename(path: &str) -> String {
    path.replace("%0A", "\n")
        .replace("%0a", "\n")
        .replace("%0D", "\r")
        .replace("%0d", "\r")
        .replace("%25", "%")
}

/// `path` relative to `root`, `/`-separated.
pub(crate) fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Supported algorithms with a `manifest-<alg>.txt` in `root`.
fn discover_algorithms(root: &Path) -> Result<BTreeSet<Algorithm>, BagError> {
    let mut algs = BTreeSet::new();
    let read_dir = std::fs::read_dir(root).map_err(|e| BagError::Io {
        path: root.to_path_buf(),
        source: e,
    })?;
    for entry in read_dir {
        let entry = entry.map_err(|e| BagError::Io {
            path: root.to_path_buf(),
            source: e,
        })?;
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(alg) = name
            .strip_prefix("manifest-")
            .and_then(|rest| rest.strip_suffix(".txt"))
        else {
            continue;
        };
        match alg.parse::<Algorithm>() {
            Ok(alg) => {
                algs.insert(alg);
            }
            Err(e) => tracing::warn!(manifest = %name, error = %e, "skipping manifest"),
        }
    }
    Ok(algs)
}

/// A BagIt bag loaded from disk.
#[derive(Debug, Clone)]
pub struct BagHandle {
    root: PathBuf,
    pub(crate) info: BagInfo,
    pub(crate) manifests: ManifestStore,
}

impl BagHandle {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BagError> {
        let root = path.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(BagError::NotADirectory { path: root });
        }
        if !root.join(BAGIT_TXT).is_file() {
            return Err(BagError::MissingBagitTxt { path: root });
        }

        let info_path = root.join(BAG_INFO_TXT);
        let info = BagInfo::load(&info_path).map_err(|e| BagError::Io {
            path: info_path,
            source: e,
        })?;

        let algorithms = discover_algorithms(&root)?;
        if algorithms.is_empty() {
            return Err(BagError::NoManifest { path: root });
        }
        let manifests = ManifestStore::load(&root, &algorithms)?;

        tracing::debug!(
            bag = %root.display(),
            algorithms = ?algorithms,
            entries = manifests.entries().len(),
            "opened bag"
        );

        Ok(Self {
            root,
            info,
            manifests,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn info(&self) -> &BagInfo {
        &self.info
    }

    pub fn algorithms(&self) -> &BTreeSet<Algorithm> {
        self.manifests.algorithms()
    }

    pub fn manifests(&self) -> &ManifestStore {
        &self.manifests
    }

    /// Payload entries declared by the manifests.
    pub fn payload_entries(&self) -> impl Iterator<Item = (&str, &Digests)> {
        self.manifests
            .entries()
            .iter()
            .filter(|(path, _)| path.starts_with(PAYLOAD_DIR_PREFIX))
            .map(|(path, digests)| (path.as_str(), digests))
    }

    /// Files actually present under `data/`, bag-relative and sorted.
    pub fn payload_files(&self) -> std::io::Result<Vec<String>> {
        let data = self.root.join(PAYLOAD_DIR);
        if !data.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(&data).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::other)?;
            if entry.file_type().is_file() {
                files.push(relative_path(&self.root, entry.path()));
            }
        }
        Ok(files)
    }

    /// `(declared but missing on disk, present on disk but undeclared)`.
    pub fn compare_manifests_with_fs(&self) -> std::io::Result<(Vec<String>, Vec<String>)> {
        let on_disk: BTreeSet<String> = self.payload_files()?.into_iter().collect();
        let declared: BTreeSet<String> = self
            .payload_entries()
            .map(|(path, _)| path.to_string())
            .collect();
        let only_in_manifest = declared.difference(&on_disk).cloned().collect();
        let only_on_disk = on_disk.difference(&declared).cloned().collect();
        Ok((only_in_manifest, only_on_disk))
    }

    pub fn payload_files_not_in_manifest(&self) -> std::io::Result<Vec<String>> {
        Ok(self.compare_manifests_with_fs()?.1)
    }

    pub fn manifest_entries_not_in_payload(&self) -> std::io::Result<Vec<String>> {
        Ok(self.compare_manifests_with_fs()?.0)
    }

    /// Oxum of the payload as it is on disk now.
    pub fn compute_oxum(&self) -> std::io::Result<Oxum> {
        let mut oxum = Oxum::new(0, 0);
        for rel in self.payload_files()? {
            oxum.bytes += std::fs::metadata(self.root.join(&rel))?.len();
            oxum.files += 1;
        }
        Ok(oxum)
    }

    /// Recorded Payload-Oxum matches the payload. A bag without an Oxum passes.
    pub fn check_oxum(&self) -> bool {
        self.oxum_problem().is_none()
    }

    fn oxum_problem(&self) -> Option<String> {
        let recorded = match self.info.oxum()? {
            Ok(oxum) => oxum,
            Err(e) => return Some(e),
        };
        match self.compute_oxum() {
            Ok(actual) if actual == recorded => None,
            Ok(actual) => Some(format!(
                "Payload-Oxum validation failed. Expected {} files and {} bytes but found {} files and {} bytes",
                recorded.files, recorded.bytes, actual.files, actual.bytes
            )),
            Err(e) => Some(format!("unable to compute Payload-Oxum: {}", e)),
        }
    }

    /// Completeness and Oxum checks; with `fast == false` every digest is
    /// recomputed as well.
    pub fn validate(&self, fast: bool) -> Result<(), BagValidationError> {
        let mut details = Vec::new();

        if !self.root.join(BAGIT_TXT).is_file() {
            details.push(format!("missing {}", BAGIT_TXT));
        }

        if let Some(problem) = self.oxum_problem() {
            details.push(problem);
        }

        match self.compare_manifests_with_fs() {
            Ok((missing, extra)) => {
                for path in missing {
                    details.push(format!("{} exists in manifest but was not found on filesystem", path));
                }
                for path in extra {
                    details.push(format!("{} exists on filesystem but is not in the manifest", path));
                }
            }
            Err(e) => details.push(format!("unable to read payload directory: {}", e)),
        }

        let algs = self.algorithms();
        for (path, digests) in self.payload_entries() {
            for alg in algs {
                if !digests.contains_key(alg) {
                    details.push(format!("{} is missing from {}", path, alg.manifest_filename()));
                }
            }
        }

        if !fast {
            for (path, expected) in self.payload_entries() {
                let file = self.root.join(path);
                if !file.is_file() {
                    continue;
                }
                match hash_file(&file, algs) {
                    Ok(actual) => {
                        for (alg, digest) in expected {
                            if actual.get(alg) != Some(digest) {
                                details.push(format!(
                                    "{} {} validation failed: expected=\"{}\" found=\"{}\"",
                                    path,
                                    alg,
                                    digest,
                                    actual.get(alg).map(String::as_str).unwrap_or("")
                                ));
                            }
                        }
                    }
                    Err(e) => details.push(format!("unable to hash {}: {}", path, e)),
                }
            }
        }

        if details.is_empty() {
            Ok(())
        } else {
            Err(BagValidationError { details })
        }
    }

    pub fn is_valid(&self, fast: bool) -> bool {
        self.validate(fast).is_ok()
    }
}
