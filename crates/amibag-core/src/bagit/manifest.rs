//! Manifest store: in-memory `path -> {alg: digest}` map backed by one
//! `manifest-<alg>.txt` file per algorithm.
//!
//! The store carries an explicit dirty flag; rewriting on disk is the caller's
//! decision (see `repair::RepairEngine::write_bag_updates`).

use super::{decode_filename, encode_filename, BagError, PAYLOAD_DIR_PREFIX};
use crate::fixity::{hash_file, Algorithm, Digests};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Manifest entries keyed by bag-relative path (`data/...`).
pub type Entries = BTreeMap<String, Digests>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestStore {
    entries: Entries,
    algorithms: BTreeSet<Algorithm>,
    dirty: bool,
}

/// Split one manifest line into `(digest, decoded path)`.
pub fn parse_manifest_line(line: &str) -> Option<(String, String)> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return None;
    }
    let line = line.trim_start();
    let split = line.find(char::is_whitespace)?;
    let (digest, rest) = line.split_at(split);
    let path = rest.trim_start();
    if path.is_empty() {
        return None;
    }
    let path = decode_filename(path).replace('\\', "/");
    Some((digest.to_ascii_lowercase(), path))
}

impl ManifestStore {
    pub fn new(algorithms: BTreeSet<Algorithm>) -> Self {
        Self {
            entries: Entries::new(),
            algorithms,
            dirty: false,
        }
    }

    /// Load `manifest-<alg>.txt` for every algorithm.
    pub fn load(root: &Path, algorithms: &BTreeSet<Algorithm>) -> Result<Self, BagError> {
        let mut store = Self::new(algorithms.clone());
        for alg in algorithms {
            let file = root.join(alg.manifest_filename());
            let content = std::fs::read_to_string(&file).map_err(|e| BagError::Io {
                path: file.clone(),
                source: e,
            })?;
            for (idx, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let (digest, path) =
                    parse_manifest_line(line).ok_or_else(|| BagError::MalformedManifest {
                        file: file.clone(),
                        line: idx + 1,
                    })?;
                store.entries.entry(path).or_default().insert(*alg, digest);
            }
        }
        Ok(store)
    }

    pub fn algorithms(&self) -> &BTreeSet<Algorithm> {
        &self.algorithms
    }

    pub fn entries(&self) -> &Entries {
        &self.entries
    }

    pub fn get(&self, path: &str) -> Option<&Digests> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Record digests for `path`. Returns `true` (and marks the store dirty)
    /// only when the stored entry actually changed.
    pub fn insert(&mut self, path: impl Into<String>, digests: Digests) -> bool {
        let path = path.into();
        if self.entries.get(&path) == Some(&digests) {
            return false;
        }
        self.entries.insert(path, digests);
        self.dirty = true;
        true
    }

    pub fn remove(&mut self, path: &str) -> bool {
        let removed = self.entries.remove(path).is_some();
        if removed {
            self.dirty = true;
        }
        removed
    }

    /// Manifest text for one algorithm, restricted to payload paths.
    pub fn render(&self, alg: Algorithm) -> String {
        let mut out = String::new();
        for (path, digests) in &self.entries {
            if !path.starts_with(PAYLOAD_DIR_PREFIX) {
                continue;
            }
            if let Some(digest) = digests.get(&alg) {
                out.push_str(digest);
                out.push_str("  ");
                out.push_str(&encode_filename(path));
                out.push('\n');
            }
        }
        out
    }

    /// Copy the current manifest file aside before it is overwritten.
    ///
    /// The backup is named `manifest-<alg>-<stamp>.txt.old`; an existing
    /// backup is never clobbered.
    pub fn backup(&self, root: &Path, alg: Algorithm, stamp: &str) -> std::io::Result<PathBuf> {
        let source = root.join(alg.manifest_filename());
        let mut target = root.join(format!("manifest-{}-{}.txt.old", alg, stamp));
        let mut n = 1;
        while target.exists() {
            target = root.join(format!("manifest-{}-{}-{}.txt.old", alg, stamp, n));
            n += 1;
        }
        std::fs::copy(&source, &target)?;
        Ok(target)
    }

    pub fn write(&self, root: &Path, alg: Algorithm) -> std::io::Result<PathBuf> {
        let target = root.join(alg.manifest_filename());
        std::fs::write(&target, self.render(alg))?;
        Ok(target)
    }
}

/// Tag files covered by `tagmanifest-<alg>.txt`: every file under the bag
/// root outside `data/`, except the tag manifests themselves.
pub fn tag_files(root: &Path) -> std::io::Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = super::relative_path(root, entry.path());
        if rel.starts_with(PAYLOAD_DIR_PREFIX) || rel.starts_with("tagmanifest-") {
            continue;
        }
        files.push(rel);
    }
    Ok(files)
}

/// Recompute and write `tagmanifest-<alg>.txt`.
pub fn write_tagmanifest(root: &Path, alg: Algorithm) -> std::io::Result<PathBuf> {
    let algs: BTreeSet<Algorithm> = [alg].into_iter().collect();
    let mut out = String::new();
    for rel in tag_files(root)? {
        let digests = hash_file(&root.join(&rel), &algs)?;
        if let Some(digest) = digests.get(&alg) {
            out.push_str(digest);
            out.push_str("  ");
            out.push_str(&encode_filename(&rel));
            out.push('\n');
        }
    }
    let target = root.join(alg.tagmanifest_filename());
    std::fs::write(&target, out)?;
    Ok(target)
}
