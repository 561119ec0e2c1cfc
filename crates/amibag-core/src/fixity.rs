//! Fixity primitive: streaming digests for a single payload file.
//!
//! A file is read once; every requested algorithm is fed from the same buffer.

use serde::{Deserialize, Serialize};
use sha2::Digest;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;

/// Read buffer size for hashing.
const CHUNK_SIZE: usize = 64 * 1024;

/// Hash algorithms a bag manifest may be written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::Md5,
        Algorithm::Sha1,
        Algorithm::Sha256,
        Algorithm::Sha512,
    ];

    /// Name as used in `manifest-<name>.txt`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Md5 => "md5",
            Algorithm::Sha1 => "sha1",
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha512 => "sha512",
        }
    }

    /// Length of the lowercase hex digest.
    pub fn hex_len(&self) -> usize {
        match self {
            Algorithm::Md5 => 32,
            Algorithm::Sha1 => 40,
            Algorithm::Sha256 => 64,
            Algorithm::Sha512 => 128,
        }
    }

    pub fn manifest_filename(&self) -> String {
        format!("manifest-{}.txt", self.as_str())
    }

    pub fn tagmanifest_filename(&self) -> String {
        format!("tagmanifest-{}.txt", self.as_str())
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(Algorithm::Md5),
            "sha1" => Ok(Algorithm::Sha1),
            "sha256" => Ok(Algorithm::Sha256),
            "sha512" => Ok(Algorithm::Sha512),
            other => Err(format!("unsupported hash algorithm '{}'", other)),
        }
    }
}

/// Digests of one file keyed by algorithm.
pub type Digests = BTreeMap<Algorithm, String>;

enum Hasher {
    Md5(md5::Context),
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
    Sha512(sha2::Sha512),
}

impl Hasher {
    fn new(alg: Algorithm) -> Self {
        match alg {
            Algorithm::Md5 => Hasher::Md5(md5::Context::new()),
            Algorithm::Sha1 => Hasher::Sha1(sha1::Sha1::new()),
            Algorithm::Sha256 => Hasher::Sha256(sha2::Sha256::new()),
            Algorithm::Sha512 => Hasher::Sha512(sha2::Sha512::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Md5(h) => h.consume(data),
            Hasher::Sha1(h) => h.update(data),
            Hasher::Sha256(h) => h.update(data),
            Hasher::Sha512(h) => h.update(data),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Hasher::Md5(h) => format!("{:x}", h.compute()),
            Hasher::Sha1(h) => hex::encode(h.finalize()),
            Hasher::Sha256(h) => hex::encode(h.finalize()),
            Hasher::Sha512(h) => hex::encode(h.finalize()),
        }
    }
}

/// Hash everything a reader yields with every algorithm in `algorithms`.
pub fn hash_reader<R: Read>(mut reader: R, algorithms: &BTreeSet<Algorithm>) -> std::io::Result<Digests> {
    let mut hashers: Vec<(Algorithm, Hasher)> = algorithms
        .iter()
        .map(|alg| (*alg, Hasher::new(*alg)))
        .collect();

    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        for (_, hasher) in hashers.iter_mut() {
            hasher.update(&buf[..n]);
        }
    }

    Ok(hashers
        .into_iter()
        .map(|(alg, hasher)| (alg, hasher.finalize_hex()))
        .collect())
}

/// Compute digests of a single file for every registered algorithm.
pub fn hash_file(path: &Path, algorithms: &BTreeSet<Algorithm>) -> std::io::Result<Digests> {
    let file = std::fs::File::open(path)?;
    hash_reader(std::io::BufReader::new(file), algorithms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn all() -> BTreeSet<Algorithm> {
        Algorithm::ALL.into_iter().collect()
    }

    #[test]
    fn test_known_vectors_for_empty_input() {
        let digests = hash_reader(Cursor::new(b""), &all()).unwrap();
        assert_eq!(digests[&Algorithm::Md5], "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            digests[&Algorithm::Sha1],
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
        assert_eq!(
            digests[&Algorithm::Sha256],
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_known_vectors_for_abc() {
        let digests = hash_reader(Cursor::new(b"abc"), &all()).unwrap();
        assert_eq!(digests[&Algorithm::Md5], "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(
            digests[&Algorithm::Sha1],
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            digests[&Algorithm::Sha256],
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        for (alg, hex) in &digests {
            assert_eq!(hex.len(), alg.hex_len());
        }
    }

    #[test]
    fn test_only_requested_algorithms_are_computed() {
        let algs: BTreeSet<_> = [Algorithm::Sha256].into_iter().collect();
        let digests = hash_reader(Cursor::new(b"abc"), &algs).unwrap();
        assert_eq!(digests.len(), 1);
        assert!(digests.contains_key(&Algorithm::Sha256));
    }

    #[test]
    fn test_input_larger_than_one_chunk() {
        let data = vec![7u8; CHUNK_SIZE * 2 + 13];
        let algs: BTreeSet<_> = [Algorithm::Sha256].into_iter().collect();
        let streamed = hash_reader(Cursor::new(&data), &algs).unwrap();
        let direct = hex::encode(sha2::Sha256::digest(&data));
        assert_eq!(streamed[&Algorithm::Sha256], direct);
    }

    #[test]
    fn test_algorithm_parsing() {
        assert_eq!("SHA256".parse::<Algorithm>().unwrap(), Algorithm::Sha256);
        assert!("crc32".parse::<Algorithm>().is_err());
        assert_eq!(Algorithm::Md5.manifest_filename(), "manifest-md5.txt");
    }
}
