#![allow(dead_code)]

use amibag_core::bagit::encode_filename;
use amibag_core::fixity::{hash_reader, Algorithm};
use std::collections::BTreeSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const PM_MOV: &str = "data/PreservationMasters/myd_263524_v01_pm.mov";
pub const PM_JSON: &str = "data/PreservationMasters/myd_263524_v01_pm.json";
pub const SC_MP4: &str = "data/ServiceCopies/myd_263524_v01_sc.mp4";
pub const SC_JSON: &str = "data/ServiceCopies/myd_263524_v01_sc.json";
pub const IMAGE: &str = "data/Images/myd_263524_v01_01.jpeg";

pub fn media_json(reference: &str, format: &str) -> Vec<u8> {
    let (stem, ext) = reference.rsplit_once('.').unwrap();
    serde_json::json!({
        "asset": {"referenceFilename": reference},
        "technical": {"filename": stem, "extension": ext, "fileFormat": format}
    })
    .to_string()
    .into_bytes()
}

/// Payload of a well-formed JSON video bag.
pub fn json_video_payload() -> Vec<(String, Vec<u8>)> {
    vec![
        (PM_MOV.into(), b"preservation master".to_vec()),
        (PM_JSON.into(), media_json("myd_263524_v01_pm.mov", "QuickTime")),
        (SC_MP4.into(), b"service copy".to_vec()),
        (SC_JSON.into(), media_json("myd_263524_v01_sc.mp4", "MPEG-4")),
        (IMAGE.into(), b"jpeg".to_vec()),
    ]
}

pub struct TestBag {
    pub dir: TempDir,
}

impl TestBag {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn write(&self, rel: &str, content: &[u8]) {
        let path = self.path(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.path(rel)).unwrap()
    }

    pub fn files_matching(&self, prefix: &str, suffix: &str) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.root())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|n| n.starts_with(prefix) && n.ends_with(suffix))
            .collect();
        names.sort();
        names
    }
}

/// Build a complete bag: payload, manifests, bag-info with Payload-Oxum.
pub fn make_bag(payload: &[(String, Vec<u8>)], algorithms: &[Algorithm]) -> TestBag {
    let bag = TestBag {
        dir: tempfile::tempdir().unwrap(),
    };
    bag.write("bagit.txt", b"BagIt-Version: 0.97\nTag-File-Character-Encoding: UTF-8\n");

    let algs: BTreeSet<Algorithm> = algorithms.iter().copied().collect();
    let mut manifests: Vec<(Algorithm, String)> = algs.iter().map(|a| (*a, String::new())).collect();
    let mut bytes = 0u64;

    let mut sorted: Vec<&(String, Vec<u8>)> = payload.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    for (rel, content) in sorted {
        bag.write(rel, content);
        bytes += content.len() as u64;
        let digests = hash_reader(Cursor::new(content), &algs).unwrap();
        for (alg, text) in manifests.iter_mut() {
            let digest = &digests[&*alg];
            text.push_str(&format!("{}  {}\n", digest, encode_filename(rel)));
        }
    }
    for (alg, text) in manifests {
        bag.write(&alg.manifest_filename(), text.as_bytes());
    }
    bag.write(
        "bag-info.txt",
        format!(
            "Bag-Software-Agent: test\nPayload-Oxum: {}.{}\n",
            bytes,
            payload.len()
        )
        .as_bytes(),
    );
    bag
}

pub fn make_json_video_bag() -> TestBag {
    make_bag(&json_video_payload(), &[Algorithm::Md5])
}

pub fn owned(items: &[(&str, &[u8])]) -> Vec<(String, Vec<u8>)> {
    items
        .iter()
        .map(|(p, c)| (p.to_string(), c.to_vec()))
        .collect()
}
