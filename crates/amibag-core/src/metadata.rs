//! Metadata collaborators: readers that turn metadata files into per-media
//! records, and inspectors that report technical values of a media file.
//!
//! Spreadsheet parsing is left to an external [`MetadataReader`]; the crate
//! ships a reader for the per-media JSON files and a `mediainfo`-backed
//! [`MediaInspector`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Dotted field holding the media filename a record describes.
pub const REFERENCE_FILENAME_FIELD: &str = "asset.referenceFilename";

/// Fields every JSON metadata record must carry.
pub const REQUIRED_JSON_FIELDS: &[&str] = &[
    REFERENCE_FILENAME_FIELD,
    "technical.filename",
    "technical.extension",
    "technical.fileFormat",
];

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("media inspector failed on {}: {message}", path.display())]
    Inspect { path: PathBuf, message: String },
}

/// One metadata record with dot-flattened fields (`technical.fileSize.measure`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub reference_filename: Option<String>,
    pub fields: BTreeMap<String, Value>,
}

impl MetadataRecord {
    pub fn from_fields(fields: BTreeMap<String, Value>) -> Self {
        let reference_filename = fields
            .get(REFERENCE_FILENAME_FIELD)
            .and_then(Value::as_str)
            .map(String::from);
        Self {
            reference_filename,
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Field rendered as text; numbers and strings only.
    pub fn get_text(&self, field: &str) -> Option<String> {
        match self.fields.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn missing_fields<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|field| match self.fields.get(*field) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            })
            .collect()
    }

    /// `technical.filename` + `.` + `technical.extension`.
    pub fn technical_filename(&self) -> Option<String> {
        let stem = self.get_text("technical.filename")?;
        let ext = self.get_text("technical.extension")?;
        Some(format!("{}.{}", stem, ext.trim_start_matches('.')))
    }
}

/// Flatten nested JSON objects into dot-delimited keys.
pub fn flatten(value: &Value) -> BTreeMap<String, Value> {
    fn walk(prefix: &str, value: &Value, out: &mut BTreeMap<String, Value>) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    let key = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    walk(&key, child, out);
                }
            }
            other => {
                out.insert(prefix.to_string(), other.clone());
            }
        }
    }

    let mut out = BTreeMap::new();
    walk("", value, &mut out);
    out
}

/// Reads metadata files into records.
pub trait MetadataReader {
    fn read_records(&self, path: &Path) -> Result<Vec<MetadataRecord>, MetadataError>;
}

/// One record per JSON metadata file.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMetadataReader;

impl MetadataReader for JsonMetadataReader {
    fn read_records(&self, path: &Path) -> Result<Vec<MetadataRecord>, MetadataError> {
        let content = std::fs::read_to_string(path).map_err(|source| MetadataError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&content).map_err(|e| MetadataError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if !value.is_object() {
            return Err(MetadataError::Parse {
                path: path.to_path_buf(),
                message: "top-level value is not an object".into(),
            });
        }
        Ok(vec![MetadataRecord::from_fields(flatten(&value))])
    }
}

/// Technical values of one media file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub format: Option<String>,
    pub duration_ms: Option<u64>,
    pub file_size: Option<u64>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
}

/// Extracts technical metadata from a media file.
pub trait MediaInspector {
    fn inspect(&self, path: &Path) -> Result<MediaInfo, MetadataError>;
}

/// Runs `mediainfo --Output=JSON`.
#[derive(Debug, Clone)]
pub struct MediainfoCli {
    program: PathBuf,
}

impl Default for MediainfoCli {
    fn default() -> Self {
        Self {
            program: PathBuf::from("mediainfo"),
        }
    }
}

impl MediainfoCli {
    /// The program can be started (`mediainfo --Version`).
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--Version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

impl MediaInspector for MediainfoCli {
    fn inspect(&self, path: &Path) -> Result<MediaInfo, MetadataError> {
        let output = Command::new(&self.program)
            .arg("--Output=JSON")
            .arg(path)
            .output()
            .map_err(|e| MetadataError::Inspect {
                path: path.to_path_buf(),
                message: format!("failed to run {}: {}", self.program.display(), e),
            })?;
        if !output.status.success() {
            return Err(MetadataError::Inspect {
                path: path.to_path_buf(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        parse_mediainfo_json(&output.stdout).map_err(|message| MetadataError::Inspect {
            path: path.to_path_buf(),
            message,
        })
    }
}

/// Parse the `media.track` array of `mediainfo --Output=JSON`.
pub fn parse_mediainfo_json(bytes: &[u8]) -> Result<MediaInfo, String> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
    let tracks = value
        .pointer("/media/track")
        .and_then(Value::as_array)
        .ok_or_else(|| "no media.track array in mediainfo output".to_string())?;

    let text = |track: &Value, key: &str| track.get(key).and_then(Value::as_str).map(String::from);

    let mut info = MediaInfo::default();
    for track in tracks {
        match track.get("@type").and_then(Value::as_str) {
            Some("General") => {
                info.format = text(track, "Format");
                info.file_size = text(track, "FileSize").and_then(|s| s.parse().ok());
                // Duration is reported in seconds with a fractional part.
                info.duration_ms = text(track, "Duration")
                    .and_then(|s| s.parse::<f64>().ok())
                    .map(|secs| (secs * 1000.0).round() as u64);
            }
            Some("Video") if info.video_codec.is_none() => {
                info.video_codec = text(track, "CodecID").or_else(|| text(track, "Format"));
            }
            Some("Audio") if info.audio_codec.is_none() => {
                info.audio_codec = text(track, "CodecID").or_else(|| text(track, "Format"));
            }
            _ => {}
        }
    }
    Ok(info)
}

/// A technical value in a record that disagrees with the inspected file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechMismatch {
    pub field: &'static str,
    pub recorded: String,
    pub inspected: String,
}

/// Compare recorded technical fields against inspected values. Fields absent
/// on either side are not compared.
pub fn compare_technical(record: &MetadataRecord, info: &MediaInfo) -> Vec<TechMismatch> {
    let pairs: [(&'static str, Option<String>); 5] = [
        ("technical.fileFormat", info.format.clone()),
        ("technical.fileSize.measure", info.file_size.map(|v| v.to_string())),
        ("technical.durationMilli.measure", info.duration_ms.map(|v| v.to_string())),
        ("technical.videoCodec", info.video_codec.clone()),
        ("technical.audioCodec", info.audio_codec.clone()),
    ];

    pairs
        .into_iter()
        .filter_map(|(field, inspected)| {
            let recorded = record.get_text(field)?;
            let inspected = inspected?;
            (recorded != inspected).then_some(TechMismatch {
                field,
                recorded,
                inspected,
            })
        })
        .collect()
}
