//! `bag-info.txt` tag file and the Payload-Oxum value it records.

use serde::Serialize;
use std::path::Path;

pub const PAYLOAD_OXUM: &str = "Payload-Oxum";
pub const MOST_RECENT_UPDATE_DATE: &str = "Most-Recent-Update-Date";

/// Octet-stream sum: total payload bytes and payload file count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Oxum {
    pub bytes: u64,
    pub files: u64,
}

impl Oxum {
    pub fn new(bytes: u64, files: u64) -> Self {
        Self { bytes, files }
    }
}

impl std::fmt::Display for Oxum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.bytes, self.files)
    }
}

impl std::str::FromStr for Oxum {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (bytes, files) = s
            .trim()
            .split_once('.')
            .ok_or_else(|| format!("malformed Payload-Oxum '{}'", s))?;
        let bytes = bytes
            .parse()
            .map_err(|_| format!("malformed Payload-Oxum byte count '{}'", bytes))?;
        let files = files
            .parse()
            .map_err(|_| format!("malformed Payload-Oxum file count '{}'", files))?;
        Ok(Oxum { bytes, files })
    }
}

/// Ordered `Key: value` tags. Keys may repeat, order is preserved on write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BagInfo {
    tags: Vec<(String, String)>,
}

impl BagInfo {
    pub fn parse(content: &str) -> Self {
        let mut tags: Vec<(String, String)> = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            // Continuation lines are folded into the previous value.
            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some((_, value)) = tags.last_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }
            match line.split_once(':') {
                Some((key, value)) => tags.push((key.trim().to_string(), value.trim().to_string())),
                None => tracing::warn!(line = %line, "ignoring malformed bag-info line"),
            }
        }
        Self { tags }
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Self::parse(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// First value recorded for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace every value of `key` with a single one, or append it.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.tags.iter().position(|(k, _)| *k == key) {
            Some(idx) => {
                self.tags[idx].1 = value;
                let mut seen = false;
                self.tags.retain(|(k, _)| {
                    if *k != key {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => self.tags.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Recorded Payload-Oxum; `None` when absent.
    pub fn oxum(&self) -> Option<Result<Oxum, String>> {
        self.get(PAYLOAD_OXUM).map(str::parse)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.tags {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.render())
    }
}
