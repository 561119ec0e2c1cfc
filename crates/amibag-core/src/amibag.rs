//! An AMI bag: a loaded BagIt bag plus its classification.

use crate::bagit::{BagError, BagHandle};
use crate::classify::{classify, BagType, Classification, ClassifyError, PayloadIndex, RoleFiles};
use crate::config::AmiConfig;
use std::path::Path;
use thiserror::Error;

/// A bag that cannot be treated as an AMI bag.
#[derive(Debug, Error)]
pub enum AmiBagError {
    #[error(transparent)]
    Bag(#[from] BagError),

    #[error("{path}: {source}")]
    Classify {
        path: String,
        #[source]
        source: ClassifyError,
    },
}

#[derive(Debug, Clone)]
pub struct AmiBag {
    bag: BagHandle,
    config: AmiConfig,
    classification: Classification,
    index: PayloadIndex,
}

impl AmiBag {
    /// Load the bag and classify it from its manifest-declared payload.
    pub fn open(path: impl AsRef<Path>, config: &AmiConfig) -> Result<Self, AmiBagError> {
        let bag = BagHandle::open(path)?;
        Self::from_bag(bag, config)
    }

    pub fn from_bag(bag: BagHandle, config: &AmiConfig) -> Result<Self, AmiBagError> {
        let index = PayloadIndex::build(bag.payload_entries().map(|(path, _)| path), config);
        let classification = classify(&index, config).map_err(|source| AmiBagError::Classify {
            path: bag.root().display().to_string(),
            source,
        })?;

        tracing::info!(
            bag = %bag.root().display(),
            bag_type = %classification.bag_type,
            subtype = %classification.subtype,
            media = index.media_filepaths.len(),
            "classified bag"
        );

        Ok(Self {
            bag,
            config: config.clone(),
            classification,
            index,
        })
    }

    pub fn bag(&self) -> &BagHandle {
        &self.bag
    }

    pub fn root(&self) -> &Path {
        self.bag.root()
    }

    pub fn config(&self) -> &AmiConfig {
        &self.config
    }

    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    pub fn bag_type(&self) -> BagType {
        self.classification.bag_type
    }

    pub fn subtype(&self) -> &str {
        &self.classification.subtype
    }

    pub fn index(&self) -> &PayloadIndex {
        &self.index
    }

    pub fn role_files(&self) -> &RoleFiles {
        &self.index.roles
    }

    pub fn media_filepaths(&self) -> &[String] {
        &self.index.media_filepaths
    }

    pub fn metadata_filepaths(&self) -> &[String] {
        &self.index.metadata_filepaths
    }

    /// JSON metadata files declared in the payload.
    pub fn json_filepaths(&self) -> impl Iterator<Item = &str> {
        self.index
            .files
            .iter()
            .filter(move |f| self.config.json_extensions.contains(&f.extension))
            .map(|f| f.path.as_str())
    }

    /// Spreadsheet metadata files declared in the payload.
    pub fn spreadsheet_filepaths(&self) -> impl Iterator<Item = &str> {
        self.index
            .files
            .iter()
            .filter(move |f| self.config.spreadsheet_extensions.contains(&f.extension))
            .map(|f| f.path.as_str())
    }
}
