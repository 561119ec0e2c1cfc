pub mod amibag;
pub mod bagit;
pub mod classify;
pub mod config;
pub mod fixity;
pub mod metadata;
pub mod payload;
pub mod premis;
pub mod repair;
pub mod validate;

// Convenience re-exports
pub use amibag::{AmiBag, AmiBagError};
pub use bagit::{BagError, BagHandle, BagInfo, BagValidationError, ManifestStore, Oxum};
pub use classify::{BagType, Classification, ClassifyError, PayloadIndex, RoleFiles};
pub use config::{default_config, load_config, AmiConfig, ConfigError, Profile, ProfileTables};
pub use fixity::{hash_file, Algorithm, Digests};
pub use metadata::{
    JsonMetadataReader, MediaInfo, MediaInspector, MediainfoCli, MetadataError, MetadataReader,
    MetadataRecord,
};
pub use payload::{PayloadFile, Role};
pub use premis::{PremisError, PremisLog, ProvenanceEvent};
pub use repair::{CleanupRule, RepairEngine, RepairError, RepairReport, StepReport};
pub use validate::{Finding, Severity, ValidateOptions, ValidationReport};
