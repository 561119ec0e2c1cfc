use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "amibag",
    version,
    about = "Classify, validate and repair AMI preservation bags"
)]
pub struct Cli {
    /// Only log warnings and errors
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Append log output to this file instead of stderr
    #[arg(long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the type and subtype of each bag
    Classify(ClassifyArgs),
    /// Run the validation checks against each bag
    Validate(ValidateArgs),
    /// Repair manifests, bag-info and provenance of each bag
    Repair(RepairArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Args, Clone)]
pub struct ConfigArgs {
    /// Profile configuration: a YAML file path or a built-in name
    #[arg(long, default_value = "default", env = "AMIBAG_CONFIG")]
    pub config: String,
}

#[derive(Debug, Args, Clone)]
pub struct ClassifyArgs {
    #[arg(value_name = "BAG", required = true)]
    pub bags: Vec<PathBuf>,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Debug, Args, Clone)]
pub struct ValidateArgs {
    #[arg(value_name = "BAG")]
    pub bags: Vec<PathBuf>,

    /// Validate every bag directly inside DIR
    #[arg(long, short, value_name = "DIR")]
    pub directory: Vec<PathBuf>,

    /// Recompute every payload digest
    #[arg(long)]
    pub slow: bool,

    /// Also check metadata contents (uses `mediainfo` when installed)
    #[arg(long)]
    pub metadata: bool,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Debug, Args, Clone)]
pub struct RepairArgs {
    #[arg(value_name = "BAG", required = true)]
    pub bags: Vec<PathBuf>,

    /// Hash untracked payload files and add them to the manifests
    #[arg(long)]
    pub add_files: bool,

    /// Delete untracked payload files matched by the cleanup rules
    #[arg(long)]
    pub delete_files: bool,

    /// Drop manifest entries whose payload file is gone
    #[arg(long)]
    pub delete_manifest_entries: bool,

    /// Recompute digests of manifest entries, optionally only paths matching REGEX
    /// (`--update-hashes=REGEX`)
    #[arg(
        long,
        value_name = "REGEX",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = ".*"
    )]
    pub update_hashes: Option<String>,

    /// Record an Update-Message in bag-info
    #[arg(long, value_name = "TEXT")]
    pub message: Option<String>,

    /// Human agent recorded on provenance events
    #[arg(long, value_name = "NAME")]
    pub agent: Option<String>,

    /// Report what would change without writing anything
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    #[command(flatten)]
    pub config: ConfigArgs,
}

impl RepairArgs {
    pub fn has_action(&self) -> bool {
        self.add_files
            || self.delete_files
            || self.delete_manifest_entries
            || self.update_hashes.is_some()
            || self.message.is_some()
    }
}
