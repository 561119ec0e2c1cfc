pub mod classify;
pub mod repair;
pub mod validate;

use super::args::{Cli, Command, ConfigArgs};
use amibag_core::{load_config, AmiConfig};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub fn dispatch(cli: Cli) -> Result<i32> {
    match cli.cmd {
        Command::Classify(args) => classify::run(args),
        Command::Validate(args) => validate::run(args),
        Command::Repair(args) => repair::run(args),
    }
}

pub(crate) fn load(config: &ConfigArgs) -> Result<AmiConfig> {
    load_config(&config.config).with_context(|| format!("failed to load config '{}'", config.config))
}

/// Explicit bags first, then every subdirectory of each `directories` entry that holds a `bagit.txt`.
pub(crate) fn collect_bags(bags: &[PathBuf], directories: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut found: Vec<PathBuf> = bags.to_vec();
    for dir in directories {
        let mut children = Vec::new();
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("failed to read directory {}", dir.display()))?;
        for entry in entries {
            let path = entry
                .with_context(|| format!("failed to read directory {}", dir.display()))?
                .path();
            if is_bag_dir(&path) {
                children.push(path);
            }
        }
        children.sort();
        found.extend(children);
    }
    Ok(found)
}

fn is_bag_dir(path: &Path) -> bool {
    path.is_dir() && path.join("bagit.txt").is_file()
}
