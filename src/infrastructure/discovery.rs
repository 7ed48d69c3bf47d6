//! Source discovery
//!
//! Finds source files either under a plain directory or for named targets of
//! a SwiftPM-style package (`<package>/Sources/<Target>/`). Results are always
//! in lexicographic path order so generation is deterministic.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};
use walkdir::WalkDir;

use crate::infrastructure::{InfraError, InfraResult};

/// Directory holding one subdirectory per package target.
pub const PACKAGE_SOURCES_DIR: &str = "Sources";

/// A package target and its source files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageTarget {
    pub name: String,
    pub files: Vec<PathBuf>,
}

/// All files below `root` with the given extension, sorted by path.
#[instrument(level = "debug")]
pub fn discover_sources(root: &Path, extension: &str) -> InfraResult<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(InfraError::discovery(root, "not a directory"));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            match e.into_io_error() {
                Some(source) => InfraError::io(format!("walk {}", path.display()), source),
                None => InfraError::discovery(path, "filesystem loop"),
            }
        })?;
        let path = entry.path();
        if entry.file_type().is_file()
            && path.extension().is_some_and(|ext| ext == extension)
        {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    debug!("discovered {} sources under {}", files.len(), root.display());
    Ok(files)
}

/// Source files of the named targets of a package, in target-name order.
#[instrument(level = "debug", skip(targets))]
pub fn package_targets(
    package: &Path,
    targets: &[String],
    extension: &str,
) -> InfraResult<Vec<PackageTarget>> {
    let sources = package.join(PACKAGE_SOURCES_DIR);
    if !sources.is_dir() {
        return Err(InfraError::discovery(
            package,
            format!("no `{PACKAGE_SOURCES_DIR}` directory"),
        ));
    }
    let mut result = Vec::with_capacity(targets.len());
    for name in targets {
        let dir = sources.join(name);
        if !dir.is_dir() {
            return Err(InfraError::discovery(
                package,
                format!("target `{name}` not found"),
            ));
        }
        result.push(PackageTarget {
            name: name.clone(),
            files: discover_sources(&dir, extension)?,
        });
    }
    Ok(result)
}
