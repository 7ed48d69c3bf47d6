//! Integration tests for source discovery.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use saber::infrastructure::discovery::{discover_sources, package_targets, PACKAGE_SOURCES_DIR};
use saber::infrastructure::InfraError;

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "").unwrap();
}

#[test]
fn given_custom_extension_when_discovering_then_only_matching_files() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    touch(&root.join("b/Zeta.kt"));
    touch(&root.join("a/Alpha.kt"));
    touch(&root.join("a/Alpha.swift"));
    touch(&root.join("a/Alpha.kt.orig"));

    // Act
    let files = discover_sources(root, "kt").expect("discover");

    // Assert
    assert_eq!(files, vec![root.join("a/Alpha.kt"), root.join("b/Zeta.kt")]);
}

#[test]
fn given_package_when_selecting_targets_then_only_their_files() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let package = dir.path();
    let sources = package.join(PACKAGE_SOURCES_DIR);
    touch(&sources.join("App/AppContainer.swift"));
    touch(&sources.join("Core/Model/User.swift"));
    touch(&sources.join("Tools/Script.swift"));

    // Act
    let targets = package_targets(package, &["App".into(), "Core".into()], "swift")
        .expect("targets");

    // Assert
    assert_eq!(targets.len(), 2);
    assert_eq!(targets[0].name, "App");
    assert_eq!(targets[0].files, vec![sources.join("App/AppContainer.swift")]);
    assert_eq!(targets[1].name, "Core");
    assert_eq!(targets[1].files, vec![sources.join("Core/Model/User.swift")]);
}

#[test]
fn given_unknown_target_when_selecting_then_error_names_target() {
    let dir = TempDir::new().unwrap();
    touch(&dir.path().join(PACKAGE_SOURCES_DIR).join("App/App.swift"));

    let err = package_targets(dir.path(), &["Missing".into()], "swift").unwrap_err();

    assert!(matches!(err, InfraError::Discovery { .. }));
    assert!(err.to_string().contains("Missing"));
}

#[test]
fn given_directory_without_sources_dir_when_selecting_targets_then_error() {
    let dir = TempDir::new().unwrap();

    let result = package_targets(dir.path(), &["App".into()], "swift");

    assert!(matches!(result, Err(InfraError::Discovery { .. })));
}
