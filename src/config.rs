//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/saber/saber.toml`
//! 3. Explicit config: the file passed with `--config`
//! 4. Environment variables: `SABER_*` prefix

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::directive::DEFAULT_PREFIX;

/// Access keyword applied to the generated container's public surface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    #[default]
    Public,
    Internal,
}

impl AccessLevel {
    /// Keyword prefix including the trailing space, empty for `internal`.
    pub fn keyword(self) -> &'static str {
        match self {
            AccessLevel::Public => "public ",
            AccessLevel::Internal => "",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessLevel::Public => f.write_str("public"),
            AccessLevel::Internal => f.write_str("internal"),
        }
    }
}

impl std::str::FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(AccessLevel::Public),
            "internal" => Ok(AccessLevel::Internal),
            other => Err(format!("unknown access level `{other}` (public|internal)")),
        }
    }
}

/// Raw settings for intermediate parsing (arrays are Option to detect "not specified").
///
/// - `None` → field not specified, inherit from base
/// - `Some([])` → explicit empty array
/// - `Some([...])` → explicit values to merge
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub access_level: Option<AccessLevel>,
    pub indent: Option<usize>,
    pub annotation_prefix: Option<String>,
    pub source_extension: Option<String>,
    pub output_suffix: Option<String>,
    pub imports: Option<Vec<String>>,
}

/// Unified configuration for saber.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Access level of generated declarations (default: public)
    pub access_level: AccessLevel,
    /// Spaces per indentation level in generated code
    pub indent: usize,
    /// Directive prefix inside comments (default: `@saber.`)
    pub annotation_prefix: String,
    /// Extension of scanned source files
    pub source_extension: String,
    /// Suffix of generated files: `<Container>.<suffix>`
    pub output_suffix: String,
    /// Extra modules imported by every generated file (Foundation is implicit)
    pub imports: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            access_level: AccessLevel::Public,
            indent: 4,
            annotation_prefix: DEFAULT_PREFIX.to_string(),
            source_extension: "swift".to_string(),
            output_suffix: "saber.swift".to_string(),
            imports: vec![],
        }
    }
}

/// Get the XDG config directory for saber.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "saber").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("saber.toml"))
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Merge arrays with union semantics and negation support.
    ///
    /// - Items from overlay are added to base
    /// - Items prefixed with `!` remove the corresponding item from the result
    /// - Duplicates are de-duplicated, output is sorted
    ///
    /// # Examples
    /// ```ignore
    /// merge_array(&["a", "b"], &["c"])       // → ["a", "b", "c"]
    /// merge_array(&["a", "b"], &["!a", "c"]) // → ["b", "c"]
    /// ```
    pub fn merge_array(base: &[String], overlay: &[String]) -> Vec<String> {
        let mut result: BTreeSet<String> = base.iter().cloned().collect();
        for pattern in overlay {
            if let Some(negated) = pattern.strip_prefix('!') {
                result.remove(negated);
            } else {
                result.insert(pattern.clone());
            }
        }
        result.into_iter().collect()
    }

    /// Merge overlay config onto self (base) with union semantics for arrays.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        let mut merged = self.apply_scalars(overlay);
        merged.imports = overlay
            .imports
            .as_ref()
            .map(|o| Self::merge_array(&self.imports, o))
            .unwrap_or_else(|| self.imports.clone());
        merged
    }

    /// Apply global config onto defaults with REPLACE semantics for arrays.
    fn apply_global(&self, global: &RawSettings) -> Self {
        let mut merged = self.apply_scalars(global);
        merged.imports = global
            .imports
            .clone()
            .unwrap_or_else(|| self.imports.clone());
        merged
    }

    fn apply_scalars(&self, overlay: &RawSettings) -> Self {
        Self {
            access_level: overlay.access_level.unwrap_or(self.access_level),
            indent: overlay.indent.unwrap_or(self.indent),
            annotation_prefix: overlay
                .annotation_prefix
                .clone()
                .unwrap_or_else(|| self.annotation_prefix.clone()),
            source_extension: overlay
                .source_extension
                .clone()
                .unwrap_or_else(|| self.source_extension.clone()),
            output_suffix: overlay
                .output_suffix
                .clone()
                .unwrap_or_else(|| self.output_suffix.clone()),
            imports: self.imports.clone(),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `explicit` - Optional config file given on the command line
    ///
    /// # Array Merge Semantics
    /// - Defaults → Global: REPLACE
    /// - Global → Explicit: UNION with negation support
    /// - Any → Env vars: REPLACE
    pub fn load(explicit: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.apply_global(&raw);
            }
        }

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ApplicationError::Config {
                    message: format!("config file not found: {}", path.display()),
                });
            }
            let raw = load_raw_settings(path)?;
            current = current.merge_with(&raw);
        }

        current = Self::apply_env_overrides(current, None)?;
        current.validate()?;
        Ok(current)
    }

    /// Apply SABER_* environment variables as explicit overrides.
    ///
    /// `source` replaces the process environment (tests).
    fn apply_env_overrides(
        mut settings: Self,
        source: Option<HashMap<String, String>>,
    ) -> Result<Self, ApplicationError> {
        let builder = Config::builder().add_source(
            Environment::with_prefix("SABER")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("imports")
                .try_parsing(true)
                .source(source),
        );
        let config = builder.build().map_err(config_err)?;

        if let Ok(val) = config.get_string("access_level") {
            settings.access_level = val
                .parse()
                .map_err(|message| ApplicationError::Config { message })?;
        }
        if let Ok(val) = config.get_string("indent") {
            settings.indent = val.trim().parse().map_err(|e| ApplicationError::Config {
                message: format!("SABER_INDENT: {e}"),
            })?;
        }
        if let Ok(val) = config.get_string("annotation_prefix") {
            settings.annotation_prefix = val;
        }
        if let Ok(val) = config.get_string("source_extension") {
            settings.source_extension = val;
        }
        if let Ok(val) = config.get_string("output_suffix") {
            settings.output_suffix = val;
        }
        if let Ok(val) = config.get::<Vec<String>>("imports") {
            settings.imports = val
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        Ok(settings)
    }

    fn validate(&self) -> Result<(), ApplicationError> {
        if self.annotation_prefix.trim().is_empty() {
            return Err(ApplicationError::Config {
                message: "annotation_prefix must not be empty".into(),
            });
        }
        if self.output_suffix.trim().is_empty() {
            return Err(ApplicationError::Config {
                message: "output_suffix must not be empty".into(),
            });
        }
        Ok(())
    }

    /// File name of the generated output for a container.
    pub fn output_file_name(&self, container: &str) -> String {
        format!("{}.{}", container, self.output_suffix)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# saber configuration
#
# Locations (by precedence, lowest to highest):
#   Global:   ~/.config/saber/saber.toml    (defines your baseline)
#   Explicit: --config <FILE>               (project-specific additions)
#   Env:      SABER_* environment variables (explicit overrides)
#
# Array Merge Semantics:
#   Global config REPLACES compiled defaults.
#   The explicit config UNIONS with global.
#   Use "!item" in the explicit config to REMOVE an inherited item:
#     imports = ["Combine", "!UIKit"]

# Access level of the generated container: "public" or "internal"
# access_level = "public"

# Spaces per indentation level
# indent = 4

# Directive prefix recognized inside comments
# annotation_prefix = "@saber."

# Extension of scanned source files
# source_extension = "swift"

# Generated files are named <Container>.<output_suffix>
# output_suffix = "saber.swift"

# Extra imports for every generated file (Foundation is always imported)
# imports = ["UIKit"]
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn given_defaults_when_created_then_public_four_spaces() {
        let settings = Settings::default();
        assert_eq!(settings.access_level, AccessLevel::Public);
        assert_eq!(settings.indent, 4);
        assert_eq!(settings.annotation_prefix, "@saber.");
        assert_eq!(settings.output_file_name("AppContainer"), "AppContainer.saber.swift");
    }

    #[test]
    fn given_access_level_when_rendering_keyword_then_internal_is_empty() {
        assert_eq!(AccessLevel::Public.keyword(), "public ");
        assert_eq!(AccessLevel::Internal.keyword(), "");
        assert_eq!("Internal".parse::<AccessLevel>(), Ok(AccessLevel::Internal));
        assert!("open".parse::<AccessLevel>().is_err());
    }

    #[test]
    fn test_merge_array_union_and_negation() {
        let base = strings(&["UIKit", "Combine"]);
        let overlay = strings(&["!UIKit", "SwiftUI", "Combine"]);

        let result = Settings::merge_array(&base, &overlay);

        assert_eq!(result, strings(&["Combine", "SwiftUI"]));
    }

    #[test]
    fn test_merge_array_negation_nonexistent() {
        let result = Settings::merge_array(&strings(&["a"]), &strings(&["!x"]));
        assert_eq!(result, strings(&["a"]));
    }

    #[test]
    fn test_apply_global_replaces_arrays() {
        let base = Settings {
            imports: strings(&["UIKit"]),
            ..Settings::default()
        };
        let global = RawSettings {
            indent: Some(2),
            imports: Some(strings(&["Combine"])),
            ..RawSettings::default()
        };

        let result = base.apply_global(&global);

        assert_eq!(result.indent, 2);
        assert_eq!(result.imports, strings(&["Combine"]));
        assert_eq!(result.access_level, AccessLevel::Public);
    }

    #[test]
    fn test_merge_with_unions_arrays() {
        let base = Settings {
            imports: strings(&["UIKit"]),
            ..Settings::default()
        };
        let overlay = RawSettings {
            access_level: Some(AccessLevel::Internal),
            imports: Some(strings(&["Combine"])),
            ..RawSettings::default()
        };

        let result = base.merge_with(&overlay);

        assert_eq!(result.access_level, AccessLevel::Internal);
        assert_eq!(result.imports, strings(&["Combine", "UIKit"]));
    }

    #[test]
    fn given_env_overrides_when_applied_then_replace_values() {
        let source = env(&[
            ("SABER_ACCESS_LEVEL", "internal"),
            ("SABER_INDENT", "2"),
            ("SABER_IMPORTS", "UIKit, Combine"),
        ]);

        let result = Settings::apply_env_overrides(Settings::default(), source).unwrap();

        assert_eq!(result.access_level, AccessLevel::Internal);
        assert_eq!(result.indent, 2);
        assert_eq!(result.imports, strings(&["UIKit", "Combine"]));
    }

    #[test]
    fn given_invalid_env_indent_when_applied_then_config_error() {
        let source = env(&[("SABER_INDENT", "wide")]);

        let result = Settings::apply_env_overrides(Settings::default(), source);

        assert!(matches!(result, Err(ApplicationError::Config { .. })));
    }

    #[test]
    fn given_settings_when_serialized_then_toml_roundtrips() {
        let settings = Settings {
            access_level: AccessLevel::Internal,
            imports: strings(&["UIKit"]),
            ..Settings::default()
        };

        let toml = settings.to_toml().unwrap();

        assert!(toml.contains("access_level = \"internal\""));
        let parsed: Settings = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn given_template_when_parsed_then_is_valid_toml() {
        let parsed: RawSettings = toml::from_str(&Settings::template()).unwrap();
        assert!(parsed.imports.is_none());
    }
}
