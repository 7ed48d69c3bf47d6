//! Command dispatch

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use termtree::Tree;
use tracing::{debug, instrument};

use crate::application::services::WrittenFile;
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, Settings};
use crate::domain::{Container, Service, StoragePolicy, TypeResolver};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::discovery::{discover_sources, package_targets};
use crate::infrastructure::InfraError;

/// Options of a generation run, with every path resolved against the work dir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    pub path: PathBuf,
    /// Sorted, de-duplicated target names (package runs only)
    pub targets: Vec<String>,
    pub out_dir: PathBuf,
    pub config: Option<PathBuf>,
}

impl GenerateOptions {
    /// Build options from raw command-line strings.
    ///
    /// An empty `config` means "no config file".
    pub fn resolve(
        work_dir: &Path,
        path: &str,
        targets: &str,
        out: &str,
        config: &str,
    ) -> CliResult<Self> {
        let config = match config.trim() {
            "" => None,
            config => Some(resolve_path(work_dir, config)?),
        };
        Ok(Self {
            path: resolve_path(work_dir, path)?,
            targets: parse_targets(targets),
            out_dir: resolve_path(work_dir, out)?,
            config,
        })
    }
}

/// Expand `~` and `$VAR`, then join relative paths onto `work_dir`.
pub fn resolve_path(work_dir: &Path, raw: &str) -> CliResult<PathBuf> {
    let expanded = shellexpand::full(raw)
        .map_err(|e| CliError::InvalidArgs(format!("cannot expand `{raw}`: {e}")))?;
    let path = PathBuf::from(expanded.as_ref());
    if path.is_absolute() || work_dir.as_os_str().is_empty() {
        Ok(path)
    } else {
        Ok(work_dir.join(path))
    }
}

/// "Foo, Bar" → ["Bar", "Foo"]
pub fn parse_targets(raw: &str) -> Vec<String> {
    let mut targets: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();
    targets.sort();
    targets.dedup();
    targets
}

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Ok(());
    };
    if let Commands::Completion { shell } = command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        clap_complete::generate(*shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    let work_dir = match &cli.work_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().map_err(|e| InfraError::io("current directory", e))?,
    };
    let config = cli
        .config
        .as_ref()
        .map(|c| c.to_string_lossy().to_string())
        .unwrap_or_default();

    match command {
        Commands::Sources { from, out } => {
            let opts = GenerateOptions::resolve(
                &work_dir,
                &from.to_string_lossy(),
                "",
                &out.to_string_lossy(),
                &config,
            )?;
            let container = load_container(&opts)?;
            let files = discover_sources(&opts.path, &container.settings.source_extension)?;
            generate(&container, &opts, &work_dir, &files)
        }
        Commands::Package { path, targets, out } => {
            let opts = GenerateOptions::resolve(
                &work_dir,
                &path.to_string_lossy(),
                targets,
                &out.to_string_lossy(),
                &config,
            )?;
            if opts.targets.is_empty() {
                return Err(CliError::InvalidArgs("no targets given".into()));
            }
            let container = load_container(&opts)?;
            let files: Vec<PathBuf> = package_targets(
                &opts.path,
                &opts.targets,
                &container.settings.source_extension,
            )?
            .into_iter()
            .flat_map(|target| target.files)
            .collect();
            generate(&container, &opts, &work_dir, &files)
        }
        Commands::Graph { from } => {
            let opts = GenerateOptions::resolve(
                &work_dir,
                &from.to_string_lossy(),
                "",
                "",
                &config,
            )?;
            let container = load_container(&opts)?;
            let files = discover_sources(&opts.path, &container.settings.source_extension)?;
            graph(&container, &files)
        }
        Commands::Config { command } => {
            let explicit = match config.as_str() {
                "" => None,
                raw => Some(resolve_path(&work_dir, raw)?),
            };
            config_command(command, explicit.as_deref())
        }
        Commands::Completion { .. } => Ok(()),
    }
}

fn load_container(opts: &GenerateOptions) -> CliResult<ServiceContainer> {
    let settings = Settings::load(opts.config.as_deref()).map_err(InfraError::from)?;
    debug!("settings: {:?}", settings);
    Ok(ServiceContainer::new(settings))
}

#[instrument(level = "debug", skip(container, files), fields(files = files.len()))]
fn generate(
    container: &ServiceContainer,
    opts: &GenerateOptions,
    work_dir: &Path,
    files: &[PathBuf],
) -> CliResult<()> {
    if files.is_empty() {
        output::warning(&format!("no sources found in {}", opts.path.display()));
    }
    let written = container
        .generator
        .run(files, &opts.out_dir)
        .map_err(InfraError::from)?;
    report(&written, work_dir);
    Ok(())
}

fn report(written: &[WrittenFile], work_dir: &Path) {
    if written.is_empty() {
        output::info("no containers declared");
        return;
    }
    for file in written {
        let shown = pathdiff::diff_paths(&file.path, work_dir)
            .filter(|p| !p.starts_with(".."))
            .unwrap_or_else(|| file.path.clone());
        if file.changed {
            output::success(&shown.display());
        } else {
            output::detail(&format!("{} (unchanged)", shown.display()));
        }
    }
}

fn graph(container: &ServiceContainer, files: &[PathBuf]) -> CliResult<()> {
    let generator = &container.generator;
    let sources = generator.read_sources(files).map_err(InfraError::from)?;
    let containers = generator.containers(&sources).map_err(InfraError::from)?;
    for resolved in &containers {
        output::info(&container_tree(resolved));
    }
    Ok(())
}

/// Dependency tree of a container: externals, then each service's arguments.
pub fn container_tree(container: &Container) -> Tree<String> {
    let mut root = Tree::new(format!(
        "{}: {} (scope {})",
        container.name, container.protocol, container.scope
    ));
    for external in &container.externals {
        let leaves: Vec<Tree<String>> = external
            .capabilities
            .iter()
            .map(|c| Tree::new(c.name().to_string()))
            .collect();
        root.push(Tree::new(format!("external {}", external.provider)).with_leaves(leaves));
    }
    for service in &container.services {
        root.push(service_tree(container, service));
    }
    root
}

fn service_tree(container: &Container, service: &Service) -> Tree<String> {
    let mut label = service.type_usage.to_string();
    if service.constructor.is_failable {
        label.push('?');
    }
    if service.storage == StoragePolicy::Cached {
        label.push_str(" [cached]");
    }
    if let Some(protocol) = &service.bound_to {
        label.push_str(&format!(" as {protocol}"));
    }
    let mut tree = Tree::new(label);
    for arg in &service.constructor.args {
        let name = arg.name.as_deref().unwrap_or("_");
        let dependency = match &arg.resolver {
            TypeResolver::Explicit(usage) => container.service(&usage.name),
            TypeResolver::External { .. } | TypeResolver::Provider(_) => None,
        };
        match dependency {
            Some(dependency) => {
                let child = service_tree(container, dependency);
                let label = format!("{name}: {}", child.root);
                tree.push(Tree::new(label).with_leaves(child.leaves));
            }
            None => {
                tree.push(Tree::new(format!("{name}: {}", arg.resolver)));
            }
        }
    }
    tree
}

fn config_command(command: &ConfigCommands, explicit: Option<&Path>) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = Settings::load(explicit).map_err(InfraError::from)?;
            let toml = settings.to_toml().map_err(InfraError::from)?;
            output::info(&toml);
        }
        ConfigCommands::Template => output::info(&Settings::template()),
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => {
                    let state = if path.exists() { "" } else { " (not found)" };
                    output::action("global", &format!("{}{state}", path.display()));
                }
                None => output::warning("no config directory for this platform"),
            }
            if let Some(path) = explicit {
                output::action("explicit", &path.display());
            }
        }
    }
    Ok(())
}
