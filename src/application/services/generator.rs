//! Container generation service
//!
//! Orchestrates the pipeline: extract declarations from every source, build
//! the registry once, resolve each container, then flatten and render it.
//! Output files are written only after every container rendered successfully.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::application::renderer::Renderer;
use crate::application::view::ContainerDataFactory;
use crate::application::{ApplicationResult, IoResultExt};
use crate::config::Settings;
use crate::domain::directive::DirectiveParser;
use crate::domain::{Container, ContainerGraphBuilder, DomainError, Extractor, TypeRegistry};
use crate::infrastructure::traits::FileSystem;

/// A source file read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub content: String,
}

/// Rendered output for one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub container: String,
    pub file_name: String,
    /// Renderer output plus a trailing newline
    pub content: String,
}

/// Result of persisting one generated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: PathBuf,
    /// False when the file already had identical content
    pub changed: bool,
}

/// Service generating container sources.
pub struct GeneratorService {
    fs: Arc<dyn FileSystem>,
    settings: Arc<Settings>,
}

impl GeneratorService {
    pub fn new(fs: Arc<dyn FileSystem>, settings: Arc<Settings>) -> Self {
        Self { fs, settings }
    }

    /// Read all sources into memory, in the given order.
    pub fn read_sources(&self, paths: &[PathBuf]) -> ApplicationResult<Vec<SourceFile>> {
        paths
            .iter()
            .map(|path| {
                let content = self
                    .fs
                    .read_to_string(path)
                    .with_path_context("read source", path)?;
                Ok(SourceFile {
                    path: path.clone(),
                    content,
                })
            })
            .collect()
    }

    /// Resolve every declared container.
    #[instrument(level = "debug", skip_all, fields(sources = sources.len()))]
    pub fn containers(&self, sources: &[SourceFile]) -> ApplicationResult<Vec<Container>> {
        let extractor = Extractor::new(DirectiveParser::new(&self.settings.annotation_prefix));
        let mut declarations = Vec::new();
        for source in sources {
            let file = source.path.display().to_string();
            let extracted = extractor
                .extract(&source.content, &file)
                .map_err(DomainError::from)?;
            debug!("{}: {} declarations", file, extracted.len());
            declarations.extend(extracted);
        }
        let registry = TypeRegistry::build(declarations).map_err(DomainError::from)?;
        let containers = ContainerGraphBuilder::new(&registry)
            .build_all()
            .map_err(DomainError::from)?;
        Ok(containers)
    }

    /// Pure generation: sources in, rendered files out. Nothing is written.
    pub fn generate(&self, sources: &[SourceFile]) -> ApplicationResult<Vec<GeneratedFile>> {
        let factory = ContainerDataFactory::new(&self.settings);
        let generated = self
            .containers(sources)?
            .iter()
            .map(|container| {
                let data = factory.make(container);
                let mut content = Renderer::new(&data, &self.settings).render();
                content.push('\n');
                GeneratedFile {
                    container: container.name.clone(),
                    file_name: self.settings.output_file_name(&container.name),
                    content,
                }
            })
            .collect();
        Ok(generated)
    }

    /// Persist generated files into `out_dir`, skipping unchanged ones.
    pub fn write_outputs(
        &self,
        out_dir: &Path,
        files: &[GeneratedFile],
    ) -> ApplicationResult<Vec<WrittenFile>> {
        self.fs.create_dir_all(out_dir).output_context(out_dir)?;
        let mut written = Vec::with_capacity(files.len());
        for file in files {
            let path = out_dir.join(&file.file_name);
            let unchanged = self.fs.is_file(&path)
                && self
                    .fs
                    .read_to_string(&path)
                    .is_ok_and(|existing| existing == file.content);
            if unchanged {
                debug!("unchanged: {}", path.display());
            } else {
                self.fs
                    .write_atomic(&path, &file.content)
                    .output_context(&path)?;
                info!("wrote {}", path.display());
            }
            written.push(WrittenFile {
                path,
                changed: !unchanged,
            });
        }
        Ok(written)
    }

    /// Read, generate everything, then write everything.
    #[instrument(level = "debug", skip(self, paths), fields(sources = paths.len()))]
    pub fn run(&self, paths: &[PathBuf], out_dir: &Path) -> ApplicationResult<Vec<WrittenFile>> {
        let sources = self.read_sources(paths)?;
        let generated = self.generate(&sources)?;
        self.write_outputs(out_dir, &generated)
    }
}
